//! Plain-text rendering of an evaluation result.

use std::fmt::Write;
use vision_core::{EvaluationResult, ScoreStats};

pub fn render(result: &EvaluationResult) -> String {
    let cm = &result.confusion;
    let m = &result.metrics;
    let mut out = String::new();

    let _ = writeln!(out, "Threshold: {} (score > threshold => abnormal)", result.threshold);
    let _ = writeln!(out);
    let _ = writeln!(out, "Normal images:   {}", result.normal_scores.len());
    let _ = writeln!(out, "Abnormal images: {}", result.abnormal_scores.len());
    let _ = writeln!(out, "Total images:    {}", result.image_count());
    let _ = writeln!(out);
    let _ = writeln!(out, "Confusion matrix");
    let _ = writeln!(out, "  TP {:3} - abnormal judged abnormal", cm.tp);
    let _ = writeln!(out, "  TN {:3} - normal judged normal", cm.tn);
    let _ = writeln!(out, "  FP {:3} - normal judged abnormal", cm.fp);
    let _ = writeln!(out, "  FN {:3} - abnormal judged normal", cm.r#fn);
    let _ = writeln!(out);
    let _ = writeln!(out, "{}", metric_line("F1 Score", m.f1));
    let _ = writeln!(out, "{}", metric_line("Precision", m.precision));
    let _ = writeln!(out, "{}", metric_line("Recall", m.recall));
    let _ = writeln!(out, "{}", metric_line("Accuracy", m.accuracy));
    let _ = writeln!(out);
    stats_block(&mut out, "Normal", result.distribution.normal.as_ref());
    stats_block(&mut out, "Abnormal", result.distribution.abnormal.as_ref());
    if let Some(gap) = result.distribution.mean_gap {
        let _ = writeln!(out, "Mean score gap: {gap:.6}");
    }
    out
}

fn metric_line(name: &str, value: f64) -> String {
    format!("{name}: {value:.4} ({:.2}%)", value * 100.0)
}

fn stats_block(out: &mut String, name: &str, stats: Option<&ScoreStats>) {
    let _ = writeln!(out, "{name} scores:");
    match stats {
        Some(s) => {
            let _ = writeln!(out, "  min  {:.6}", s.min);
            let _ = writeln!(out, "  max  {:.6}", s.max);
            let _ = writeln!(out, "  mean {:.6}", s.mean);
            let _ = writeln!(out, "  std  {:.6}", s.std_dev);
        }
        None => {
            let _ = writeln!(out, "  (no images)");
        }
    }
    let _ = writeln!(out);
}
