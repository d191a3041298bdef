//! Threshold evaluation of a batch result against labeled image sets.

use crate::error::{EvaluationError, Result};
use crate::extract::{ScoreMap, base_name, extract_scores_from_path};
use crate::labels::LabelClass;
use crate::stats::ScoreDistribution;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Decision rule shared by every classification: strictly above the
/// threshold is abnormal, equal or below is normal.
pub fn is_predicted_abnormal(score: f64, threshold: f64) -> bool {
    score > threshold
}

/// Ground truth × prediction counts over both label sets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    pub tp: usize,
    pub fp: usize,
    pub tn: usize,
    pub r#fn: usize,
}

impl ConfusionMatrix {
    pub fn from_scores(normal_scores: &[f64], abnormal_scores: &[f64], threshold: f64) -> Self {
        let fp = normal_scores
            .iter()
            .filter(|&&s| is_predicted_abnormal(s, threshold))
            .count();
        let tp = abnormal_scores
            .iter()
            .filter(|&&s| is_predicted_abnormal(s, threshold))
            .count();
        Self {
            tp,
            fp,
            tn: normal_scores.len() - fp,
            r#fn: abnormal_scores.len() - tp,
        }
    }

    pub fn total(&self) -> usize {
        self.tp + self.fp + self.tn + self.r#fn
    }

    /// Derived metrics. Any ratio with a zero denominator is reported as 0.0.
    pub fn metrics(&self) -> Metrics {
        let precision = ratio(self.tp, self.tp + self.fp);
        let recall = ratio(self.tp, self.tp + self.r#fn);
        let f1 = if precision + recall > 0.0 {
            2.0 * precision * recall / (precision + recall)
        } else {
            0.0
        };
        Metrics {
            precision,
            recall,
            f1,
            accuracy: ratio(self.tp + self.tn, self.total()),
        }
    }
}

fn ratio(num: usize, den: usize) -> f64 {
    if den > 0 {
        num as f64 / den as f64
    } else {
        0.0
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub accuracy: f64,
}

/// Outcome of one evaluation run.
///
/// Score lists follow the order of the label lists they were looked up for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationResult {
    pub threshold: f64,
    pub normal_scores: Vec<f64>,
    pub abnormal_scores: Vec<f64>,
    #[serde(flatten)]
    pub confusion: ConfusionMatrix,
    #[serde(flatten)]
    pub metrics: Metrics,
    pub distribution: ScoreDistribution,
}

impl EvaluationResult {
    pub fn image_count(&self) -> usize {
        self.normal_scores.len() + self.abnormal_scores.len()
    }
}

/// Match both label sets against `scores` and evaluate them at `threshold`.
///
/// Fails on the first labeled file whose base name has no score; no
/// counts are returned in that case.
pub fn evaluate<N, A>(
    scores: &ScoreMap,
    normal_paths: &[N],
    abnormal_paths: &[A],
    threshold: f64,
) -> Result<EvaluationResult>
where
    N: AsRef<Path>,
    A: AsRef<Path>,
{
    let normal_scores = lookup_scores(scores, normal_paths, LabelClass::Normal)?;
    let abnormal_scores = lookup_scores(scores, abnormal_paths, LabelClass::Abnormal)?;

    let confusion = ConfusionMatrix::from_scores(&normal_scores, &abnormal_scores, threshold);
    let metrics = confusion.metrics();
    let distribution = ScoreDistribution::new(&normal_scores, &abnormal_scores);
    tracing::info!(
        "threshold {}: tp={} fp={} tn={} fn={} f1={:.4}",
        threshold,
        confusion.tp,
        confusion.fp,
        confusion.tn,
        confusion.r#fn,
        metrics.f1
    );

    Ok(EvaluationResult {
        threshold,
        normal_scores,
        abnormal_scores,
        confusion,
        metrics,
        distribution,
    })
}

/// Extract the scores of a saved batch archive and evaluate them.
pub fn evaluate_archive<N, A>(
    archive: impl AsRef<Path>,
    normal_paths: &[N],
    abnormal_paths: &[A],
    threshold: f64,
) -> Result<EvaluationResult>
where
    N: AsRef<Path>,
    A: AsRef<Path>,
{
    let scores = extract_scores_from_path(archive)?;
    evaluate(&scores, normal_paths, abnormal_paths, threshold)
}

/// Base name of a labeled path as it appears in the manifest.
pub(crate) fn label_key(path: &Path) -> String {
    base_name(&path.to_string_lossy()).to_string()
}

fn lookup_scores<P: AsRef<Path>>(
    scores: &ScoreMap,
    paths: &[P],
    set: LabelClass,
) -> Result<Vec<f64>> {
    paths
        .iter()
        .map(|p| {
            let filename = label_key(p.as_ref());
            scores
                .get(&filename)
                .copied()
                .ok_or(EvaluationError::UnmatchedImage { set, filename })
        })
        .collect()
}
