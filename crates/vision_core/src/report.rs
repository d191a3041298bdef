//! Per-image outcomes and result export.

use crate::evaluate::{EvaluationResult, is_predicted_abnormal, label_key};
use crate::labels::LabelClass;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

/// Confusion-matrix cell a single image falls into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome {
    TruePositive,
    FalsePositive,
    TrueNegative,
    FalseNegative,
}

impl Outcome {
    pub fn classify(label: LabelClass, predicted_abnormal: bool) -> Self {
        match (label, predicted_abnormal) {
            (LabelClass::Normal, false) => Outcome::TrueNegative,
            (LabelClass::Normal, true) => Outcome::FalsePositive,
            (LabelClass::Abnormal, false) => Outcome::FalseNegative,
            (LabelClass::Abnormal, true) => Outcome::TruePositive,
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Outcome::TruePositive => "TP",
            Outcome::FalsePositive => "FP",
            Outcome::TrueNegative => "TN",
            Outcome::FalseNegative => "FN",
        })
    }
}

/// One labeled image with its score and decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredImage {
    pub file: String,
    pub label: LabelClass,
    pub score: f64,
    pub predicted_abnormal: bool,
    pub outcome: Outcome,
}

/// Pair the result's score lists with the label lists they came from.
///
/// `normal_paths` and `abnormal_paths` must be the lists the result was
/// evaluated with; rows come out normal first, each in input order.
pub fn scored_images<N, A>(
    result: &EvaluationResult,
    normal_paths: &[N],
    abnormal_paths: &[A],
) -> Vec<ScoredImage>
where
    N: AsRef<Path>,
    A: AsRef<Path>,
{
    let normal = normal_paths
        .iter()
        .map(|p| label_key(p.as_ref()))
        .zip(result.normal_scores.iter().copied())
        .map(|(file, score)| (file, LabelClass::Normal, score));
    let abnormal = abnormal_paths
        .iter()
        .map(|p| label_key(p.as_ref()))
        .zip(result.abnormal_scores.iter().copied())
        .map(|(file, score)| (file, LabelClass::Abnormal, score));

    normal
        .chain(abnormal)
        .map(|(file, label, score)| {
            let predicted_abnormal = is_predicted_abnormal(score, result.threshold);
            ScoredImage {
                file,
                label,
                score,
                predicted_abnormal,
                outcome: Outcome::classify(label, predicted_abnormal),
            }
        })
        .collect()
}

/// Export per-image rows to CSV with headers:
/// file,label,score,predicted,outcome
pub fn export_csv(rows: &[ScoredImage], path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let mut wtr = csv::Writer::from_path(path)
        .with_context(|| format!("cannot create {}", path.display()))?;
    wtr.write_record(["file", "label", "score", "predicted", "outcome"])?;

    for row in rows {
        let predicted = if row.predicted_abnormal {
            LabelClass::Abnormal
        } else {
            LabelClass::Normal
        };
        wtr.write_record([
            row.file.as_str(),
            row.label.to_string().as_str(),
            format!("{}", row.score).as_str(),
            predicted.to_string().as_str(),
            row.outcome.to_string().as_str(),
        ])?;
    }

    wtr.flush()?;
    Ok(())
}

/// Write the result record as pretty-printed JSON.
pub fn export_json(result: &EvaluationResult, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let file = File::create(path).with_context(|| format!("cannot create {}", path.display()))?;
    serde_json::to_writer_pretty(BufWriter::new(file), result)
        .with_context(|| format!("cannot write {}", path.display()))?;
    Ok(())
}
