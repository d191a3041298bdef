//! Descriptive statistics over raw score sequences.

use serde::{Deserialize, Serialize};

/// Summary of one score sequence. Standard deviation is the population
/// one (sum of squared deviations divided by `count`).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreStats {
    pub count: usize,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl ScoreStats {
    /// Returns `None` for an empty sequence.
    pub fn from_scores(scores: &[f64]) -> Option<Self> {
        if scores.is_empty() {
            return None;
        }
        let count = scores.len();
        let min = scores.iter().copied().fold(f64::INFINITY, f64::min);
        let max = scores.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let mean = scores.iter().sum::<f64>() / count as f64;
        let variance = scores.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / count as f64;
        Some(Self {
            count,
            min,
            max,
            mean,
            std_dev: variance.sqrt(),
        })
    }
}

/// Score distribution of both label sets.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreDistribution {
    pub normal: Option<ScoreStats>,
    pub abnormal: Option<ScoreStats>,
    /// `|mean(abnormal) - mean(normal)|`, present only when both sets have scores.
    pub mean_gap: Option<f64>,
}

impl ScoreDistribution {
    pub fn new(normal_scores: &[f64], abnormal_scores: &[f64]) -> Self {
        let normal = ScoreStats::from_scores(normal_scores);
        let abnormal = ScoreStats::from_scores(abnormal_scores);
        let mean_gap = match (&normal, &abnormal) {
            (Some(n), Some(a)) => Some((a.mean - n.mean).abs()),
            _ => None,
        };
        Self {
            normal,
            abnormal,
            mean_gap,
        }
    }
}
