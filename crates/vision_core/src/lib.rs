//! Evaluation of batch anomaly-detection results.
//!
//! A batch inference call returns a zip with a `scores.csv` manifest. The
//! [`extract`] module turns that into a base-name → score map, and
//! [`evaluate`](evaluate::evaluate) reconciles the map with labeled normal
//! and abnormal images to produce a confusion matrix, derived metrics and
//! score distribution statistics.

pub mod error;
pub mod evaluate;
pub mod extract;
pub mod labels;
pub mod report;
pub mod stats;

pub use error::{EvaluationError, Result};
pub use evaluate::{
    ConfusionMatrix, EvaluationResult, Metrics, evaluate, evaluate_archive, is_predicted_abnormal,
};
pub use extract::{
    BatchArchive, MANIFEST_NAME, ScoreMap, base_name, extract_scores, extract_scores_from_path,
    parse_manifest,
};
pub use labels::{LabelClass, LabeledImageSet, ScanOptions, collect_images, expand_inputs};
pub use report::{Outcome, ScoredImage, export_csv, export_json, scored_images};
pub use stats::{ScoreDistribution, ScoreStats};

/// Threshold used when the caller does not pick one.
pub const DEFAULT_THRESHOLD: f64 = 0.68;
