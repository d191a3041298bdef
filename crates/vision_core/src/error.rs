use crate::labels::LabelClass;
use thiserror::Error;

/// Failures that abort an evaluation. No partial result is ever produced.
#[derive(Debug, Error)]
pub enum EvaluationError {
    /// The archive has no manifest entry. Carries the entry names that were found.
    #[error("archive does not contain {manifest}; entries found: {entries:?}")]
    MissingManifest {
        manifest: String,
        entries: Vec<String>,
    },

    /// The manifest (or the archive around it) could not be read as tabular text.
    #[error("could not parse score manifest: {0}")]
    ManifestParse(String),

    /// A labeled image has no score in the batch result.
    #[error("no score found for {set} image '{filename}'")]
    UnmatchedImage { set: LabelClass, filename: String },

    #[error("archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<csv::Error> for EvaluationError {
    fn from(err: csv::Error) -> Self {
        EvaluationError::ManifestParse(err.to_string())
    }
}

pub type Result<T, E = EvaluationError> = std::result::Result<T, E>;
