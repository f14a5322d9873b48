//! Error types for the analytics pipeline.

use std::path::PathBuf;
use thiserror::Error;

/// Every fatal condition the pipeline can hit. Nothing is retried.
#[derive(Debug, Error)]
pub enum AnalyticsError {
    /// The input file is missing, unreadable, malformed or lacks required columns.
    #[error("failed to load {}: {reason}", path.display())]
    DataLoad { path: PathBuf, reason: String },

    /// Too little usable data survived cleaning, or a label was rejected.
    #[error("data quality check failed: {0}")]
    DataQuality(String),

    /// A guarded computation still reached an invalid state.
    #[error("computation failed: {0}")]
    Computation(String),

    /// A report artifact could not be drawn or written.
    #[error("failed to write report '{artifact}': {reason}")]
    OutputWrite { artifact: String, reason: String },

    /// Invalid run configuration.
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl AnalyticsError {
    pub(crate) fn load(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::DataLoad {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn output(artifact: impl Into<String>, reason: impl ToString) -> Self {
        Self::OutputWrite {
            artifact: artifact.into(),
            reason: reason.to_string(),
        }
    }
}
