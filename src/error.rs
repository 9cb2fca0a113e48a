//! Error types for the prediction pipeline
//!
//! Each concern gets its own thiserror enum. `PipelineError` is what a
//! submission cycle can fail with; the HTTP layer maps everything into
//! `crate::api::ApiError`.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Errors raised by a `PredictionService` implementation
#[derive(Error, Debug)]
pub enum PredictError {
    #[error("Failed to load model from {path}: {reason}")]
    ModelLoad { path: PathBuf, reason: String },

    #[error("Predictor unavailable: {0}")]
    Unavailable(String),

    #[error("Inference failed: {0}")]
    Inference(String),
}

/// Errors that end a submission cycle in the `Failed` state
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Predictor(#[from] PredictError),

    #[error("Predictor did not answer within {}ms", .0.as_millis())]
    Timeout(Duration),

    #[error("Cycle {cycle} was superseded by cycle {latest}")]
    Superseded { cycle: u64, latest: u64 },
}

impl PipelineError {
    /// Stable machine-readable code, surfaced to clients on failed cycles
    pub fn code(&self) -> &'static str {
        match self {
            Self::Predictor(PredictError::Unavailable(_))
            | Self::Predictor(PredictError::ModelLoad { .. }) => "predictor_unavailable",
            Self::Predictor(PredictError::Inference(_)) => "inference_failure",
            Self::Timeout(_) => "predictor_timeout",
            Self::Superseded { .. } => "superseded",
        }
    }
}

/// Errors from table queries
#[derive(Error, Debug, PartialEq, Eq)]
pub enum TableError {
    #[error("Unknown column '{0}'")]
    UnknownColumn(String),

    #[error("Invalid sort direction '{0}', expected 'asc' or 'desc'")]
    InvalidDirection(String),

    #[error("Invalid page '{0}'")]
    InvalidPage(String),

    #[error("Unknown query parameter '{0}'")]
    UnknownParameter(String),

    #[error("CSV export failed: {0}")]
    Export(String),
}

/// Configuration loading errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Invalid value for {key}: {reason}")]
    Invalid { key: String, reason: String },
}
