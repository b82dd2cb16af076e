//! Error types for the LOD pipeline

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for the crate
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid or missing inputs, unknown CRS, empty format set, missing strategy
    #[error("Config error: {0}")]
    Config(String),

    /// PLY parse failure, unsupported PLY variant, empty mesh after parse
    #[error("Input error: {0}")]
    Input(String),

    /// Simplification or tree-construction failure, invariant violations
    #[error("Processing error: {0}")]
    Processing(String),

    /// Write, serialization or compression failure
    #[error("Output error: {0}")]
    Output(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Coarse error classification surfaced in pipeline results
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    Config,
    Input,
    Processing,
    Output,
    Cancelled,
}

impl Error {
    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Config(_) => ErrorKind::Config,
            Error::Input(_) => ErrorKind::Input,
            Error::Processing(_) => ErrorKind::Processing,
            Error::Output(_) | Error::Io(_) | Error::Json(_) => ErrorKind::Output,
            Error::Cancelled => ErrorKind::Cancelled,
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ErrorKind::Config => "ConfigError",
            ErrorKind::Input => "InputError",
            ErrorKind::Processing => "ProcessingError",
            ErrorKind::Output => "OutputError",
            ErrorKind::Cancelled => "Cancelled",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_errors_classify_as_output() {
        let err: Error = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied").into();
        assert_eq!(err.kind(), ErrorKind::Output);
        assert!(err.to_string().contains("denied"));
    }

    #[test]
    fn test_kind_display() {
        assert_eq!(Error::Cancelled.kind().to_string(), "Cancelled");
        assert_eq!(Error::Config("x".into()).kind().to_string(), "ConfigError");
    }
}
