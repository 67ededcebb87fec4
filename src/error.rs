//! Error types for product-harvest
//!
//! Two layers of errors live here:
//! - [`Error`] covers pipeline-level failures (bad configuration, unreadable input,
//!   unwritable output). These are fatal and returned to the caller.
//! - [`FetchError`] covers a single fetch attempt for one identifier. These never
//!   escape the retry driver; they are classified into an [`ErrorCategory`] and
//!   routed into the error ledger.

use crate::types::ErrorCategory;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for product-harvest operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for product-harvest
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "fetch.concurrency")
        key: Option<String>,
    },

    /// The identifier worklist could not be read
    #[error("cannot read input list {path}: {source}")]
    InputUnreadable {
        /// Path of the input file
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// An output directory could not be created
    #[error("cannot create output directory {path}: {source}")]
    OutputDir {
        /// Directory that could not be created
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Network error outside of a single fetch (e.g. building the HTTP client)
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The aggregator task stopped unexpectedly
    #[error("aggregator error: {0}")]
    Aggregator(String),

    /// Some identifiers never produced an outcome
    #[error("run ended with {resolved} of {attempted} identifiers resolved")]
    Incomplete {
        /// Identifiers in the worklist
        attempted: usize,
        /// Outcomes that reached the aggregator
        resolved: usize,
    },
}

impl Error {
    /// Shorthand for a [`Error::Config`] pointing at a specific key
    pub fn config(key: &str, message: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
            key: Some(key.to_string()),
        }
    }
}

/// Failure of a single fetch attempt
#[derive(Debug, Error)]
pub enum FetchError {
    /// The request completed with a non-2xx status
    #[error("unexpected HTTP status {0}")]
    Status(u16),

    /// Connection, timeout, or body transfer failure
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The response body was not the expected JSON document
    #[error("invalid response body: {0}")]
    Decode(String),
}

impl FetchError {
    /// Classify this failure into the category recorded in the error ledger
    pub fn category(&self) -> ErrorCategory {
        match self {
            FetchError::Status(code) => ErrorCategory::Status(*code),
            FetchError::Transport(_) | FetchError::Decode(_) => ErrorCategory::Exception,
        }
    }
}

impl From<serde_json::Error> for FetchError {
    fn from(e: serde_json::Error) -> Self {
        FetchError::Decode(e.to_string())
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_maps_to_status_category() {
        assert_eq!(FetchError::Status(404).category(), ErrorCategory::Status(404));
        assert_eq!(FetchError::Status(500).category().to_string(), "status_500");
    }

    #[test]
    fn decode_failure_is_an_exception() {
        let err: FetchError = serde_json::from_str::<serde_json::Value>("{not json")
            .unwrap_err()
            .into();
        assert_eq!(err.category(), ErrorCategory::Exception);
    }

    #[test]
    fn config_helper_sets_key() {
        let err = Error::config("retry.max_attempts", "must be at least 1");
        match &err {
            Error::Config { key, message } => {
                assert_eq!(key.as_deref(), Some("retry.max_attempts"));
                assert_eq!(message, "must be at least 1");
            }
            other => panic!("unexpected variant: {other:?}"),
        }
        assert_eq!(err.to_string(), "configuration error: must be at least 1");
    }

    #[test]
    fn input_unreadable_displays_path() {
        let err = Error::InputUnreadable {
            path: PathBuf::from("ids.csv"),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "missing"),
        };
        assert_eq!(err.to_string(), "cannot read input list ids.csv: missing");
    }
}
