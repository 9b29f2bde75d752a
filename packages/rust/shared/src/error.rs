//! Error types for DocScout.
//!
//! Library crates use [`DocScoutError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.
//!
//! Per-target fetch and extraction failures are recovered locally and
//! recorded on the bundle; only configuration and output-path errors abort
//! a pipeline run.

use std::path::PathBuf;

/// Top-level error type for all DocScout operations.
#[derive(Debug, thiserror::Error)]
pub enum DocScoutError {
    /// Configuration loading/validation error, or an unwritable output
    /// path. The only error class that halts a run before fetching.
    #[error("config error: {message}")]
    Config { message: String },

    /// Network/HTTP error during fetch. Recovered into a `FetchResult`.
    #[error("network error: {0}")]
    Network(String),

    /// Content that could not be scanned (malformed or binary). Logged,
    /// produces zero extractions.
    #[error("extraction skipped: {0}")]
    Extraction(String),

    /// URL cache (libSQL) error.
    #[error("cache error: {0}")]
    Cache(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Data validation error (schema mismatch, malformed artifact, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, DocScoutError>;

impl DocScoutError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether this error should abort the run (vs. being recorded and
    /// recovered per-target).
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Config { .. } | Self::Io { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_formatting() {
        let err = DocScoutError::config("output directory is not writable");
        assert_eq!(
            err.to_string(),
            "config error: output directory is not writable"
        );

        let err = DocScoutError::Network("HTTP 503".into());
        assert!(err.to_string().contains("503"));
    }

    #[test]
    fn fatality_classification() {
        assert!(DocScoutError::config("bad").is_fatal());
        assert!(!DocScoutError::Network("down".into()).is_fatal());
        assert!(!DocScoutError::Extraction("binary".into()).is_fatal());
    }
}
