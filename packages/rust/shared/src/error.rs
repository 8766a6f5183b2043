//! Error types for notescout.
//!
//! Library crates use [`NoteScoutError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all notescout operations.
#[derive(Debug, thiserror::Error)]
pub enum NoteScoutError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Network/HTTP error while talking to the upstream API.
    #[error("network error: {0}")]
    Network(String),

    /// Signing bridge failure (spawn, protocol, or malformed headers).
    #[error("signer error: {0}")]
    Signer(String),

    /// Response payload could not be parsed.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// Export collaborator failure.
    #[error("export error: {0}")]
    Export(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Data validation error (bad config value, malformed input, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, NoteScoutError>;

impl NoteScoutError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a parse error from any displayable message.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Create a signer error from any displayable message.
    pub fn signer(msg: impl Into<String>) -> Self {
        Self::Signer(msg.into())
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_formatting() {
        let err = NoteScoutError::config("cookie env var not set");
        assert_eq!(err.to_string(), "config error: cookie env var not set");

        let err = NoteScoutError::signer("bridge closed stdout");
        assert_eq!(err.to_string(), "signer error: bridge closed stdout");

        let err = NoteScoutError::validation("target_count must be positive");
        assert!(err.to_string().contains("target_count"));
    }

    #[test]
    fn io_error_keeps_path() {
        let source = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err = NoteScoutError::io("/tmp/out.csv", source);
        let msg = err.to_string();
        assert!(msg.contains("/tmp/out.csv"));
        assert!(msg.contains("gone"));
    }
}
