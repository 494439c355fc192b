//! Error types for Hearth operations.
//!
//! This module provides a common `Error` type and `Result<T>` alias used across
//! all Hearth crates. Uses `thiserror` for derive macros.

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur in Hearth operations.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// I/O error on a specific path.
    #[error("I/O error at {path}: {source}")]
    IoWithPath {
        /// The path being accessed.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Content not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid data or format.
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// The embedding provider failed or returned malformed output.
    #[error("Embedding error: {0}")]
    Embedding(String),

    /// The backing vector index failed.
    #[error("Backend error: {0}")]
    Backend(String),

    /// Any other failed operation.
    #[error("Operation failed: {0}")]
    Operation(String),
}

impl Error {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a not found error.
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create an invalid data error.
    pub fn invalid_data(msg: impl Into<String>) -> Self {
        Self::InvalidData(msg.into())
    }

    /// Create an embedding error.
    pub fn embedding(msg: impl Into<String>) -> Self {
        Self::Embedding(msg.into())
    }

    /// Create a backend error.
    pub fn backend(msg: impl Into<String>) -> Self {
        Self::Backend(msg.into())
    }

    /// Create a generic operation error.
    pub fn operation(msg: impl Into<String>) -> Self {
        Self::Operation(msg.into())
    }

    /// Wrap an I/O error with the path that caused it.
    pub fn io_with_path(source: std::io::Error, path: impl AsRef<Path>) -> Self {
        Self::IoWithPath {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// Whether the engine recovers from this error locally.
    ///
    /// Embedding and backend failures degrade a single batch or query;
    /// everything else points at misuse or broken configuration.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Embedding(_) | Self::Backend(_))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Result type alias using Hearth's Error type.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(
            Error::config("missing db_path").to_string(),
            "Configuration error: missing db_path"
        );
        assert_eq!(
            Error::embedding("model offline").to_string(),
            "Embedding error: model offline"
        );
        assert_eq!(
            Error::backend("table locked").to_string(),
            "Backend error: table locked"
        );
    }

    #[test]
    fn test_error_recoverable() {
        assert!(Error::embedding("x").is_recoverable());
        assert!(Error::backend("x").is_recoverable());
        assert!(!Error::config("x").is_recoverable());
        assert!(!Error::invalid_data("x").is_recoverable());
    }

    #[test]
    fn test_io_with_path() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err = Error::io_with_path(io, "/tmp/snapshot.json");
        let msg = err.to_string();
        assert!(msg.contains("/tmp/snapshot.json"));
        assert!(msg.contains("gone"));
    }

    #[test]
    fn test_from_serde_json() {
        let err: Error = serde_json::from_str::<serde_json::Value>("{not json")
            .unwrap_err()
            .into();
        assert!(matches!(err, Error::Serialization(_)));
    }

    #[test]
    fn test_from_io() {
        let err: Error = std::io::Error::other("boom").into();
        assert!(matches!(err, Error::Io(_)));
    }
}
