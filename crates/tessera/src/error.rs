//! Error types for Tessera operations.
//!
//! Errors are split the same way extraction results are:
//!
//! - **`Error`**: misuse of the library contract (bad configuration, double
//!   registry installation) or failures outside any one file. These halt
//!   the operation and are returned as `Err`.
//! - **`Diagnostic`** (see [`crate::diagnostics`]): everything scoped to a
//!   single file. Those are collected next to the partial result and never
//!   abort extraction.

use thiserror::Error;

/// Result type for Tessera operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type for Tessera operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid configuration or arguments
    #[error("configuration error: {0}")]
    Config(String),

    /// File system operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The adapter registry was misused
    #[error("registry error: {0}")]
    Registry(String),

    /// Configuration file could not be parsed
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Output could not be serialized
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Build a configuration error from any displayable message.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Returns `true` if the error was caused by caller input rather than
    /// an internal failure.
    #[must_use]
    pub fn is_input_error(&self) -> bool {
        matches!(self, Self::Config(_) | Self::Yaml(_) | Self::Registry(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_errors_are_input_errors() {
        let err = Error::config("maxConcurrency must be at least 1");
        assert!(err.is_input_error());
        assert_eq!(
            err.to_string(),
            "configuration error: maxConcurrency must be at least 1"
        );
    }

    #[test]
    fn io_errors_are_internal() {
        let err = Error::from(std::io::Error::other("disk gone"));
        assert!(!err.is_input_error());
        assert!(err.to_string().starts_with("I/O error:"));
    }
}
