//! Configuration error type.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while loading or mutating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The settings document exists but could not be read.
    #[error("failed to read settings file {path}")]
    ReadSettings {
        /// Settings document path.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },
    /// The settings document exists but is not valid JSON.
    #[error("settings file {path} is malformed")]
    ParseSettings {
        /// Settings document path.
        path: PathBuf,
        /// Underlying JSON error.
        #[source]
        source: serde_json::Error,
    },
    /// Persisting the settings document failed.
    #[error("failed to write settings file {path}")]
    WriteSettings {
        /// Settings document path.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },
    /// A settings field failed range validation.
    #[error("invalid setting {field}: {reason}")]
    InvalidSetting {
        /// Field name as it appears in the JSON document.
        field: &'static str,
        /// Machine-readable reason.
        reason: &'static str,
    },
}
