//! Error types for ds-core

use thiserror::Error;

/// Core error type for Docshift
#[derive(Error, Debug)]
pub enum CoreError {
    /// C001: Configuration file not found
    #[error("[C001] Config file not found: {path}")]
    ConfigNotFound { path: String },

    /// C002: Invalid configuration value
    #[error("[C002] Invalid config: {message}")]
    ConfigInvalid { message: String },

    /// C003: Field path could not be parsed
    #[error("[C003] Invalid field path '{path}': {reason}")]
    InvalidFieldPath { path: String, reason: String },

    /// C004: An intermediate path segment holds a non-object value
    #[error("[C004] Cannot descend into '{path}': segment '{segment}' is not an object")]
    PathConflict { path: String, segment: String },

    /// C005: Attempt to modify the document identifier
    #[error("[C005] Field '{field}' is immutable")]
    ImmutableField { field: String },

    /// C006: IO error with file path context
    #[error("[C006] Failed to read '{path}': {source}")]
    IoWithPath {
        path: String,
        source: std::io::Error,
    },

    /// C007: YAML parse error
    #[error("[C007] Config parse error: {0}")]
    YamlParse(#[from] serde_yaml::Error),
}

/// Result type alias for CoreError
pub type CoreResult<T> = Result<T, CoreError>;
