//! Error types for Screen Analysis.
//!
//! Errors are split by who caused them: client input errors (bad image,
//! unknown backend) and server-side failures (backend unreachable, model
//! missing). The HTTP layer maps the first class to 400 and the second to 500.

use thiserror::Error;

use crate::types::Backend;

/// Errors produced while analyzing an image.
#[derive(Error, Debug)]
pub enum AnalysisError {
    /// The image payload could not be decoded into a raster image
    #[error("Invalid image data: {0}")]
    InvalidImage(String),

    /// The requested backend name is not one of the supported backends
    #[error("Unsupported backend: {0}")]
    UnsupportedBackend(String),

    /// The request is malformed in some other way (missing fields, bad JSON)
    #[error("{0}")]
    InvalidRequest(String),

    /// A backend call failed (network error, HTTP error, bad response)
    #[error("{message}")]
    Backend { backend: Backend, message: String },

    /// The local captioning model could not be loaded or run
    #[error("Model error: {message}")]
    Model { message: String },

    /// An operation exceeded its time budget
    #[error("Timeout in {stage} stage after {timeout_ms}ms")]
    Timeout { stage: String, timeout_ms: u64 },

    /// Anything else (task join failures and similar)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AnalysisError {
    /// Whether this error was caused by the client's input.
    ///
    /// A decode timeout counts as a client error: it is a property of the
    /// submitted image, not of the service.
    pub fn is_client_error(&self) -> bool {
        match self {
            AnalysisError::InvalidImage(_)
            | AnalysisError::UnsupportedBackend(_)
            | AnalysisError::InvalidRequest(_) => true,
            AnalysisError::Timeout { stage, .. } => stage == "decode",
            AnalysisError::Backend { .. }
            | AnalysisError::Model { .. }
            | AnalysisError::Internal(_) => false,
        }
    }
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to read the config file from disk
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    /// Failed to parse TOML configuration
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Configuration values are invalid
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Convenience type alias for analysis results.
pub type Result<T> = std::result::Result<T, AnalysisError>;

/// Render an error and its chain of sources as `outer: inner: root`.
///
/// `reqwest` hides the interesting part of a connection failure
/// ("Connection refused") in the source chain, so plain `Display` is not
/// enough for an error message a client can act on.
pub fn error_chain(error: &dyn std::error::Error) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        let cause_text = cause.to_string();
        if !message.contains(&cause_text) {
            message.push_str(": ");
            message.push_str(&cause_text);
        }
        source = cause.source();
    }
    message
}
