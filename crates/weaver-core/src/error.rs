//! Error types for Weaver Core.

use http::StatusCode;
use thiserror::Error;
use weaver_abstraction::ModelError;

use crate::config::ConfigError;

/// Core error type for Weaver operations.
#[derive(Error, Debug)]
pub enum WeaverError {
    /// The request was rejected before the model was called.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The model call succeeded but produced no text.
    #[error("Model returned an empty response")]
    EmptyModelOutput,

    /// The model call itself failed.
    #[error("Model invocation failed: {0}")]
    ModelInvocation(#[from] ModelError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP server errors
    #[error("Server error: {0}")]
    Server(#[from] hyper::Error),
}

impl WeaverError {
    /// HTTP status a request handler answers with for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidInput(_) => StatusCode::BAD_REQUEST,
            Self::EmptyModelOutput | Self::ModelInvocation(_) => StatusCode::BAD_GATEWAY,
            Self::Config(_) | Self::Io(_) | Self::Server(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable machine-readable name of the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => "invalid_input",
            Self::EmptyModelOutput => "empty_model_output",
            Self::ModelInvocation(_) => "model_invocation_failure",
            Self::Config(_) => "config",
            Self::Io(_) => "io",
            Self::Server(_) => "server",
        }
    }
}

/// Result type alias for Weaver operations.
pub type Result<T> = std::result::Result<T, WeaverError>;
