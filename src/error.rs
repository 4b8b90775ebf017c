//! Error types for Sage

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias using [`SageError`]
pub type Result<T> = std::result::Result<T, SageError>;

/// Main error type for Sage
#[derive(Debug, Error)]
pub enum SageError {
    /// Request rejected or non-success status before any stream data arrived
    #[error("Transport error{}: {detail}", fmt_status(.status))]
    Transport {
        status: Option<u16>,
        detail: String,
    },

    /// Backend signalled an error event, or the stream violated the wire contract
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Operation cancelled by the caller
    #[error("Operation cancelled")]
    Cancelled,

    /// A submission was attempted while another exchange is in flight
    #[error("An exchange is already in progress")]
    Busy,

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// HTTP request error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration parse error
    #[error("Failed to parse config at {path}: {message}")]
    ConfigParse { path: PathBuf, message: String },

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

fn fmt_status(status: &Option<u16>) -> String {
    match status {
        Some(code) => format!(" (HTTP {code})"),
        None => String::new(),
    }
}

impl SageError {
    /// Build a transport error from an HTTP status and detail text
    #[must_use]
    pub fn transport(status: u16, detail: impl Into<String>) -> Self {
        Self::Transport {
            status: Some(status),
            detail: detail.into(),
        }
    }

    /// Detail text suitable for embedding in a user-visible message
    #[must_use]
    pub fn detail(&self) -> String {
        match self {
            Self::Transport { detail, .. } => detail.clone(),
            other => other.to_string(),
        }
    }
}

impl From<String> for SageError {
    fn from(s: String) -> Self {
        SageError::Other(s)
    }
}

impl From<&str> for SageError {
    fn from(s: &str) -> Self {
        SageError::Other(s.to_string())
    }
}
