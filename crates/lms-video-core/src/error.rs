//! Error types for the video player core

use crate::widgets::WidgetKind;
use thiserror::Error;

/// Result type alias for player operations
pub type Result<T> = std::result::Result<T, Error>;

/// Player error types
#[derive(Error, Debug)]
pub enum Error {
    // Configuration errors
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // Widget lifecycle errors
    #[error("Widget already attached: {kind}")]
    WidgetAlreadyAttached { kind: WidgetKind },

    #[error("Player has been destroyed")]
    Destroyed,

    // Persistence errors
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // Network errors
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Runtime channel closed")]
    ChannelClosed,

    // Internal errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Error::InvalidConfig(msg.into())
    }

    /// Returns true if this error is recoverable
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::Storage(_) | Error::Network(_) | Error::Json(_)
        )
    }

    /// Returns the error code for analytics
    pub fn error_code(&self) -> &'static str {
        match self {
            Error::InvalidConfig(_) => "INVALID_CONFIG",
            Error::WidgetAlreadyAttached { .. } => "WIDGET_ATTACHED",
            Error::Destroyed => "DESTROYED",
            Error::Storage(_) => "STORAGE",
            Error::Json(_) => "JSON",
            Error::Network(_) => "NETWORK",
            Error::ChannelClosed => "CHANNEL_CLOSED",
            Error::Internal(_) => "INTERNAL",
            Error::Io(_) => "IO",
        }
    }
}
