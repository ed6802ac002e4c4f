//! Error types for engine API calls.

use thiserror::Error;

/// Result type alias using EngineError.
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors surfaced by the engine client.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Connect, TLS, timeout or body-read failure before a response decoded.
    #[error("engine request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The engine answered with a non-success status.
    #[error("engine returned {status}: {message}")]
    Api { status: u16, message: String },

    /// The response body did not match the expected shape.
    #[error("unexpected engine response: {0}")]
    Decode(#[from] serde_json::Error),
}

impl EngineError {
    /// Status code reported by the engine, when one was received.
    pub fn status(&self) -> Option<u16> {
        match self {
            EngineError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}
