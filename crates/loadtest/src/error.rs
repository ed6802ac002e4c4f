//! Error types for the load harness.

use engine_client::EngineError;
use thiserror::Error;

/// Result type alias using HarnessError.
pub type HarnessResult<T> = Result<T, HarnessError>;

/// Errors raised while validating or executing a load run.
///
/// The display strings of the validation variants are part of the HTTP
/// surface: they are returned verbatim in `{ok:false, error}` bodies.
#[derive(Debug, Error)]
pub enum HarnessError {
    #[error("Unsupported scenario")]
    UnsupportedScenario,

    #[error("Unsupported profile")]
    UnsupportedProfile,

    #[error("Command not allowed: {0}")]
    CommandNotAllowed(String),

    #[error("No usable model")]
    NoUsableModel,

    #[error("run still active after {0}s poll budget")]
    PollBudgetExhausted(u64),

    #[error(transparent)]
    Engine(#[from] EngineError),
}

impl HarnessError {
    /// HTTP status for failures raised before the stream opens.
    pub fn http_status_code(&self) -> u16 {
        match self {
            HarnessError::UnsupportedScenario
            | HarnessError::UnsupportedProfile
            | HarnessError::CommandNotAllowed(_)
            | HarnessError::NoUsableModel => 400,
            HarnessError::PollBudgetExhausted(_) => 500,
            HarnessError::Engine(_) => 502,
        }
    }
}
