//! Bridge error types

use thiserror::Error;

/// Errors from initializing or starting a lifecycle component
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("'{0}' must be initialized before start")]
    NotInitialized(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Subscription ended ({reason}); build a new consumer to resume")]
    Terminated { reason: String },

    #[error("No tokio runtime available to run the pull loop")]
    NoRuntime,
}

impl BridgeError {
    pub fn is_terminated(&self) -> bool {
        matches!(self, BridgeError::Terminated { .. })
    }
}
