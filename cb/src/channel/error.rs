//! Channel error types

use thiserror::Error;
use uuid::Uuid;

/// Error raised by a message handler or subscriber while processing a message
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// Errors returned synchronously from `send`
#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("Dispatcher has no subscribers for channel '{channel}'")]
    DeliveryRejected { channel: String },

    #[error("Handler failed for message {message_id} on channel '{channel}': {source}")]
    HandlerFailure {
        channel: String,
        message_id: Uuid,
        #[source]
        source: HandlerError,
    },

    #[error("Channel '{channel}' is full (capacity {capacity})")]
    Full { channel: String, capacity: usize },

    #[error("Channel '{channel}' is closed")]
    Closed { channel: String },
}

impl ChannelError {
    /// Check if the send failed because nothing was attached to consume it
    pub fn is_delivery_rejected(&self) -> bool {
        matches!(self, ChannelError::DeliveryRejected { .. })
    }

    /// Name of the channel the error came from
    pub fn channel(&self) -> &str {
        match self {
            ChannelError::DeliveryRejected { channel }
            | ChannelError::HandlerFailure { channel, .. }
            | ChannelError::Full { channel, .. }
            | ChannelError::Closed { channel } => channel,
        }
    }
}
