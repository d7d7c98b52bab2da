//! Errors signalled to subscribers through `on_error`

use thiserror::Error;
use uuid::Uuid;

use crate::channel::HandlerError;

/// Terminal errors ending a subscription
#[derive(Debug, Error)]
pub enum SubscriptionError {
    #[error("Demand must be positive, got request({requested})")]
    ProtocolViolation { requested: u64 },

    #[error("Subscriber failed on message {message_id}: {source}")]
    HandlerFailure {
        message_id: Uuid,
        #[source]
        source: HandlerError,
    },
}

impl SubscriptionError {
    pub fn is_protocol_violation(&self) -> bool {
        matches!(self, SubscriptionError::ProtocolViolation { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protocol_violation_message() {
        let err = SubscriptionError::ProtocolViolation { requested: 0 };
        assert!(err.is_protocol_violation());
        assert!(err.to_string().contains("request(0)"));
    }

    #[test]
    fn test_handler_failure_message() {
        let err = SubscriptionError::HandlerFailure {
            message_id: Uuid::nil(),
            source: "disk full".into(),
        };
        assert!(!err.is_protocol_violation());
        assert!(err.to_string().contains("disk full"));
    }
}
