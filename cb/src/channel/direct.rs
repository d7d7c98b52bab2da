//! DirectChannel - push-synchronous dispatch to a single handler

use std::sync::{Arc, RwLock};

use tracing::{debug, warn};

use super::error::ChannelError;
use super::{MessageChannel, MessageHandler};
use crate::message::Message;

/// A channel whose `send` invokes the attached handler on the caller's thread
///
/// At most one handler is attached. Without a handler every `send` fails with
/// [`ChannelError::DeliveryRejected`]; the channel never buffers.
pub struct DirectChannel<T> {
    name: String,
    handler: RwLock<Option<Arc<dyn MessageHandler<T>>>>,
}

impl<T> DirectChannel<T> {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        debug!(%name, "DirectChannel::new: called");
        Self {
            name,
            handler: RwLock::new(None),
        }
    }

    /// Attach the sole handler, replacing any previous one
    pub fn subscribe(&self, handler: Arc<dyn MessageHandler<T>>) {
        debug!(channel = %self.name, "DirectChannel::subscribe: called");
        let mut slot = self.handler.write().unwrap_or_else(|e| e.into_inner());
        if slot.is_some() {
            warn!(channel = %self.name, "DirectChannel::subscribe: replacing existing handler");
        }
        *slot = Some(handler);
    }

    /// Detach the handler; returns true if one was attached
    pub fn unsubscribe(&self) -> bool {
        debug!(channel = %self.name, "DirectChannel::unsubscribe: called");
        let mut slot = self.handler.write().unwrap_or_else(|e| e.into_inner());
        slot.take().is_some()
    }

    pub fn has_subscriber(&self) -> bool {
        self.handler.read().unwrap_or_else(|e| e.into_inner()).is_some()
    }
}

impl<T: Send + 'static> MessageChannel<T> for DirectChannel<T> {
    fn name(&self) -> &str {
        &self.name
    }

    fn send(&self, message: Message<T>) -> Result<(), ChannelError> {
        debug!(channel = %self.name, id = %message.id(), "DirectChannel::send: called");
        // Clone out of the lock so the handler runs without holding it
        let handler = self.handler.read().unwrap_or_else(|e| e.into_inner()).clone();
        let Some(handler) = handler else {
            debug!(channel = %self.name, "DirectChannel::send: no subscriber, rejecting");
            return Err(ChannelError::DeliveryRejected {
                channel: self.name.clone(),
            });
        };

        let message_id = message.id();
        handler.handle_message(message).map_err(|err| match err.downcast::<ChannelError>() {
            Ok(channel_err) => *channel_err,
            Err(source) => ChannelError::HandlerFailure {
                channel: self.name.clone(),
                message_id,
                source,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::HandlerError;
    use std::sync::Mutex;
    use std::thread;

    #[test]
    fn test_send_without_subscriber_is_rejected() {
        let channel: DirectChannel<&str> = DirectChannel::new("direct");
        for _ in 0..3 {
            let err = channel.send(Message::new("x")).unwrap_err();
            assert!(err.is_delivery_rejected());
        }
    }

    #[test]
    fn test_send_runs_handler_on_caller_thread() {
        let channel = DirectChannel::new("direct");
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();
        let caller = thread::current().id();

        channel.subscribe(Arc::new(move |m: Message<u32>| -> Result<(), HandlerError> {
            assert_eq!(thread::current().id(), caller);
            seen_clone.lock().unwrap().push(*m.payload());
            Ok(())
        }));

        channel.send(Message::new(1)).unwrap();
        channel.send(Message::new(2)).unwrap();
        assert_eq!(*seen.lock().unwrap(), vec![1, 2]);
    }

    #[test]
    fn test_handler_error_becomes_handler_failure() {
        let channel = DirectChannel::new("direct");
        channel.subscribe(Arc::new(|_m: Message<u32>| -> Result<(), HandlerError> {
            Err("bad payload".into())
        }));

        let msg = Message::new(5);
        let id = msg.id();
        match channel.send(msg) {
            Err(ChannelError::HandlerFailure { message_id, channel, .. }) => {
                assert_eq!(message_id, id);
                assert_eq!(channel, "direct");
            }
            other => panic!("Expected HandlerFailure, got {:?}", other),
        }
    }

    #[test]
    fn test_channel_error_from_handler_passes_through() {
        let channel = DirectChannel::new("direct");
        channel.subscribe(Arc::new(|_m: Message<u32>| -> Result<(), HandlerError> {
            Err(Box::new(ChannelError::DeliveryRejected {
                channel: "inner".to_string(),
            }))
        }));

        let err = channel.send(Message::new(1)).unwrap_err();
        assert!(err.is_delivery_rejected());
        assert_eq!(err.channel(), "inner");
    }

    #[test]
    fn test_unsubscribe_detaches_handler() {
        let channel = DirectChannel::new("direct");
        channel.subscribe(Arc::new(|_m: Message<u32>| -> Result<(), HandlerError> { Ok(()) }));
        assert!(channel.has_subscriber());
        assert!(channel.send(Message::new(1)).is_ok());

        assert!(channel.unsubscribe());
        assert!(!channel.unsubscribe());
        assert!(channel.send(Message::new(2)).unwrap_err().is_delivery_rejected());
    }
}
