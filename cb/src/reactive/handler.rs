//! HandlerSubscriber - adapts a plain message handler to the subscriber contract

use std::sync::{Arc, Mutex};

use tracing::{debug, error, info};

use super::error::SubscriptionError;
use super::subscriber::{Subscriber, Subscription};
use crate::channel::{HandlerError, MessageHandler};
use crate::message::Message;

struct HandlerState {
    subscription: Option<Subscription>,
    /// Deliveries since the last batch request
    received: u64,
}

/// Subscriber that forwards every message to a [`MessageHandler`]
///
/// Requests unbounded demand on subscribe, or `batch` at a time when built
/// with [`HandlerSubscriber::with_batch`], topping up after each full batch.
pub struct HandlerSubscriber<T> {
    handler: Arc<dyn MessageHandler<T>>,
    batch: Option<u64>,
    state: Mutex<HandlerState>,
}

impl<T> HandlerSubscriber<T> {
    pub fn new(handler: Arc<dyn MessageHandler<T>>) -> Self {
        Self::with_batch(handler, None)
    }

    /// `batch` of `None` (or zero) requests unbounded demand
    pub fn with_batch(handler: Arc<dyn MessageHandler<T>>, batch: Option<u64>) -> Self {
        let batch = batch.filter(|n| *n > 0);
        debug!(?batch, "HandlerSubscriber::with_batch: called");
        Self {
            handler,
            batch,
            state: Mutex::new(HandlerState {
                subscription: None,
                received: 0,
            }),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HandlerState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl<T> Subscriber<T> for HandlerSubscriber<T> {
    fn on_subscribe(&self, subscription: Subscription) {
        debug!(id = %subscription.id(), "HandlerSubscriber::on_subscribe: called");
        {
            let mut state = self.lock();
            state.subscription = Some(subscription.clone());
            state.received = 0;
        }
        subscription.request(self.batch.unwrap_or(u64::MAX));
    }

    fn on_next(&self, message: Message<T>) -> Result<(), HandlerError> {
        self.handler.handle_message(message)?;

        let Some(batch) = self.batch else {
            return Ok(());
        };
        let top_up = {
            let mut state = self.lock();
            state.received += 1;
            if state.received >= batch {
                state.received = 0;
                state.subscription.clone()
            } else {
                None
            }
        };
        if let Some(subscription) = top_up {
            debug!(batch, "HandlerSubscriber::on_next: requesting next batch");
            subscription.request(batch);
        }
        Ok(())
    }

    fn on_error(&self, error: SubscriptionError) {
        error!(error = %error, "HandlerSubscriber: subscription failed");
        self.lock().subscription = None;
    }

    fn on_complete(&self) {
        info!("HandlerSubscriber: subscription completed");
        self.lock().subscription = None;
    }
}
