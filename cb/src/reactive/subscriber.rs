//! Subscriber contract and the subscription handle

use std::fmt;
use std::sync::Arc;

use tracing::debug;
use uuid::Uuid;

use super::error::SubscriptionError;
use crate::channel::HandlerError;
use crate::message::Message;

/// A demand-driven consumer
///
/// Signals for one subscription follow the usual three phases:
/// `on_subscribe` once, then `on_next` at most as many times as the demand
/// requested through the [`Subscription`], then at most one of `on_error` or
/// `on_complete`. `on_next` calls are strictly sequential and never overlap a
/// terminal signal. Returning an error from `on_next` is a handler failure.
pub trait Subscriber<T>: Send + Sync {
    fn on_subscribe(&self, subscription: Subscription);

    fn on_next(&self, message: Message<T>) -> Result<(), HandlerError>;

    fn on_error(&self, error: SubscriptionError);

    fn on_complete(&self);
}

/// Receiving side of a subscription handle
pub(crate) trait DemandSignal: Send + Sync {
    fn request(&self, n: u64);

    fn cancel(&self);

    fn is_cancelled(&self) -> bool;
}

/// Handle given to a subscriber for requesting demand and cancelling
///
/// Cheap to clone and usable from any thread, including from inside
/// `on_next`. Handles from one consumer stay valid across stop/start; requests
/// made while the consumer is stopped are dropped.
#[derive(Clone)]
pub struct Subscription {
    id: Uuid,
    signal: Arc<dyn DemandSignal>,
}

impl Subscription {
    pub(crate) fn new(signal: Arc<dyn DemandSignal>) -> Self {
        let id = Uuid::now_v7();
        debug!(%id, "Subscription::new: called");
        Self { id, signal }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Ask for `n` more messages
    ///
    /// `n == 0` is a protocol violation, reported through `on_error`.
    pub fn request(&self, n: u64) {
        debug!(id = %self.id, n, "Subscription::request: called");
        self.signal.request(n);
    }

    /// Stop delivery; idempotent
    pub fn cancel(&self) {
        debug!(id = %self.id, "Subscription::cancel: called");
        self.signal.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.signal.is_cancelled()
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}
