//! Reactive consumer bridge
//!
//! [`ReactiveConsumer`] attaches a demand-driven [`Subscriber`](crate::reactive::Subscriber)
//! to any [`Channel`](crate::channel::Channel):
//! - **Direct:** registers as the channel's handler and delivers on the sender's thread
//! - **Broadcast / Queue:** runs a background pull loop parked while demand is zero
//!
//! Stopping pauses delivery without a terminal signal. Starting again calls
//! `on_subscribe` once more; every handle the consumer issued, old or new,
//! drives the current run.

mod consumer;
mod error;
mod pull;
mod push;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tracing::debug;

pub use consumer::ReactiveConsumer;
pub use error::BridgeError;
pub use push::DEFAULT_PENDING_LIMIT;

use crate::reactive::DemandSignal;

/// Records why a subscription ended; shared by a bridge and its runs
///
/// The first reason recorded wins.
#[derive(Debug, Default)]
pub(crate) struct Termination {
    reason: Mutex<Option<String>>,
}

impl Termination {
    pub(crate) fn set(&self, reason: &str) {
        let mut slot = self.reason.lock().unwrap_or_else(|e| e.into_inner());
        if slot.is_none() {
            *slot = Some(reason.to_string());
        }
    }

    pub(crate) fn reason(&self) -> Option<String> {
        self.reason.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub(crate) fn is_terminated(&self) -> bool {
        self.reason.lock().unwrap_or_else(|e| e.into_inner()).is_some()
    }
}

/// Demand signal shared by every Subscription one consumer hands out
///
/// Forwards to the signal of the run that is currently attached. While the
/// consumer is stopped there is no run and requests are dropped.
pub(crate) struct SignalSlot {
    termination: Arc<Termination>,
    current: Mutex<Option<Arc<dyn DemandSignal>>>,
    cancelled: AtomicBool,
}

impl SignalSlot {
    pub(crate) fn new(termination: Arc<Termination>) -> Self {
        Self {
            termination,
            current: Mutex::new(None),
            cancelled: AtomicBool::new(false),
        }
    }

    pub(crate) fn bind(&self, signal: Arc<dyn DemandSignal>) {
        *self.current.lock().unwrap_or_else(|e| e.into_inner()) = Some(signal);
    }

    pub(crate) fn unbind(&self) {
        self.current.lock().unwrap_or_else(|e| e.into_inner()).take();
    }

    fn current(&self) -> Option<Arc<dyn DemandSignal>> {
        // Cloned out so a request from inside on_next never holds the lock
        self.current.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl DemandSignal for SignalSlot {
    fn request(&self, n: u64) {
        match self.current() {
            Some(signal) => signal.request(n),
            None => debug!(n, "SignalSlot::request: consumer stopped, ignoring"),
        }
    }

    fn cancel(&self) {
        if self.cancelled.swap(true, Ordering::SeqCst) {
            return;
        }
        match self.current() {
            Some(signal) => signal.cancel(),
            None => self.termination.set("cancelled"),
        }
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}
