//! Push path: delivers DirectChannel sends inline on the caller's thread
//!
//! One `PushRun` exists per bridge run. It is both the handler registered with
//! the DirectChannel and the demand signal behind the run's Subscription.
//!
//! Delivery uses a single-drainer protocol. The thread holding the drain turn
//! delivers pending messages while demand lasts. A sender on another thread
//! waits for the turn, so `send` returns only after its own message was handed
//! to `on_next` (or held for lack of demand) and a handler failure reaches the
//! sender of the failing message. Requests never wait: they update demand and
//! the active drainer picks the change up, which keeps `request` safe to call
//! from inside `on_next`.

use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread::{self, ThreadId};

use tokio::sync::Notify;
use tracing::{debug, warn};
use uuid::Uuid;

use super::Termination;
use crate::channel::{ChannelError, HandlerError, MessageHandler};
use crate::message::Message;
use crate::reactive::{Demand, DemandSignal, Subscriber, SubscriptionError};

/// Held sends allowed per run unless configured otherwise
pub const DEFAULT_PENDING_LIMIT: usize = 1024;

struct PushState<T> {
    demand: Demand,
    /// Accepted sends waiting for demand
    pending: VecDeque<Message<T>>,
    /// Thread holding the drain turn
    drainer: Option<ThreadId>,
    cancelled: bool,
    /// Set by the bridge on stop; the run accepts nothing after this
    detached: bool,
    /// A zero request waiting to be reported by the drainer
    violation: Option<u64>,
}

pub(crate) struct PushRun<T> {
    channel: String,
    subscriber: Arc<dyn Subscriber<T>>,
    termination: Arc<Termination>,
    pending_limit: usize,
    state: Mutex<PushState<T>>,
    /// Wakes senders waiting for the drain turn
    turn: Condvar,
    /// Wakes `detach` once no drain is active
    idle: Notify,
}

impl<T> PushRun<T> {
    pub(crate) fn new(
        channel: impl Into<String>,
        subscriber: Arc<dyn Subscriber<T>>,
        termination: Arc<Termination>,
        carried: VecDeque<Message<T>>,
        pending_limit: usize,
    ) -> Self {
        let channel = channel.into();
        debug!(%channel, carried = carried.len(), pending_limit, "PushRun::new: called");
        Self {
            channel,
            subscriber,
            termination,
            pending_limit,
            state: Mutex::new(PushState {
                demand: Demand::new(),
                pending: carried,
                drainer: None,
                cancelled: false,
                detached: false,
                violation: None,
            }),
            turn: Condvar::new(),
            idle: Notify::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, PushState<T>> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn is_closed(&self, state: &PushState<T>) -> bool {
        state.detached || state.cancelled || self.termination.is_terminated()
    }

    fn rejected(&self) -> HandlerError {
        Box::new(ChannelError::DeliveryRejected {
            channel: self.channel.clone(),
        })
    }

    fn full(&self) -> HandlerError {
        Box::new(ChannelError::Full {
            channel: self.channel.clone(),
            capacity: self.pending_limit,
        })
    }

    /// Deliver pending messages while demand lasts
    ///
    /// The caller must hold the drain turn. Returns the handler failure for
    /// `own` if that message failed; other failures are only logged because
    /// their senders have already returned.
    fn drain<'a>(&'a self, mut state: MutexGuard<'a, PushState<T>>, own: Option<Uuid>) -> Result<(), ChannelError> {
        let mut result = Ok(());
        loop {
            if !state.cancelled
                && let Some(requested) = state.violation.take()
            {
                drop(state);
                self.termination.set("protocol violation");
                warn!(channel = %self.channel, requested, "PushRun::drain: invalid demand request");
                self.subscriber
                    .on_error(SubscriptionError::ProtocolViolation { requested });
                state = self.lock();
                break;
            }
            if self.is_closed(&state) {
                break;
            }
            if state.pending.is_empty() || !state.demand.try_consume() {
                break;
            }
            let Some(message) = state.pending.pop_front() else {
                state.demand.restore();
                break;
            };

            let message_id = message.id();
            drop(state);
            let outcome = self.subscriber.on_next(message);
            state = self.lock();

            if let Err(source) = outcome {
                warn!(channel = %self.channel, %message_id, error = %source, "PushRun::drain: subscriber failed");
                if own == Some(message_id) {
                    result = Err(ChannelError::HandlerFailure {
                        channel: self.channel.clone(),
                        message_id,
                        source,
                    });
                }
            }
        }
        state.drainer = None;
        drop(state);
        self.turn.notify_all();
        self.idle.notify_waiters();
        result
    }

    /// Detach from the channel and hand back undelivered messages
    ///
    /// Waits for an in-flight drain to finish first.
    pub(crate) async fn detach(&self) -> VecDeque<Message<T>> {
        debug!(channel = %self.channel, "PushRun::detach: called");
        self.lock().detached = true;
        self.turn.notify_all();
        loop {
            let notified = self.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let mut state = self.lock();
                if state.drainer.is_none() {
                    return std::mem::take(&mut state.pending);
                }
            }
            notified.await;
        }
    }
}

impl<T: Send> MessageHandler<T> for PushRun<T> {
    fn handle_message(&self, message: Message<T>) -> Result<(), HandlerError> {
        let me = thread::current().id();
        let mut state = self.lock();
        loop {
            if self.is_closed(&state) {
                debug!(channel = %self.channel, "PushRun::handle_message: run closed, rejecting");
                return Err(self.rejected());
            }
            match state.drainer {
                None => break,
                Some(drainer) if drainer == me => {
                    // Sent from inside on_next; the outer drain delivers it
                    if state.pending.len() >= self.pending_limit {
                        return Err(self.full());
                    }
                    state.pending.push_back(message);
                    return Ok(());
                }
                Some(_) => state = self.turn.wait(state).unwrap_or_else(|e| e.into_inner()),
            }
        }

        if state.pending.len() >= self.pending_limit && !state.demand.has_demand() {
            debug!(channel = %self.channel, pending = state.pending.len(), "PushRun::handle_message: pending buffer full");
            return Err(self.full());
        }
        let own = message.id();
        state.pending.push_back(message);
        state.drainer = Some(me);
        self.drain(state, Some(own)).map_err(|e| Box::new(e) as HandlerError)
    }
}

impl<T: Send> DemandSignal for PushRun<T> {
    fn request(&self, n: u64) {
        let mut state = self.lock();
        if self.is_closed(&state) {
            debug!(channel = %self.channel, n, "PushRun::request: run closed, ignoring");
            return;
        }
        if let Err(SubscriptionError::ProtocolViolation { requested }) = state.demand.add(n) {
            state.violation = Some(requested);
        }
        if state.drainer.is_some() {
            return;
        }
        state.drainer = Some(thread::current().id());
        // Nothing here has a sender waiting, so failures are only logged
        let _ = self.drain(state, None);
    }

    fn cancel(&self) {
        let mut state = self.lock();
        if state.cancelled {
            return;
        }
        state.cancelled = true;
        drop(state);
        debug!(channel = %self.channel, "PushRun::cancel: cancelled");
        self.termination.set("cancelled");
        self.turn.notify_all();
    }

    fn is_cancelled(&self) -> bool {
        self.lock().cancelled
    }
}
