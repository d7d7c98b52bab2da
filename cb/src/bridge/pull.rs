//! Pull path: a background task forwarding Broadcast/Queue messages on demand

use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::Notify;
use tracing::{debug, info, warn};

use super::Termination;
use crate::channel::{BroadcastChannel, MessageChannel, QueueChannel, SubscriberId};
use crate::message::Message;
use crate::reactive::{Demand, DemandSignal, Subscriber, SubscriptionError};

struct PullState {
    demand: Demand,
    cancelled: bool,
    detached: bool,
    violation: Option<u64>,
}

/// Demand signal for one pull run; wakes the loop on every change
pub(crate) struct PullSignal {
    termination: Arc<Termination>,
    state: Mutex<PullState>,
    notify: Notify,
}

/// What the loop should do next
#[derive(Debug, PartialEq, Eq)]
enum Wake {
    Demand,
    Detached,
    Cancelled,
    Violation(u64),
}

impl PullSignal {
    pub(crate) fn new(termination: Arc<Termination>) -> Self {
        Self {
            termination,
            state: Mutex::new(PullState {
                demand: Demand::new(),
                cancelled: false,
                detached: false,
                violation: None,
            }),
            notify: Notify::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, PullState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Pause the run; the loop exits after any in-flight delivery
    pub(crate) fn detach(&self) {
        debug!("PullSignal::detach: called");
        self.lock().detached = true;
        self.notify.notify_waiters();
    }

    fn check(&self) -> Option<Wake> {
        let mut state = self.lock();
        // A violation is terminal even when the run was detached after it
        if let Some(requested) = state.violation.take() {
            Some(Wake::Violation(requested))
        } else if state.detached {
            Some(Wake::Detached)
        } else if state.cancelled {
            Some(Wake::Cancelled)
        } else if state.demand.has_demand() {
            Some(Wake::Demand)
        } else {
            None
        }
    }

    /// Park until there is demand or the run is interrupted
    async fn ready(&self) -> Wake {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(wake) = self.check() {
                return wake;
            }
            notified.await;
        }
    }

    /// Resolve once the run is detached, cancelled or has a pending violation
    async fn interrupted(&self) {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.is_interrupted() {
                return;
            }
            notified.await;
        }
    }

    fn is_interrupted(&self) -> bool {
        let state = self.lock();
        state.detached || state.cancelled || state.violation.is_some()
    }

    /// Take one unit of demand unless the run was interrupted
    fn try_consume(&self) -> bool {
        let mut state = self.lock();
        if state.detached || state.cancelled || state.violation.is_some() {
            return false;
        }
        state.demand.try_consume()
    }
}

impl DemandSignal for PullSignal {
    fn request(&self, n: u64) {
        {
            let mut state = self.lock();
            if state.detached || state.cancelled {
                debug!(n, "PullSignal::request: run closed, ignoring");
                return;
            }
            if let Err(SubscriptionError::ProtocolViolation { requested }) = state.demand.add(n) {
                state.violation = Some(requested);
            }
        }
        self.notify.notify_waiters();
    }

    fn cancel(&self) {
        {
            let mut state = self.lock();
            if state.cancelled {
                return;
            }
            state.cancelled = true;
        }
        self.termination.set("cancelled");
        self.notify.notify_waiters();
    }

    fn is_cancelled(&self) -> bool {
        self.lock().cancelled
    }
}

/// The channel a pull run reads from
pub(crate) enum PullSource<T> {
    Broadcast {
        channel: Arc<BroadcastChannel<T>>,
        cursor: SubscriberId,
    },
    Queue(Arc<QueueChannel<T>>),
}

impl<T: Clone + Send + 'static> PullSource<T> {
    fn name(&self) -> &str {
        match self {
            PullSource::Broadcast { channel, .. } => channel.name(),
            PullSource::Queue(channel) => channel.name(),
        }
    }

    /// Wait for the next message; `None` when a closed broadcast is drained
    async fn next(&self) -> Option<Message<T>> {
        match self {
            PullSource::Broadcast { channel, cursor } => channel.next(*cursor).await,
            PullSource::Queue(channel) => Some(channel.recv().await),
        }
    }

    /// Mark the message returned by `next` as consumed
    fn ack(&self) {
        if let PullSource::Broadcast { channel, cursor } = self {
            channel.ack(*cursor);
        }
    }

    /// Return a message taken by `next` that will not be delivered
    fn give_back(&self, message: Message<T>) {
        // Broadcast cursors have not moved, so only the queue needs it back
        if let PullSource::Queue(channel) = self {
            channel.requeue(message);
        }
    }

    /// Release channel resources held for a subscription that has ended
    fn release(&self) {
        if let PullSource::Broadcast { channel, cursor } = self {
            channel.unregister(*cursor);
        }
    }
}

/// Run the pull loop until the run is detached or the subscription ends
pub(crate) async fn pull_loop<T: Clone + Send + 'static>(
    source: PullSource<T>,
    signal: Arc<PullSignal>,
    subscriber: Arc<dyn Subscriber<T>>,
    termination: Arc<Termination>,
) {
    let channel = source.name().to_string();
    debug!(%channel, "pull_loop: started");

    loop {
        match signal.ready().await {
            Wake::Demand => {}
            Wake::Detached => {
                debug!(%channel, "pull_loop: detached");
                break;
            }
            Wake::Cancelled => {
                debug!(%channel, "pull_loop: cancelled");
                source.release();
                break;
            }
            Wake::Violation(requested) => {
                warn!(%channel, requested, "pull_loop: invalid demand request");
                termination.set("protocol violation");
                source.release();
                subscriber.on_error(SubscriptionError::ProtocolViolation { requested });
                break;
            }
        }

        let next = tokio::select! {
            biased;
            _ = signal.interrupted() => continue,
            next = source.next() => next,
        };

        let Some(message) = next else {
            info!(%channel, "pull_loop: channel completed");
            termination.set("completed");
            source.release();
            subscriber.on_complete();
            break;
        };

        if !signal.try_consume() {
            source.give_back(message);
            continue;
        }

        let message_id = message.id();
        let outcome = subscriber.on_next(message);
        source.ack();

        if let Err(error) = outcome {
            warn!(%channel, %message_id, error = %error, "pull_loop: subscriber failed");
            termination.set("handler failure");
            source.release();
            subscriber.on_error(SubscriptionError::HandlerFailure {
                message_id,
                source: error,
            });
            break;
        }
    }

    debug!(%channel, "pull_loop: exited");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_ready_waits_for_request() {
        let signal = Arc::new(PullSignal::new(Arc::new(Termination::default())));
        assert_eq!(signal.check(), None);

        let requester = signal.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            requester.request(1);
        });

        let wake = tokio::time::timeout(Duration::from_secs(5), signal.ready()).await.unwrap();
        assert_eq!(wake, Wake::Demand);
        assert!(signal.try_consume());
        assert!(!signal.try_consume());
    }

    #[test]
    fn test_zero_request_reported_once() {
        let signal = PullSignal::new(Arc::new(Termination::default()));
        signal.request(0);
        assert_eq!(signal.check(), Some(Wake::Violation(0)));
        assert_eq!(signal.check(), None);
    }

    #[test]
    fn test_cancel_records_termination() {
        let termination = Arc::new(Termination::default());
        let signal = PullSignal::new(termination.clone());
        signal.request(3);
        signal.cancel();
        signal.cancel();

        assert!(signal.is_cancelled());
        assert_eq!(termination.reason().as_deref(), Some("cancelled"));
        assert_eq!(signal.check(), Some(Wake::Cancelled));
        assert!(!signal.try_consume());
    }

    #[test]
    fn test_violation_wins_over_detach() {
        let signal = PullSignal::new(Arc::new(Termination::default()));
        signal.request(0);
        signal.detach();
        assert_eq!(signal.check(), Some(Wake::Violation(0)));
        assert_eq!(signal.check(), Some(Wake::Detached));
    }

    #[test]
    fn test_detached_signal_ignores_requests() {
        let signal = PullSignal::new(Arc::new(Termination::default()));
        signal.detach();
        signal.request(5);
        assert_eq!(signal.check(), Some(Wake::Detached));
        assert!(!signal.try_consume());
    }
}
