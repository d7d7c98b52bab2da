//! ReactiveConsumer - attaches a subscriber to a channel under a lifecycle

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::error::BridgeError;
use super::pull::{PullSignal, PullSource, pull_loop};
use super::push::{DEFAULT_PENDING_LIMIT, PushRun};
use super::{SignalSlot, Termination};
use crate::channel::{Channel, MessageChannel, MessageHandler, SubscriberId};
use crate::lifecycle::{Lifecycle, LifecycleController, LifecycleState};
use crate::message::Message;
use crate::reactive::{HandlerSubscriber, Subscriber, Subscription};

/// Attachment for the current run
enum ActiveRun<T> {
    Push(Arc<PushRun<T>>),
    Pull {
        signal: Arc<PullSignal>,
        task: JoinHandle<()>,
    },
}

/// Bridges a channel's delivery model to a demand-driven subscriber
///
/// Call [`initialize`](Self::initialize) once, then start and stop freely.
/// Each `start` calls `on_subscribe` again; `stop` pauses without signalling
/// completion. Every [`Subscription`] the consumer issued stays usable across
/// restarts and drives whichever run is current. Once the subscription is
/// cancelled or fails the consumer is terminated and `start` returns
/// [`BridgeError::Terminated`].
pub struct ReactiveConsumer<T> {
    name: String,
    channel: Channel<T>,
    subscriber: Arc<dyn Subscriber<T>>,
    lifecycle: LifecycleController,
    termination: Arc<Termination>,
    slot: Arc<SignalSlot>,
    active: Option<ActiveRun<T>>,
    /// Upper bound on held Direct sends
    pending_limit: usize,
    /// Direct sends accepted before a stop but not yet delivered
    carried: VecDeque<Message<T>>,
    /// Broadcast cursor, kept across stop/start
    cursor: Option<SubscriberId>,
}

impl<T: Clone + Send + 'static> ReactiveConsumer<T> {
    pub fn new(channel: impl Into<Channel<T>>, subscriber: Arc<dyn Subscriber<T>>) -> Self {
        let channel = channel.into();
        let name = format!("reactive-consumer:{}", channel.name());
        debug!(%name, kind = %channel.kind(), "ReactiveConsumer::new: called");
        let termination = Arc::new(Termination::default());
        Self {
            lifecycle: LifecycleController::new(name.clone()),
            name,
            channel,
            subscriber,
            slot: Arc::new(SignalSlot::new(termination.clone())),
            termination,
            active: None,
            pending_limit: DEFAULT_PENDING_LIMIT,
            carried: VecDeque::new(),
            cursor: None,
        }
    }

    /// Wrap a handler in a [`HandlerSubscriber`] requesting unbounded demand
    pub fn with_handler(channel: impl Into<Channel<T>>, handler: Arc<dyn MessageHandler<T>>) -> Self {
        Self::new(channel, Arc::new(HandlerSubscriber::new(handler)))
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self.lifecycle = LifecycleController::new(self.name.clone());
        self
    }

    /// Bound the Direct sends held while demand is zero; at the bound `send`
    /// fails with `ChannelError::Full`
    pub fn with_pending_limit(mut self, limit: usize) -> Self {
        self.pending_limit = limit.max(1);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn pending_limit(&self) -> usize {
        self.pending_limit
    }

    pub fn channel(&self) -> &Channel<T> {
        &self.channel
    }

    pub fn state(&self) -> LifecycleState {
        self.lifecycle.state()
    }

    /// True once the subscription was cancelled, failed or completed
    pub fn is_terminated(&self) -> bool {
        self.termination.is_terminated()
    }

    /// Why the subscription ended, if it has
    pub fn termination_reason(&self) -> Option<String> {
        self.termination.reason()
    }

    /// Validate the channel/subscriber pairing; required before the first start
    pub fn initialize(&mut self) -> Result<(), BridgeError> {
        debug!(name = %self.name, "ReactiveConsumer::initialize: called");
        if let Channel::Broadcast(channel) = &self.channel
            && channel.is_closed()
        {
            return Err(BridgeError::InvalidConfiguration(format!(
                "broadcast channel '{}' is already closed",
                channel.name()
            )));
        }
        self.lifecycle.mark_initialized()
    }

    fn start_pull(&mut self, source: PullSource<T>) -> Result<(), BridgeError> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| BridgeError::NoRuntime)?;
        let signal = Arc::new(PullSignal::new(self.termination.clone()));
        self.slot.bind(signal.clone());
        self.subscriber.on_subscribe(Subscription::new(self.slot.clone()));
        let task = runtime.spawn(pull_loop(
            source,
            signal.clone(),
            self.subscriber.clone(),
            self.termination.clone(),
        ));
        self.active = Some(ActiveRun::Pull { signal, task });
        Ok(())
    }

    fn attach(&mut self) -> Result<(), BridgeError> {
        match self.channel.clone() {
            Channel::Direct(channel) => {
                let run = Arc::new(PushRun::new(
                    channel.name(),
                    self.subscriber.clone(),
                    self.termination.clone(),
                    std::mem::take(&mut self.carried),
                    self.pending_limit,
                ));
                channel.subscribe(run.clone());
                self.active = Some(ActiveRun::Push(run.clone()));
                self.slot.bind(run);
                self.subscriber.on_subscribe(Subscription::new(self.slot.clone()));
                Ok(())
            }
            Channel::Broadcast(channel) => {
                // Check the runtime before registering so a failed start holds no cursor
                tokio::runtime::Handle::try_current().map_err(|_| BridgeError::NoRuntime)?;
                let cursor = *self.cursor.get_or_insert_with(|| channel.register());
                self.start_pull(PullSource::Broadcast { channel, cursor })
            }
            Channel::Queue(channel) => self.start_pull(PullSource::Queue(channel)),
        }
    }
}

#[async_trait]
impl<T: Clone + Send + 'static> Lifecycle for ReactiveConsumer<T> {
    async fn start(&mut self) -> Result<(), BridgeError> {
        debug!(name = %self.name, state = %self.lifecycle.state(), "ReactiveConsumer::start: called");
        if let Some(reason) = self.termination.reason() {
            warn!(name = %self.name, %reason, "ReactiveConsumer::start: subscription already ended");
            return Err(BridgeError::Terminated { reason });
        }
        if !self.lifecycle.begin_start()? {
            debug!(name = %self.name, "ReactiveConsumer::start: already running");
            return Ok(());
        }
        if let Err(e) = self.attach() {
            self.lifecycle.abort_start();
            return Err(e);
        }
        self.lifecycle.finish_start();
        info!(name = %self.name, kind = %self.channel.kind(), "ReactiveConsumer started");
        Ok(())
    }

    async fn stop(&mut self) {
        debug!(name = %self.name, state = %self.lifecycle.state(), "ReactiveConsumer::stop: called");
        if !self.lifecycle.begin_stop() {
            debug!(name = %self.name, "ReactiveConsumer::stop: not running");
            return;
        }

        self.slot.unbind();
        match self.active.take() {
            Some(ActiveRun::Push(run)) => {
                if let Channel::Direct(channel) = &self.channel {
                    channel.unsubscribe();
                }
                let pending = run.detach().await;
                if self.termination.is_terminated() {
                    if !pending.is_empty() {
                        warn!(name = %self.name, dropped = pending.len(), "ReactiveConsumer::stop: dropping undelivered messages of ended subscription");
                    }
                } else {
                    self.carried = pending;
                }
            }
            Some(ActiveRun::Pull { signal, task }) => {
                signal.detach();
                if let Err(e) = task.await {
                    error!(name = %self.name, error = %e, "ReactiveConsumer::stop: pull loop failed");
                    self.termination.set("pull loop failed");
                }
            }
            None => {}
        }

        self.lifecycle.finish_stop();
        info!(name = %self.name, carried = self.carried.len(), "ReactiveConsumer stopped");
    }

    fn is_running(&self) -> bool {
        self.lifecycle.is_running() && !self.termination.is_terminated()
    }
}

impl<T> Drop for ReactiveConsumer<T> {
    fn drop(&mut self) {
        self.slot.unbind();
        match self.active.take() {
            Some(ActiveRun::Push(_)) => {
                if let Channel::Direct(channel) = &self.channel {
                    channel.unsubscribe();
                }
            }
            Some(ActiveRun::Pull { signal, .. }) => signal.detach(),
            None => {}
        }
        if let (Channel::Broadcast(channel), Some(cursor)) = (&self.channel, self.cursor) {
            channel.unregister(cursor);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::{BroadcastChannel, DirectChannel, HandlerError, QueueChannel};
    use crate::reactive::SubscriptionError;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::sync::mpsc;

    /// Forwards on_next into an mpsc channel and records every other signal
    struct Recorder {
        tx: mpsc::UnboundedSender<Message<String>>,
        subscriptions: Mutex<Vec<Subscription>>,
        errors: AtomicUsize,
        completions: AtomicUsize,
        fail_on: Option<&'static str>,
    }

    impl Recorder {
        fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<Message<String>>) {
            Self::failing_on(None)
        }

        fn failing_on(fail_on: Option<&'static str>) -> (Arc<Self>, mpsc::UnboundedReceiver<Message<String>>) {
            let (tx, rx) = mpsc::unbounded_channel();
            let recorder = Arc::new(Self {
                tx,
                subscriptions: Mutex::new(Vec::new()),
                errors: AtomicUsize::new(0),
                completions: AtomicUsize::new(0),
                fail_on,
            });
            (recorder, rx)
        }

        fn first(&self) -> Subscription {
            self.subscriptions.lock().unwrap().first().cloned().expect("no subscription")
        }

        fn latest(&self) -> Subscription {
            self.subscriptions.lock().unwrap().last().cloned().expect("no subscription")
        }

        fn subscribe_count(&self) -> usize {
            self.subscriptions.lock().unwrap().len()
        }
    }

    impl Subscriber<String> for Recorder {
        fn on_subscribe(&self, subscription: Subscription) {
            self.subscriptions.lock().unwrap().push(subscription);
        }

        fn on_next(&self, message: Message<String>) -> Result<(), HandlerError> {
            if Some(message.payload().as_str()) == self.fail_on {
                return Err("refused".into());
            }
            self.tx.send(message).map_err(|e| Box::new(e) as HandlerError)
        }

        fn on_error(&self, _error: SubscriptionError) {
            self.errors.fetch_add(1, Ordering::SeqCst);
        }

        fn on_complete(&self) {
            self.completions.fetch_add(1, Ordering::SeqCst);
        }
    }

    async fn next(rx: &mut mpsc::UnboundedReceiver<Message<String>>) -> Message<String> {
        tokio::time::timeout(Duration::from_secs(10), rx.recv())
            .await
            .expect("timed out waiting for delivery")
            .expect("recorder dropped")
    }

    #[tokio::test]
    async fn test_start_requires_initialize() {
        let channel = Arc::new(QueueChannel::<String>::unbounded("q"));
        let (recorder, _rx) = Recorder::new();
        let mut consumer = ReactiveConsumer::new(channel, recorder);
        assert!(matches!(consumer.start().await, Err(BridgeError::NotInitialized(_))));
        assert_eq!(consumer.state(), LifecycleState::Stopped);
    }

    #[test]
    fn test_pull_start_outside_runtime_fails() {
        let channel = Arc::new(BroadcastChannel::<String>::unbounded("b"));
        let (recorder, _rx) = Recorder::new();
        let mut consumer = ReactiveConsumer::new(channel.clone(), recorder.clone());
        consumer.initialize().unwrap();

        let result = futures::executor::block_on(consumer.start());
        assert!(matches!(result, Err(BridgeError::NoRuntime)));
        assert_eq!(consumer.state(), LifecycleState::Stopped);
        assert_eq!(channel.subscriber_count(), 0);
        assert_eq!(recorder.subscribe_count(), 0);
    }

    #[tokio::test]
    async fn test_initialize_rejects_closed_broadcast() {
        let channel = Arc::new(BroadcastChannel::<String>::unbounded("b"));
        channel.close();
        let (recorder, _rx) = Recorder::new();
        let mut consumer = ReactiveConsumer::new(channel, recorder);
        assert!(matches!(consumer.initialize(), Err(BridgeError::InvalidConfiguration(_))));
    }

    #[tokio::test]
    async fn test_start_and_stop_are_idempotent() {
        let channel = Arc::new(QueueChannel::<String>::unbounded("q"));
        let (recorder, _rx) = Recorder::new();
        let mut consumer = ReactiveConsumer::new(channel, recorder.clone());
        consumer.initialize().unwrap();

        consumer.stop().await;
        consumer.start().await.unwrap();
        consumer.start().await.unwrap();
        assert!(consumer.is_running());
        assert_eq!(recorder.subscribe_count(), 1);

        consumer.stop().await;
        consumer.stop().await;
        assert_eq!(consumer.state(), LifecycleState::Stopped);
        assert_eq!(recorder.completions.load(Ordering::SeqCst), 0);
        assert_eq!(recorder.errors.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_direct_channel_stop_rejects_sends() {
        let channel = Arc::new(DirectChannel::<String>::new("direct"));
        let (recorder, mut rx) = Recorder::new();
        let mut consumer = ReactiveConsumer::new(channel.clone(), recorder.clone());
        consumer.initialize().unwrap();
        consumer.start().await.unwrap();

        let first = Message::new("test".to_string());
        channel.send(first.clone()).unwrap();
        recorder.latest().request(1);
        assert_eq!(next(&mut rx).await, first);

        consumer.stop().await;
        for _ in 0..3 {
            let err = channel.send(Message::new("test".to_string())).unwrap_err();
            assert!(err.is_delivery_rejected());
        }

        consumer.start().await.unwrap();
        assert_eq!(recorder.subscribe_count(), 2);
        recorder.latest().request(1);
        let second = Message::new("test2".to_string());
        channel.send(second.clone()).unwrap();
        assert_eq!(next(&mut rx).await, second);

        assert!(rx.try_recv().is_err());
        assert_eq!(recorder.errors.load(Ordering::SeqCst), 0);
        assert_eq!(recorder.completions.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_direct_pending_survives_restart() {
        let channel = Arc::new(DirectChannel::<String>::new("direct"));
        let (recorder, mut rx) = Recorder::new();
        let mut consumer = ReactiveConsumer::new(channel.clone(), recorder.clone());
        consumer.initialize().unwrap();
        consumer.start().await.unwrap();

        let held = Message::new("held".to_string());
        channel.send(held.clone()).unwrap();
        consumer.stop().await;
        consumer.start().await.unwrap();

        recorder.latest().request(1);
        assert_eq!(next(&mut rx).await, held);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_direct_first_subscription_survives_restart() {
        let channel = Arc::new(DirectChannel::<String>::new("direct"));
        let (recorder, mut rx) = Recorder::new();
        let mut consumer = ReactiveConsumer::new(channel.clone(), recorder.clone());
        consumer.initialize().unwrap();
        consumer.start().await.unwrap();

        let first = Message::new("test".to_string());
        channel.send(first.clone()).unwrap();
        let subscription = recorder.first();
        subscription.request(1);
        assert_eq!(next(&mut rx).await, first);

        consumer.stop().await;
        assert!(channel.send(first.clone()).unwrap_err().is_delivery_rejected());

        consumer.start().await.unwrap();
        subscription.request(1);
        let second = Message::new("test2".to_string());
        channel.send(second.clone()).unwrap();
        assert_eq!(next(&mut rx).await, second);

        assert_eq!(recorder.errors.load(Ordering::SeqCst), 0);
        assert_eq!(recorder.completions.load(Ordering::SeqCst), 0);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_queue_first_subscription_survives_restart() {
        let channel = Arc::new(QueueChannel::<String>::unbounded("queue"));
        let (recorder, mut rx) = Recorder::new();
        let mut consumer = ReactiveConsumer::new(channel.clone(), recorder.clone());
        consumer.initialize().unwrap();
        consumer.start().await.unwrap();

        let first = Message::new("test".to_string());
        channel.send(first.clone()).unwrap();
        let subscription = recorder.first();
        subscription.request(1);
        assert_eq!(next(&mut rx).await, first);

        consumer.stop().await;
        channel.send(first.clone()).unwrap();
        consumer.start().await.unwrap();
        subscription.request(2);
        let second = Message::new("test2".to_string());
        channel.send(second.clone()).unwrap();

        assert_eq!(next(&mut rx).await, first);
        assert_eq!(next(&mut rx).await, second);
        assert_eq!(recorder.errors.load(Ordering::SeqCst), 0);
        assert_eq!(recorder.completions.load(Ordering::SeqCst), 0);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_requests_while_stopped_are_dropped() {
        let channel = Arc::new(QueueChannel::<String>::unbounded("q"));
        let (recorder, mut rx) = Recorder::new();
        let mut consumer = ReactiveConsumer::new(channel.clone(), recorder.clone());
        consumer.initialize().unwrap();

        consumer.start().await.unwrap();
        consumer.stop().await;
        channel.send(Message::new("x".to_string())).unwrap();
        recorder.first().request(1);
        consumer.start().await.unwrap();

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(rx.try_recv().is_err());

        recorder.first().request(1);
        assert_eq!(next(&mut rx).await.payload(), "x");
    }

    #[tokio::test]
    async fn test_zero_request_then_stop_still_terminates() {
        let channel = Arc::new(QueueChannel::<String>::unbounded("q"));
        let (recorder, _rx) = Recorder::new();
        let mut consumer = ReactiveConsumer::new(channel, recorder.clone());
        consumer.initialize().unwrap();
        consumer.start().await.unwrap();

        recorder.latest().request(0);
        consumer.stop().await;

        assert_eq!(recorder.errors.load(Ordering::SeqCst), 1);
        assert_eq!(consumer.termination_reason().as_deref(), Some("protocol violation"));
        assert!(consumer.start().await.unwrap_err().is_terminated());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_direct_pending_limit() {
        let channel = Arc::new(DirectChannel::<String>::new("direct"));
        let (recorder, mut rx) = Recorder::new();
        let mut consumer = ReactiveConsumer::new(channel.clone(), recorder.clone()).with_pending_limit(1);
        consumer.initialize().unwrap();
        consumer.start().await.unwrap();

        channel.send(Message::new("held".to_string())).unwrap();
        let err = channel.send(Message::new("over".to_string())).unwrap_err();
        assert!(matches!(err, crate::channel::ChannelError::Full { capacity: 1, .. }));

        recorder.latest().request(1);
        assert_eq!(next(&mut rx).await.payload(), "held");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_pull_respects_demand() {
        let channel = Arc::new(QueueChannel::<String>::unbounded("q"));
        let (recorder, mut rx) = Recorder::new();
        let mut consumer = ReactiveConsumer::new(channel.clone(), recorder.clone());
        consumer.initialize().unwrap();
        consumer.start().await.unwrap();

        for i in 0..5 {
            channel.send(Message::new(format!("m{i}"))).unwrap();
        }
        recorder.latest().request(2);
        assert_eq!(next(&mut rx).await.payload(), "m0");
        assert_eq!(next(&mut rx).await.payload(), "m1");

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(rx.try_recv().is_err());
        assert_eq!(channel.len(), 3);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_cancel_terminates_consumer() {
        let channel = Arc::new(QueueChannel::<String>::unbounded("q"));
        let (recorder, mut rx) = Recorder::new();
        let mut consumer = ReactiveConsumer::new(channel.clone(), recorder.clone());
        consumer.initialize().unwrap();
        consumer.start().await.unwrap();

        recorder.latest().cancel();
        recorder.latest().request(5);
        channel.send(Message::new("after-cancel".to_string())).unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert!(rx.try_recv().is_err());
        assert!(consumer.is_terminated());
        assert!(!consumer.is_running());
        assert_eq!(channel.len(), 1);

        consumer.stop().await;
        let err = consumer.start().await.unwrap_err();
        assert!(err.is_terminated());
        assert_eq!(recorder.errors.load(Ordering::SeqCst), 0);
        assert_eq!(recorder.completions.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_zero_request_signals_error() {
        let channel = Arc::new(BroadcastChannel::<String>::unbounded("b"));
        let (recorder, _rx) = Recorder::new();
        let mut consumer = ReactiveConsumer::new(channel.clone(), recorder.clone());
        consumer.initialize().unwrap();
        consumer.start().await.unwrap();

        recorder.latest().request(0);
        tokio::time::timeout(Duration::from_secs(10), async {
            while recorder.errors.load(Ordering::SeqCst) == 0 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("no on_error");

        assert_eq!(consumer.termination_reason().as_deref(), Some("protocol violation"));
        assert_eq!(channel.subscriber_count(), 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_pull_handler_failure_is_terminal() {
        let channel = Arc::new(QueueChannel::<String>::unbounded("q"));
        let (recorder, mut rx) = Recorder::failing_on(Some("poison"));
        let mut consumer = ReactiveConsumer::new(channel.clone(), recorder.clone());
        consumer.initialize().unwrap();
        consumer.start().await.unwrap();
        recorder.latest().request(10);

        channel.send(Message::new("ok".to_string())).unwrap();
        channel.send(Message::new("poison".to_string())).unwrap();
        channel.send(Message::new("never".to_string())).unwrap();

        assert_eq!(next(&mut rx).await.payload(), "ok");
        tokio::time::timeout(Duration::from_secs(10), async {
            while recorder.errors.load(Ordering::SeqCst) == 0 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("no on_error");

        assert!(consumer.is_terminated());
        assert_eq!(channel.len(), 1);
        consumer.stop().await;
        assert!(consumer.start().await.unwrap_err().is_terminated());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_broadcast_close_completes() {
        let channel = Arc::new(BroadcastChannel::<String>::unbounded("b"));
        let (recorder, mut rx) = Recorder::new();
        let mut consumer = ReactiveConsumer::new(channel.clone(), recorder.clone());
        consumer.initialize().unwrap();
        consumer.start().await.unwrap();
        recorder.latest().request(u64::MAX);

        channel.send(Message::new("only".to_string())).unwrap();
        channel.close();

        assert_eq!(next(&mut rx).await.payload(), "only");
        tokio::time::timeout(Duration::from_secs(10), async {
            while recorder.completions.load(Ordering::SeqCst) == 0 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("no on_complete");
        assert_eq!(consumer.termination_reason().as_deref(), Some("completed"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_with_handler_delivers_everything() {
        let channel = Arc::new(QueueChannel::<u32>::unbounded("q"));
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let (done_tx, mut done_rx) = mpsc::unbounded_channel();
        let handler: Arc<dyn MessageHandler<u32>> = Arc::new(move |m: Message<u32>| -> Result<(), HandlerError> {
            sink.lock().unwrap().push(*m.payload());
            let _ = done_tx.send(());
            Ok(())
        });

        let mut consumer = ReactiveConsumer::with_handler(channel.clone(), handler).with_name("numbers");
        assert_eq!(consumer.name(), "numbers");
        consumer.initialize().unwrap();
        consumer.start().await.unwrap();

        for i in 0..3 {
            channel.send(Message::new(i)).unwrap();
        }
        for _ in 0..3 {
            tokio::time::timeout(Duration::from_secs(10), done_rx.recv()).await.unwrap();
        }
        assert_eq!(*seen.lock().unwrap(), vec![0, 1, 2]);
    }
}
