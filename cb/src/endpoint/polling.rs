//! Source polling: pulls messages from a [`MessageSource`] on a fixed interval

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use eyre::Result;
use futures::StreamExt;
use futures::stream::BoxStream;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::bridge::BridgeError;
use crate::channel::{Channel, MessageChannel};
use crate::config::PollerConfig;
use crate::lifecycle::{Lifecycle, LifecycleController};
use crate::message::Message;
use crate::metadata::MetadataStore;

/// Header carrying the cursor of a message emitted by [`MetadataTrackingSource`]
pub const CURSOR_HEADER: &str = "cursor";

/// Something that can be asked for the next message
#[async_trait]
pub trait MessageSource<T>: Send + Sync {
    /// Next message, or `None` when nothing is available right now
    async fn receive(&self) -> Result<Option<Message<T>>>;
}

/// A source that returns items newer than a cursor, oldest first
#[async_trait]
pub trait CursoredSource<T>: Send + Sync {
    async fn fetch_since(&self, cursor: Option<&str>) -> Result<Vec<(String, T)>>;
}

/// Adapts a stream into a [`MessageSource`]
///
/// `receive` waits for the stream's next item; an exhausted stream yields `None`.
pub struct StreamSource<T> {
    stream: Mutex<BoxStream<'static, Message<T>>>,
}

impl<T> StreamSource<T> {
    pub fn new(stream: BoxStream<'static, Message<T>>) -> Self {
        Self {
            stream: Mutex::new(stream),
        }
    }
}

#[async_trait]
impl<T: Send + 'static> MessageSource<T> for StreamSource<T> {
    async fn receive(&self) -> Result<Option<Message<T>>> {
        Ok(self.stream.lock().await.next().await)
    }
}

/// Remembers how far a [`CursoredSource`] has been consumed
///
/// The last emitted cursor is written to the metadata store under `key` as
/// each message is handed out, so a restarted poller (or a fresh instance
/// sharing the store) resumes after it instead of re-emitting.
pub struct MetadataTrackingSource<S, T> {
    source: S,
    store: Arc<dyn MetadataStore>,
    key: String,
    buffer: Mutex<VecDeque<(String, T)>>,
}

impl<S, T> MetadataTrackingSource<S, T> {
    pub fn new(source: S, store: Arc<dyn MetadataStore>, key: impl Into<String>) -> Self {
        Self {
            source,
            store,
            key: key.into(),
            buffer: Mutex::new(VecDeque::new()),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Cursor of the last emitted message
    pub fn last_cursor(&self) -> Option<String> {
        self.store.get(&self.key)
    }
}

#[async_trait]
impl<S, T> MessageSource<T> for MetadataTrackingSource<S, T>
where
    S: CursoredSource<T>,
    T: Send + 'static,
{
    async fn receive(&self) -> Result<Option<Message<T>>> {
        let mut buffer = self.buffer.lock().await;
        if buffer.is_empty() {
            let cursor = self.store.get(&self.key);
            let batch = self.source.fetch_since(cursor.as_deref()).await?;
            debug!(key = %self.key, ?cursor, fetched = batch.len(), "MetadataTrackingSource::receive: fetched");
            buffer.extend(batch);
        }

        let Some((cursor, payload)) = buffer.pop_front() else {
            return Ok(None);
        };
        self.store.put(&self.key, &cursor);
        Ok(Some(Message::builder(payload).header(CURSOR_HEADER, cursor).build()))
    }
}

/// Polls a source and sends what it returns to an output channel
pub struct SourcePollingEndpoint<T> {
    name: String,
    source: Arc<dyn MessageSource<T>>,
    output: Channel<T>,
    interval: Duration,
    max_messages_per_poll: usize,
    shutdown_timeout: Duration,
    lifecycle: LifecycleController,
    task: Option<(mpsc::Sender<()>, JoinHandle<()>)>,
}

impl<T: Send + 'static> SourcePollingEndpoint<T> {
    pub fn new(name: impl Into<String>, source: Arc<dyn MessageSource<T>>, output: impl Into<Channel<T>>) -> Self {
        Self::from_config(name, source, output, &PollerConfig::default())
    }

    pub fn from_config(
        name: impl Into<String>,
        source: Arc<dyn MessageSource<T>>,
        output: impl Into<Channel<T>>,
        config: &PollerConfig,
    ) -> Self {
        let name = name.into();
        debug!(%name, ?config, "SourcePollingEndpoint::from_config: called");
        Self {
            lifecycle: LifecycleController::new(name.clone()),
            name,
            source,
            output: output.into(),
            interval: config.interval(),
            max_messages_per_poll: config.max_messages_per_poll.max(1),
            shutdown_timeout: config.shutdown_timeout(),
            task: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn initialize(&mut self) -> Result<(), BridgeError> {
        debug!(name = %self.name, "SourcePollingEndpoint::initialize: called");
        if self.interval.is_zero() {
            return Err(BridgeError::InvalidConfiguration(format!(
                "poll interval for '{}' must be greater than zero",
                self.name
            )));
        }
        self.lifecycle.mark_initialized()
    }
}

/// Take up to `max` messages from the source and send them on
async fn poll_once<T: Send + 'static>(
    name: &str,
    source: &dyn MessageSource<T>,
    output: &Channel<T>,
    max: usize,
) -> usize {
    let mut sent = 0;
    for _ in 0..max {
        match source.receive().await {
            Ok(Some(message)) => {
                let id = message.id();
                match output.send(message) {
                    Ok(()) => sent += 1,
                    Err(e) => warn!(%name, %id, error = %e, "poll_once: send failed, dropping message"),
                }
            }
            Ok(None) => break,
            Err(e) => {
                error!(%name, error = %e, "poll_once: source failed");
                break;
            }
        }
    }
    sent
}

async fn poll_loop<T: Send + 'static>(
    name: String,
    source: Arc<dyn MessageSource<T>>,
    output: Channel<T>,
    period: Duration,
    max: usize,
    mut shutdown_rx: mpsc::Receiver<()>,
) {
    debug!(%name, ?period, max, "poll_loop: started");
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => {
                debug!(%name, "poll_loop: shutdown signal received");
                break;
            }
            _ = interval.tick() => {
                // A source may wait indefinitely, so shutdown also cuts a poll short
                tokio::select! {
                    biased;
                    _ = shutdown_rx.recv() => {
                        debug!(%name, "poll_loop: shutdown during poll");
                        break;
                    }
                    sent = poll_once(&name, source.as_ref(), &output, max) => {
                        if sent > 0 {
                            debug!(%name, sent, "poll_loop: polled");
                        }
                    }
                }
            }
        }
    }
    debug!(%name, "poll_loop: exited");
}

#[async_trait]
impl<T: Send + 'static> Lifecycle for SourcePollingEndpoint<T> {
    async fn start(&mut self) -> Result<(), BridgeError> {
        debug!(name = %self.name, "SourcePollingEndpoint::start: called");
        if !self.lifecycle.begin_start()? {
            return Ok(());
        }
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            self.lifecycle.abort_start();
            return Err(BridgeError::NoRuntime);
        };

        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        let task = runtime.spawn(poll_loop(
            self.name.clone(),
            self.source.clone(),
            self.output.clone(),
            self.interval,
            self.max_messages_per_poll,
            shutdown_rx,
        ));
        self.task = Some((shutdown_tx, task));
        self.lifecycle.finish_start();
        info!(name = %self.name, interval = ?self.interval, "SourcePollingEndpoint started");
        Ok(())
    }

    async fn stop(&mut self) {
        debug!(name = %self.name, "SourcePollingEndpoint::stop: called");
        if !self.lifecycle.begin_stop() {
            return;
        }
        if let Some((shutdown_tx, mut task)) = self.task.take() {
            // A closed channel also stops the loop, so the send result does not matter
            let _ = shutdown_tx.try_send(());
            match tokio::time::timeout(self.shutdown_timeout, &mut task).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => error!(name = %self.name, error = %e, "SourcePollingEndpoint::stop: poll loop failed"),
                Err(_) => {
                    warn!(name = %self.name, timeout = ?self.shutdown_timeout, "Aborting poll loop after shutdown timeout");
                    task.abort();
                }
            }
        }
        self.lifecycle.finish_stop();
        info!(name = %self.name, "SourcePollingEndpoint stopped");
    }

    fn is_running(&self) -> bool {
        self.lifecycle.is_running()
    }
}

impl<T> Drop for SourcePollingEndpoint<T> {
    fn drop(&mut self) {
        if let Some((_, task)) = self.task.take() {
            task.abort();
        }
    }
}
