//! QueueChannel - pollable FIFO

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use tokio::sync::Notify;
use tracing::debug;

use super::MessageChannel;
use super::error::ChannelError;
use crate::message::Message;

/// A FIFO queue consumed through `receive`
///
/// Messages stay in the queue until someone takes them, regardless of whether
/// any consumer is attached.
pub struct QueueChannel<T> {
    name: String,
    capacity: Option<usize>,
    queue: Mutex<VecDeque<Message<T>>>,
    notify: Notify,
}

impl<T> QueueChannel<T> {
    /// Create a queue, bounded when `capacity` is `Some`
    pub fn new(name: impl Into<String>, capacity: Option<usize>) -> Self {
        let name = name.into();
        debug!(%name, ?capacity, "QueueChannel::new: called");
        Self {
            name,
            capacity,
            queue: Mutex::new(VecDeque::new()),
            notify: Notify::new(),
        }
    }

    pub fn unbounded(name: impl Into<String>) -> Self {
        Self::new(name, None)
    }

    pub fn bounded(name: impl Into<String>, capacity: usize) -> Self {
        Self::new(name, Some(capacity))
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<Message<T>>> {
        self.queue.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Take the head of the queue without waiting
    pub fn try_receive(&self) -> Option<Message<T>> {
        self.lock().pop_front()
    }

    /// Take the head of the queue, waiting up to `timeout`
    ///
    /// A zero timeout is a non-blocking poll. Timing out yields `None`.
    pub async fn receive(&self, timeout: Duration) -> Option<Message<T>> {
        debug!(channel = %self.name, ?timeout, "QueueChannel::receive: called");
        if timeout.is_zero() {
            return self.try_receive();
        }
        match tokio::time::timeout(timeout, self.recv()).await {
            Ok(message) => Some(message),
            Err(_) => {
                debug!(channel = %self.name, "QueueChannel::receive: timed out");
                None
            }
        }
    }

    /// Wait until a message is available and take it
    ///
    /// Cancel-safe: the message is removed only when the future completes.
    pub async fn recv(&self) -> Message<T> {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(message) = self.try_receive() {
                return message;
            }
            notified.await;
        }
    }

    /// Put a message back at the head, ignoring capacity
    pub(crate) fn requeue(&self, message: Message<T>) {
        debug!(channel = %self.name, id = %message.id(), "QueueChannel::requeue: called");
        self.lock().push_front(message);
        self.notify.notify_waiters();
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Free slots, or `None` for an unbounded queue
    pub fn remaining_capacity(&self) -> Option<usize> {
        self.capacity.map(|capacity| capacity.saturating_sub(self.len()))
    }

    /// Remove and return everything queued
    pub fn clear(&self) -> Vec<Message<T>> {
        debug!(channel = %self.name, "QueueChannel::clear: called");
        self.lock().drain(..).collect()
    }

    /// Remove the messages `selector` rejects and return them
    pub fn purge(&self, selector: impl Fn(&Message<T>) -> bool) -> Vec<Message<T>> {
        let mut queue = self.lock();
        let mut purged = Vec::new();
        let mut kept = VecDeque::with_capacity(queue.len());
        for message in queue.drain(..) {
            if selector(&message) {
                kept.push_back(message);
            } else {
                purged.push(message);
            }
        }
        *queue = kept;
        debug!(channel = %self.name, purged = purged.len(), "QueueChannel::purge: done");
        purged
    }
}

impl<T: Send + 'static> MessageChannel<T> for QueueChannel<T> {
    fn name(&self) -> &str {
        &self.name
    }

    fn send(&self, message: Message<T>) -> Result<(), ChannelError> {
        debug!(channel = %self.name, id = %message.id(), "QueueChannel::send: called");
        {
            let mut queue = self.lock();
            if let Some(capacity) = self.capacity
                && queue.len() >= capacity
            {
                return Err(ChannelError::Full {
                    channel: self.name.clone(),
                    capacity,
                });
            }
            queue.push_back(message);
        }
        self.notify.notify_waiters();
        Ok(())
    }
}
