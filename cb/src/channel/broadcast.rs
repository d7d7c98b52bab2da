//! BroadcastChannel - buffered fan-out with per-subscriber cursors
//!
//! Messages are appended to a single FIFO buffer. Each registered subscriber
//! owns a cursor into it; a message is dropped from the buffer only after
//! every registered cursor has moved past it. Cursors move on `ack`, not on
//! read, so a consumer that pauses and later resumes sees exactly the messages
//! it has not yet acknowledged.

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::Mutex;

use tokio::sync::Notify;
use tracing::{debug, info};

use super::MessageChannel;
use super::error::ChannelError;
use crate::message::Message;

/// Identifies a cursor registered with a [`BroadcastChannel`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(u64);

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// Result of a non-blocking read at a cursor
#[derive(Debug)]
pub enum Next<T> {
    /// The next unacknowledged message
    Message(Message<T>),
    /// Nothing buffered for this cursor yet
    Empty,
    /// The channel is closed and this cursor has drained it (or is unknown)
    Completed,
}

struct BroadcastState<T> {
    buffer: VecDeque<Message<T>>,
    /// Sequence number of `buffer[0]`
    head_seq: u64,
    /// Next sequence number each subscriber will read
    cursors: HashMap<SubscriberId, u64>,
    next_subscriber: u64,
    closed: bool,
}

impl<T> BroadcastState<T> {
    fn tail_seq(&self) -> u64 {
        self.head_seq + self.buffer.len() as u64
    }

    /// Drop messages every cursor has acknowledged
    ///
    /// With no cursors registered nothing is dropped; the buffer holds
    /// messages for the next subscriber.
    fn trim(&mut self) {
        let Some(min) = self.cursors.values().copied().min() else {
            return;
        };
        while self.head_seq < min && self.buffer.pop_front().is_some() {
            self.head_seq += 1;
        }
    }
}

/// A buffered broadcast channel
///
/// `send` never fails because nobody is consuming. With a bounded capacity a
/// full buffer rejects `send` with [`ChannelError::Full`].
pub struct BroadcastChannel<T> {
    name: String,
    capacity: Option<usize>,
    state: Mutex<BroadcastState<T>>,
    notify: Notify,
}

impl<T> BroadcastChannel<T> {
    /// Create a channel, bounded when `capacity` is `Some`
    pub fn new(name: impl Into<String>, capacity: Option<usize>) -> Self {
        let name = name.into();
        debug!(%name, ?capacity, "BroadcastChannel::new: called");
        Self {
            name,
            capacity,
            state: Mutex::new(BroadcastState {
                buffer: VecDeque::new(),
                head_seq: 0,
                cursors: HashMap::new(),
                next_subscriber: 0,
                closed: false,
            }),
            notify: Notify::new(),
        }
    }

    pub fn unbounded(name: impl Into<String>) -> Self {
        Self::new(name, None)
    }

    pub fn bounded(name: impl Into<String>, capacity: usize) -> Self {
        Self::new(name, Some(capacity))
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BroadcastState<T>> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Register a cursor
    ///
    /// The first cursor (when none is registered) starts at the oldest
    /// buffered message; later ones start at the tail.
    pub fn register(&self) -> SubscriberId {
        let mut state = self.lock();
        let id = SubscriberId(state.next_subscriber);
        state.next_subscriber += 1;
        let start = if state.cursors.is_empty() {
            state.head_seq
        } else {
            state.tail_seq()
        };
        state.cursors.insert(id, start);
        debug!(channel = %self.name, %id, start, buffered = state.buffer.len(), "BroadcastChannel::register: called");
        id
    }

    /// Remove a cursor and release the messages only it was holding
    pub fn unregister(&self, id: SubscriberId) -> bool {
        debug!(channel = %self.name, %id, "BroadcastChannel::unregister: called");
        let mut state = self.lock();
        let removed = state.cursors.remove(&id).is_some();
        state.trim();
        removed
    }

    /// Acknowledge the message at the cursor and advance past it
    pub fn ack(&self, id: SubscriberId) {
        let mut state = self.lock();
        let tail = state.tail_seq();
        if let Some(cursor) = state.cursors.get_mut(&id)
            && *cursor < tail
        {
            *cursor += 1;
        }
        state.trim();
    }

    /// Stop accepting messages; subscribers complete once drained
    pub fn close(&self) {
        info!(channel = %self.name, "BroadcastChannel::close: closing");
        self.lock().closed = true;
        self.notify.notify_waiters();
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Number of messages currently retained
    pub fn len(&self) -> usize {
        self.lock().buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().buffer.is_empty()
    }

    pub fn subscriber_count(&self) -> usize {
        self.lock().cursors.len()
    }

    /// Messages waiting for this cursor
    pub fn pending_for(&self, id: SubscriberId) -> usize {
        let state = self.lock();
        state
            .cursors
            .get(&id)
            .map(|cursor| (state.tail_seq() - cursor) as usize)
            .unwrap_or(0)
    }
}

impl<T: Clone> BroadcastChannel<T> {
    /// Read the message at the cursor without advancing it
    pub fn try_next(&self, id: SubscriberId) -> Next<T> {
        let state = self.lock();
        let Some(&cursor) = state.cursors.get(&id) else {
            return Next::Completed;
        };
        let index = (cursor - state.head_seq) as usize;
        match state.buffer.get(index) {
            Some(message) => Next::Message(message.clone()),
            None if state.closed => Next::Completed,
            None => Next::Empty,
        }
    }

    /// Wait for the message at the cursor
    ///
    /// Returns `None` once the channel is closed and drained for this cursor.
    /// Cancel-safe: dropping the future loses nothing since the cursor only
    /// moves on `ack`.
    pub async fn next(&self, id: SubscriberId) -> Option<Message<T>> {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            match self.try_next(id) {
                Next::Message(message) => return Some(message),
                Next::Completed => return None,
                Next::Empty => notified.await,
            }
        }
    }
}

impl<T: Send + 'static> MessageChannel<T> for BroadcastChannel<T> {
    fn name(&self) -> &str {
        &self.name
    }

    fn send(&self, message: Message<T>) -> Result<(), ChannelError> {
        debug!(channel = %self.name, id = %message.id(), "BroadcastChannel::send: called");
        {
            let mut state = self.lock();
            if state.closed {
                return Err(ChannelError::Closed {
                    channel: self.name.clone(),
                });
            }
            if let Some(capacity) = self.capacity
                && state.buffer.len() >= capacity
            {
                debug!(channel = %self.name, capacity, "BroadcastChannel::send: buffer full");
                return Err(ChannelError::Full {
                    channel: self.name.clone(),
                    capacity,
                });
            }
            state.buffer.push_back(message);
        }
        self.notify.notify_waiters();
        Ok(())
    }
}
