//! Message channels
//!
//! Three delivery models sit behind one `send` contract:
//! - **Direct:** push-synchronous, `send` runs the single attached handler inline
//! - **Broadcast:** buffered, subscribers pull from durable cursors asynchronously
//! - **Queue:** pollable FIFO consumed with `receive`
//!
//! [`Channel`] is the tagged union the bridge and endpoints work against.

mod broadcast;
mod direct;
mod error;
mod queue;

use std::fmt;
use std::sync::Arc;

pub use broadcast::{BroadcastChannel, Next, SubscriberId};
pub use direct::DirectChannel;
pub use error::{ChannelError, HandlerError};
pub use queue::QueueChannel;

use crate::message::Message;

/// Anything that accepts messages
pub trait MessageChannel<T>: Send + Sync {
    /// Channel name, used in errors and logs
    fn name(&self) -> &str;

    /// Send a message
    ///
    /// Errors are synchronous and local to this call; channels never retry.
    fn send(&self, message: Message<T>) -> Result<(), ChannelError>;
}

/// Something that processes a single message
pub trait MessageHandler<T>: Send + Sync {
    fn handle_message(&self, message: Message<T>) -> Result<(), HandlerError>;
}

impl<T, F> MessageHandler<T> for F
where
    F: Fn(Message<T>) -> Result<(), HandlerError> + Send + Sync,
{
    fn handle_message(&self, message: Message<T>) -> Result<(), HandlerError> {
        self(message)
    }
}

/// The delivery model of a channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelKind {
    Direct,
    Broadcast,
    Queue,
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelKind::Direct => write!(f, "direct"),
            ChannelKind::Broadcast => write!(f, "broadcast"),
            ChannelKind::Queue => write!(f, "queue"),
        }
    }
}

/// One of the supported channels, shared by reference
pub enum Channel<T> {
    Direct(Arc<DirectChannel<T>>),
    Broadcast(Arc<BroadcastChannel<T>>),
    Queue(Arc<QueueChannel<T>>),
}

impl<T> Channel<T> {
    pub fn kind(&self) -> ChannelKind {
        match self {
            Channel::Direct(_) => ChannelKind::Direct,
            Channel::Broadcast(_) => ChannelKind::Broadcast,
            Channel::Queue(_) => ChannelKind::Queue,
        }
    }
}

impl<T: Send + 'static> Channel<T> {
    pub fn channel_name(&self) -> &str {
        match self {
            Channel::Direct(c) => c.name(),
            Channel::Broadcast(c) => c.name(),
            Channel::Queue(c) => c.name(),
        }
    }
}

// Manual impl: cloning the handle must not require `T: Clone`
impl<T> Clone for Channel<T> {
    fn clone(&self) -> Self {
        match self {
            Channel::Direct(c) => Channel::Direct(Arc::clone(c)),
            Channel::Broadcast(c) => Channel::Broadcast(Arc::clone(c)),
            Channel::Queue(c) => Channel::Queue(Arc::clone(c)),
        }
    }
}

impl<T: Send + 'static> MessageChannel<T> for Channel<T> {
    fn name(&self) -> &str {
        self.channel_name()
    }

    fn send(&self, message: Message<T>) -> Result<(), ChannelError> {
        match self {
            Channel::Direct(c) => c.send(message),
            Channel::Broadcast(c) => c.send(message),
            Channel::Queue(c) => c.send(message),
        }
    }
}

impl<T> From<Arc<DirectChannel<T>>> for Channel<T> {
    fn from(channel: Arc<DirectChannel<T>>) -> Self {
        Channel::Direct(channel)
    }
}

impl<T> From<Arc<BroadcastChannel<T>>> for Channel<T> {
    fn from(channel: Arc<BroadcastChannel<T>>) -> Self {
        Channel::Broadcast(channel)
    }
}

impl<T> From<Arc<QueueChannel<T>>> for Channel<T> {
    fn from(channel: Arc<QueueChannel<T>>) -> Self {
        Channel::Queue(channel)
    }
}
