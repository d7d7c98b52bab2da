//! ChannelBridge - reactive consumers over message channels
//!
//! Attaches demand-driven subscribers to channels with different delivery
//! models, under a start/stop lifecycle that pauses delivery without losing
//! or duplicating messages.
//!
//! # Core Concepts
//!
//! - **Demand**: a subscriber receives at most what it has requested
//! - **Three channel kinds**: push-synchronous direct, buffered broadcast, pollable queue
//! - **Pause, not complete**: `stop` detaches without a terminal signal; `start` resubscribes
//!
//! # Modules
//!
//! - [`message`] - Immutable messages with headers
//! - [`channel`] - Direct, broadcast and queue channels
//! - [`reactive`] - Subscriber contract, subscriptions and demand accounting
//! - [`lifecycle`] - Start/stop state machine
//! - [`bridge`] - The reactive consumer bridge
//! - [`endpoint`] - Consumer and polling endpoints
//! - [`metadata`] - Key/value store for polling positions
//! - [`config`] - Configuration types and loading
//! - [`cli`] - Command-line interface

pub mod bridge;
pub mod channel;
pub mod cli;
pub mod config;
pub mod endpoint;
pub mod lifecycle;
pub mod message;
pub mod metadata;
pub mod reactive;

// Re-export commonly used types
pub use bridge::{BridgeError, ReactiveConsumer};
pub use channel::{
    BroadcastChannel, Channel, ChannelError, ChannelKind, DirectChannel, HandlerError, MessageChannel, MessageHandler,
    QueueChannel,
};
pub use config::Config;
pub use endpoint::{
    ConsumerEndpoint, CursoredSource, MessageSource, MetadataTrackingSource, SourcePollingEndpoint, StreamSource,
};
pub use lifecycle::{Lifecycle, LifecycleState};
pub use message::{Message, MessageHeaders};
pub use metadata::{InMemoryMetadataStore, MetadataStore};
pub use reactive::{HandlerSubscriber, Subscriber, Subscription, SubscriptionError};
