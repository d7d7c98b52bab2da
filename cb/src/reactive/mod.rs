//! Demand-driven subscriber protocol
//!
//! A [`Subscriber`] declares how many messages it can take through its
//! [`Subscription`] and receives no more than that. [`HandlerSubscriber`]
//! wraps a plain [`MessageHandler`](crate::channel::MessageHandler).

mod demand;
mod error;
mod handler;
mod subscriber;

pub use demand::Demand;
pub use error::SubscriptionError;
pub use handler::HandlerSubscriber;
pub use subscriber::{Subscriber, Subscription};

pub(crate) use subscriber::DemandSignal;
