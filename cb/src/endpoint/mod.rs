//! Endpoints: lifecycle-managed composites built from channels and bridges
//!
//! - [`ConsumerEndpoint`] binds a message handler to any channel through a
//!   [`ReactiveConsumer`]
//! - [`SourcePollingEndpoint`] polls a [`MessageSource`] and feeds a channel

mod polling;

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};

pub use polling::{
    CURSOR_HEADER, CursoredSource, MessageSource, MetadataTrackingSource, SourcePollingEndpoint, StreamSource,
};

use crate::bridge::{BridgeError, ReactiveConsumer};
use crate::channel::{Channel, MessageHandler};
use crate::config::ConsumerConfig;
use crate::lifecycle::Lifecycle;
use crate::reactive::HandlerSubscriber;

/// A named handler attached to a channel
pub struct ConsumerEndpoint<T> {
    name: String,
    consumer: ReactiveConsumer<T>,
    auto_startup: bool,
}

impl<T: Clone + Send + 'static> ConsumerEndpoint<T> {
    pub fn new(name: impl Into<String>, channel: impl Into<Channel<T>>, handler: Arc<dyn MessageHandler<T>>) -> Self {
        Self::from_config(name, channel, handler, &ConsumerConfig::default())
    }

    pub fn from_config(
        name: impl Into<String>,
        channel: impl Into<Channel<T>>,
        handler: Arc<dyn MessageHandler<T>>,
        config: &ConsumerConfig,
    ) -> Self {
        let name = name.into();
        debug!(%name, ?config, "ConsumerEndpoint::from_config: called");
        let subscriber = Arc::new(HandlerSubscriber::with_batch(handler, config.request_batch));
        Self {
            consumer: ReactiveConsumer::new(channel, subscriber)
                .with_name(name.clone())
                .with_pending_limit(config.pending_limit),
            name,
            auto_startup: config.auto_startup,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_auto_startup(&self) -> bool {
        self.auto_startup
    }

    pub fn consumer(&self) -> &ReactiveConsumer<T> {
        &self.consumer
    }

    /// Initialize the bridge and start it when auto-startup is on
    pub async fn initialize(&mut self) -> Result<(), BridgeError> {
        debug!(name = %self.name, auto_startup = self.auto_startup, "ConsumerEndpoint::initialize: called");
        self.consumer.initialize()?;
        if self.auto_startup {
            info!(name = %self.name, "ConsumerEndpoint auto-starting");
            self.consumer.start().await?;
        }
        Ok(())
    }
}

#[async_trait]
impl<T: Clone + Send + 'static> Lifecycle for ConsumerEndpoint<T> {
    async fn start(&mut self) -> Result<(), BridgeError> {
        debug!(name = %self.name, "ConsumerEndpoint::start: called");
        self.consumer.start().await
    }

    async fn stop(&mut self) {
        debug!(name = %self.name, "ConsumerEndpoint::stop: called");
        self.consumer.stop().await
    }

    fn is_running(&self) -> bool {
        self.consumer.is_running()
    }
}
