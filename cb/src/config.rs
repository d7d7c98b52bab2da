//! ChannelBridge configuration types and loading

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::bridge::DEFAULT_PENDING_LIMIT;

const APP_NAME: &str = "channelbridge";

/// Main ChannelBridge configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Log level (trace, debug, info, warn, error)
    #[serde(rename = "log-level", skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,

    /// Channel defaults
    pub channels: ChannelsConfig,

    /// Reactive consumer settings
    pub consumer: ConsumerConfig,

    /// Polling endpoint settings
    pub poller: PollerConfig,
}

/// Only the log level, read before logging is set up
#[derive(Debug, Default, Deserialize)]
struct LogLevelOnly {
    #[serde(rename = "log-level", default)]
    log_level: Option<String>,
}

impl Config {
    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        // If explicit config path provided, try to load it
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        for candidate in Self::candidates() {
            if candidate.exists() {
                match Self::load_from_file(&candidate) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        tracing::warn!("Failed to load config from {}: {}", candidate.display(), e);
                    }
                }
            }
        }

        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Read just the log level from the first config file found
    ///
    /// Runs before logging exists, so failures are silent and yield `None`.
    pub fn load_log_level(config_path: Option<&PathBuf>) -> Option<String> {
        let path = match config_path {
            Some(path) => path.clone(),
            None => Self::candidates().into_iter().find(|p| p.exists())?,
        };
        let content = fs::read_to_string(path).ok()?;
        serde_yaml::from_str::<LogLevelOnly>(&content).ok()?.log_level
    }

    /// Project-local `.channelbridge.yml`, then `~/.config/channelbridge/channelbridge.yml`
    fn candidates() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from(format!(".{APP_NAME}.yml"))];
        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join(APP_NAME).join(format!("{APP_NAME}.yml")));
        }
        paths
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }
}

/// Channel defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelsConfig {
    /// Broadcast buffer capacity; unbounded when absent
    #[serde(rename = "broadcast-capacity", skip_serializing_if = "Option::is_none")]
    pub broadcast_capacity: Option<usize>,

    /// Queue capacity; unbounded when absent
    #[serde(rename = "queue-capacity", skip_serializing_if = "Option::is_none")]
    pub queue_capacity: Option<usize>,

    /// Default blocking receive timeout in milliseconds
    #[serde(rename = "receive-timeout-ms")]
    pub receive_timeout_ms: u64,
}

impl Default for ChannelsConfig {
    fn default() -> Self {
        Self {
            broadcast_capacity: None,
            queue_capacity: None,
            receive_timeout_ms: 1000,
        }
    }
}

impl ChannelsConfig {
    pub fn receive_timeout(&self) -> Duration {
        Duration::from_millis(self.receive_timeout_ms)
    }
}

/// Reactive consumer settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsumerConfig {
    /// Demand requested per batch by handler subscribers; unbounded when absent
    #[serde(rename = "request-batch", skip_serializing_if = "Option::is_none")]
    pub request_batch: Option<u64>,

    /// Start endpoints as soon as they are initialized
    #[serde(rename = "auto-startup")]
    pub auto_startup: bool,

    /// Direct sends held while there is no demand before `send` reports Full
    #[serde(rename = "pending-limit")]
    pub pending_limit: usize,
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            request_batch: None,
            auto_startup: true,
            pending_limit: DEFAULT_PENDING_LIMIT,
        }
    }
}

/// Polling endpoint settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PollerConfig {
    /// Time between polls in milliseconds
    #[serde(rename = "interval-ms")]
    pub interval_ms: u64,

    /// Upper bound on messages taken from the source per poll
    #[serde(rename = "max-messages-per-poll")]
    pub max_messages_per_poll: usize,

    /// How long stop waits for the poll task before aborting it
    #[serde(rename = "shutdown-timeout-ms")]
    pub shutdown_timeout_ms: u64,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval_ms: 1000,
            max_messages_per_poll: 1,
            shutdown_timeout_ms: 5000,
        }
    }
}

impl PollerConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }
}
