//! Message envelope: an immutable payload plus headers

use std::collections::BTreeMap;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

/// Headers attached to every message
///
/// `id` and `timestamp` are assigned when the message is created. User headers
/// are kept in a sorted map so keys are unique and iteration is stable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageHeaders {
    pub id: Uuid,

    /// Creation time in milliseconds since the Unix epoch
    pub timestamp: i64,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    values: BTreeMap<String, serde_json::Value>,
}

impl MessageHeaders {
    fn new(values: BTreeMap<String, serde_json::Value>) -> Self {
        Self {
            id: Uuid::now_v7(),
            timestamp: Utc::now().timestamp_millis(),
            values,
        }
    }

    /// Look up a user header
    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.values.get(key)
    }

    /// Look up a user header as a string
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.values.get(key).and_then(|v| v.as_str())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Iterate user headers in key order
    pub fn iter(&self) -> impl Iterator<Item = (&String, &serde_json::Value)> {
        self.values.iter()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// An immutable message
///
/// There are no setters: deriving a message with different headers creates a
/// new instance with its own id and timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message<T> {
    payload: T,
    headers: MessageHeaders,
}

impl<T> Message<T> {
    /// Create a message with no user headers
    pub fn new(payload: T) -> Self {
        Self {
            payload,
            headers: MessageHeaders::new(BTreeMap::new()),
        }
    }

    /// Start building a message with headers
    pub fn builder(payload: T) -> MessageBuilder<T> {
        MessageBuilder {
            payload,
            values: BTreeMap::new(),
        }
    }

    pub fn payload(&self) -> &T {
        &self.payload
    }

    pub fn headers(&self) -> &MessageHeaders {
        &self.headers
    }

    pub fn id(&self) -> Uuid {
        self.headers.id
    }

    pub fn into_payload(self) -> T {
        self.payload
    }

    /// Transform the payload, keeping user headers
    ///
    /// The result is a distinct message with a fresh id.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Message<U> {
        Message {
            payload: f(self.payload),
            headers: MessageHeaders::new(self.headers.values),
        }
    }
}

impl<T: Clone> Message<T> {
    /// Copy this message with one header added or replaced
    pub fn with_header(&self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        let key = key.into();
        debug!(id = %self.headers.id, %key, "Message::with_header: called");
        let mut values = self.headers.values.clone();
        values.insert(key, value.into());
        Self {
            payload: self.payload.clone(),
            headers: MessageHeaders::new(values),
        }
    }
}

/// Builder for messages carrying user headers
pub struct MessageBuilder<T> {
    payload: T,
    values: BTreeMap<String, serde_json::Value>,
}

impl<T> MessageBuilder<T> {
    /// Set a header; a later value for the same key wins
    pub fn header(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    pub fn build(self) -> Message<T> {
        Message {
            payload: self.payload,
            headers: MessageHeaders::new(self.values),
        }
    }
}
