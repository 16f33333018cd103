use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What kind of message travels on the wire.
///
/// `None`, `Quit` and `Unacceptable` never carry application payloads: they are
/// produced by channels to tell the pump that nothing arrived, that it should
/// exit, or that an incoming frame could not be parsed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageType {
    Command,
    Event,
    Document,
    #[default]
    None,
    Quit,
    Unacceptable,
}

impl MessageType {
    /// True for message types that carry a request for the command processor.
    pub fn is_dispatchable(self) -> bool {
        matches!(
            self,
            MessageType::Command | MessageType::Event | MessageType::Document
        )
    }
}

/// Envelope metadata for a [`Message`](super::Message).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MessageHeader {
    pub id: Uuid,
    /// Topic or routing key the message is published on.
    pub topic: String,
    pub message_type: MessageType,
    pub correlation_id: Option<Uuid>,
    /// How many times the pump has failed to handle this message.
    pub handled_count: u32,
    /// Delay applied by the last requeue.
    #[serde(default, with = "duration_ms")]
    pub delayed: Duration,
    /// Open property bag (trace context, original message id, tenant, ...).
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub bag: HashMap<String, serde_json::Value>,
    pub timestamp: DateTime<Utc>,
    pub content_type: String,
    pub reply_to: Option<String>,
    pub partition_key: Option<String>,
}

impl MessageHeader {
    pub const DEFAULT_CONTENT_TYPE: &'static str = "application/json";

    /// Create a header with a fresh timestamp and default content type.
    pub fn new(id: Uuid, topic: impl Into<String>, message_type: MessageType) -> Self {
        Self {
            id,
            topic: topic.into(),
            message_type,
            correlation_id: None,
            handled_count: 0,
            delayed: Duration::ZERO,
            bag: HashMap::new(),
            timestamp: Utc::now(),
            content_type: Self::DEFAULT_CONTENT_TYPE.to_string(),
            reply_to: None,
            partition_key: None,
        }
    }

    pub fn with_correlation_id(mut self, correlation_id: Uuid) -> Self {
        self.correlation_id = Some(correlation_id);
        self
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = content_type.into();
        self
    }

    pub fn with_reply_to(mut self, reply_to: impl Into<String>) -> Self {
        self.reply_to = Some(reply_to.into());
        self
    }

    pub fn with_partition_key(mut self, key: impl Into<String>) -> Self {
        self.partition_key = Some(key.into());
        self
    }

    /// Add a bag entry.
    pub fn with_bag_entry(
        mut self,
        key: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        self.bag.insert(key.into(), value.into());
        self
    }

    pub fn bag_value(&self, key: &str) -> Option<&serde_json::Value> {
        self.bag.get(key)
    }
}

mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
