use std::time::Duration;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::body::MessageBody;
use super::header::{MessageHeader, MessageType};

/// Wire-level envelope: header plus body.
///
/// A message is immutable once built. The pump is the only writer, and it only
/// touches the redelivery bookkeeping (`handled_count`, `delayed`).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub header: MessageHeader,
    pub body: MessageBody,
}

impl Message {
    pub fn new(header: MessageHeader, body: MessageBody) -> Self {
        Self { header, body }
    }

    /// The "nothing arrived" value returned by a channel on receive timeout.
    pub fn none(topic: impl Into<String>) -> Self {
        Self::sentinel(topic, MessageType::None)
    }

    /// The reserved message that makes a performer exit its loop.
    pub fn quit(topic: impl Into<String>) -> Self {
        Self::sentinel(topic, MessageType::Quit)
    }

    /// A frame the transport received but could not parse into a message.
    pub fn unacceptable(id: Uuid, topic: impl Into<String>, raw: Vec<u8>) -> Self {
        let header = MessageHeader::new(id, topic, MessageType::Unacceptable);
        Self::new(header, MessageBody::new(raw, "application/octet-stream"))
    }

    fn sentinel(topic: impl Into<String>, message_type: MessageType) -> Self {
        Self::new(
            MessageHeader::new(Uuid::nil(), topic, message_type),
            MessageBody::default(),
        )
    }

    pub fn id(&self) -> Uuid {
        self.header.id
    }

    pub fn message_type(&self) -> MessageType {
        self.header.message_type
    }

    pub fn topic(&self) -> &str {
        &self.header.topic
    }

    pub fn handled_count(&self) -> u32 {
        self.header.handled_count
    }

    pub fn is_quit(&self) -> bool {
        self.header.message_type == MessageType::Quit
    }

    pub fn is_empty(&self) -> bool {
        self.header.message_type == MessageType::None
    }

    /// Record one more failed handling attempt.
    pub fn update_handled_count(&mut self) {
        self.header.handled_count = self.header.handled_count.saturating_add(1);
    }

    /// True once the message has been handled (and failed) `ceiling` times.
    pub fn handled_count_reached(&self, ceiling: u32) -> bool {
        self.header.handled_count >= ceiling
    }

    pub(crate) fn set_delay(&mut self, delay: Duration) {
        self.header.delayed = delay;
    }
}
