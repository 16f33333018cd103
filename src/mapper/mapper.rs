use std::marker::PhantomData;

use serde::de::DeserializeOwned;
use serde::Serialize;

use super::error::MappingError;
use crate::message::{Message, MessageBody, MessageHeader, MessageType};
use crate::request::{type_name, Request};

/// Where and as what a request type is published.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Publication {
    pub topic: String,
    pub message_type: MessageType,
    pub reply_to: Option<String>,
}

impl Publication {
    pub fn command(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            message_type: MessageType::Command,
            reply_to: None,
        }
    }

    pub fn event(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            message_type: MessageType::Event,
            reply_to: None,
        }
    }

    pub fn with_reply_to(mut self, reply_to: impl Into<String>) -> Self {
        self.reply_to = Some(reply_to.into());
        self
    }
}

/// Converts between a request type and its wire message.
pub trait MessageMapper<R: Request>: Send + Sync {
    fn map_to_message(&self, request: &R, publication: &Publication) -> Result<Message, MappingError>;

    fn map_to_request(&self, message: &Message) -> Result<R, MappingError>;
}

/// Mapper for serde types: the body is the request as JSON and the message id
/// is the request id.
pub struct JsonMessageMapper<R> {
    _request: PhantomData<fn() -> R>,
}

impl<R> Default for JsonMessageMapper<R> {
    fn default() -> Self {
        Self {
            _request: PhantomData,
        }
    }
}

impl<R> JsonMessageMapper<R> {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<R> MessageMapper<R> for JsonMessageMapper<R>
where
    R: Request + Serialize + DeserializeOwned,
{
    fn map_to_message(&self, request: &R, publication: &Publication) -> Result<Message, MappingError> {
        let body = MessageBody::from_json(request).map_err(|e| MappingError::Serialize(e.to_string()))?;
        let mut header = MessageHeader::new(request.id(), &publication.topic, publication.message_type)
            .with_content_type(body.content_type.clone());
        if let Some(reply_to) = &publication.reply_to {
            header = header.with_reply_to(reply_to);
        }
        Ok(Message::new(header, body))
    }

    fn map_to_request(&self, message: &Message) -> Result<R, MappingError> {
        if !message.message_type().is_dispatchable() {
            return Err(MappingError::UnexpectedType {
                found: message.message_type(),
                expected: type_name::<R>(),
            });
        }
        message
            .body
            .to_json()
            .map_err(|e| MappingError::Deserialize(e.to_string()))
    }
}
