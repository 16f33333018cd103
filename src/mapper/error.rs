use thiserror::Error;

use crate::message::MessageType;

/// A request could not be turned into a message, or the reverse.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MappingError {
    #[error("failed to serialize request: {0}")]
    Serialize(String),
    #[error("failed to deserialize message body: {0}")]
    Deserialize(String),
    #[error("message type {found:?} cannot be mapped to {expected}")]
    UnexpectedType {
        found: MessageType,
        expected: &'static str,
    },
    #[error("invalid message: {0}")]
    Invalid(String),
}
