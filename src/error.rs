use thiserror::Error;

use crate::handler::Timing;
use crate::message::MessageType;

/// Wiring mistakes. These are fatal where they are detected and never retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    #[error("no handler registered for command {request}")]
    NoHandler { request: &'static str },
    #[error("{count} handlers registered for command {request}, a command needs exactly one")]
    MultipleHandlers { request: &'static str, count: usize },
    #[error("handler {handler} declares step {step} ({timing:?}) more than once")]
    DuplicateStep {
        handler: String,
        step: u32,
        timing: Timing,
    },
    #[error("no message mapper registered for {0}")]
    NoMapper(&'static str),
    #[error("no producer registered for topic {0}")]
    NoProducer(String),
    #[error("policy '{0}' is not registered")]
    MissingPolicy(String),
    #[error("command processor has no outbox configured")]
    NoOutbox,
    #[error("message of type {found:?} cannot be dispatched to a {expected} route")]
    MessageTypeMismatch {
        found: MessageType,
        expected: &'static str,
    },
    #[error("invalid configuration: {0}")]
    Invalid(String),
}
