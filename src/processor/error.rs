use std::fmt;

use thiserror::Error;

use crate::error::ConfigurationError;
use crate::handler::HandlerError;
use crate::mapper::MappingError;
use crate::outbox::OutboxError;

/// One failed handler of a publish.
#[derive(Debug)]
pub struct HandlerFailure {
    pub handler: String,
    pub error: HandlerError,
}

impl fmt::Display for HandlerFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.handler, self.error)
    }
}

fn list(failures: &[HandlerFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

#[derive(Debug, Error)]
pub enum ProcessorError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    #[error("handler {handler} failed: {source}")]
    Handler {
        handler: String,
        #[source]
        source: HandlerError,
    },
    /// Every failure of a publish, so one handler's success never hides
    /// another's failure.
    #[error("{} handler(s) failed: {}", .0.len(), list(.0))]
    Aggregate(Vec<HandlerFailure>),
    #[error(transparent)]
    Mapping(#[from] MappingError),
    #[error("outbox limit reached: {outstanding} outstanding (limit {max})")]
    OutboxLimitReached { outstanding: usize, max: usize },
    #[error(transparent)]
    Outbox(OutboxError),
}

impl From<OutboxError> for ProcessorError {
    fn from(err: OutboxError) -> Self {
        match err {
            OutboxError::LimitReached { outstanding, max } => {
                ProcessorError::OutboxLimitReached { outstanding, max }
            }
            other => ProcessorError::Outbox(other),
        }
    }
}

impl ProcessorError {
    pub(crate) fn from_handler(handler: &str, err: HandlerError) -> Self {
        match err {
            HandlerError::Configuration(config) => ProcessorError::Configuration(config),
            source => ProcessorError::Handler {
                handler: handler.to_string(),
                source,
            },
        }
    }

    /// Worth delivering again later.
    pub fn is_transient(&self) -> bool {
        match self {
            ProcessorError::Handler { source, .. } => source.is_transient(),
            ProcessorError::Aggregate(failures) => {
                !failures.is_empty() && failures.iter().all(|f| f.error.is_transient())
            }
            ProcessorError::OutboxLimitReached { .. } => true,
            _ => false,
        }
    }

    /// A wiring mistake, directly or inside an aggregate.
    pub fn is_configuration(&self) -> bool {
        match self {
            ProcessorError::Configuration(_) => true,
            ProcessorError::Aggregate(failures) => failures.iter().any(|f| f.error.is_configuration()),
            _ => false,
        }
    }

    pub fn failures(&self) -> &[HandlerFailure] {
        match self {
            ProcessorError::Aggregate(failures) => failures,
            _ => &[],
        }
    }
}
