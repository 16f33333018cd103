use std::any::Any;
use std::error::Error;
use std::time::Duration;

use thiserror::Error;

use crate::error::ConfigurationError;
use crate::inbox::InboxError;

/// Error raised by a handler or by one of the steps around it.
#[derive(Debug, Error)]
pub enum HandlerError {
    /// Input validation failed before the handler body ran.
    #[error("validation failed: {0}")]
    Validation(String),
    /// Something that may succeed if tried again (connection drop, lock timeout, ...).
    #[error("transient failure: {0}")]
    Transient(String),
    /// The remainder of the pipeline overran its time budget.
    #[error("timed out after {0:?}")]
    Timeout(Duration),
    /// A circuit breaker refused the call.
    #[error("circuit '{0}' is open")]
    BrokenCircuit(String),
    /// The handler observed cancellation and gave up.
    #[error("cancelled")]
    Cancelled,
    /// Aggregate or resource not found.
    #[error("not found: {0}")]
    NotFound(String),
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    #[error("inbox error: {0}")]
    Inbox(#[from] InboxError),
    /// Business failure with a plain description.
    #[error("handler failed: {0}")]
    Failed(String),
    /// The pipeline panicked; the payload is kept as text.
    #[error("handler panicked: {0}")]
    Panicked(String),
    #[error("handler error: {0}")]
    Other(#[source] Box<dyn Error + Send + Sync>),
}

impl HandlerError {
    /// Errors a retry policy may try again.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            HandlerError::Transient(_) | HandlerError::Timeout(_) | HandlerError::BrokenCircuit(_)
        )
    }

    pub fn is_configuration(&self) -> bool {
        matches!(self, HandlerError::Configuration(_))
    }

    pub fn other<E: Error + Send + Sync + 'static>(err: E) -> Self {
        HandlerError::Other(Box::new(err))
    }
}

/// Readable text for a caught panic payload.
pub(crate) fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(text) = panic.downcast_ref::<&str>() {
        (*text).to_string()
    } else if let Some(text) = panic.downcast_ref::<String>() {
        text.clone()
    } else {
        "unknown panic".to_string()
    }
}

impl From<serde_json::Error> for HandlerError {
    fn from(err: serde_json::Error) -> Self {
        HandlerError::Validation(err.to_string())
    }
}
