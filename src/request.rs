//! Request taxonomy.
//!
//! Everything dispatched through a pipeline is a [`Request`]. A [`Command`]
//! expresses intent and must have exactly one handler; an [`Event`] is a
//! notification with zero or more handlers.

use uuid::Uuid;

/// Anything that can be dispatched through the command processor.
pub trait Request: Send + Sync + 'static {
    /// Stable identifier of this request. Becomes the message id when the
    /// request is mapped onto the wire, and is the key for inbox lookups.
    fn id(&self) -> Uuid;
}

/// Imperative request, handled by exactly one handler.
pub trait Command: Request {}

/// Notification, handled by zero or more handlers.
pub trait Event: Request {}

/// Whether a request type is sent or published.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RequestKind {
    Command,
    Event,
}

/// Type name used in logs and error messages.
pub(crate) fn type_name<R: ?Sized>() -> &'static str {
    let full = std::any::type_name::<R>();
    full.rsplit("::").next().unwrap_or(full)
}
