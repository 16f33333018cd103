//! Request context handed to every step of a pipeline.

mod cancellation;
mod request_context;

pub use cancellation::CancellationHandle;
pub use request_context::RequestContext;

/// Bag key: name of the channel a pumped message arrived on.
pub const CHANNEL_NAME: &str = "channel_name";
/// Bag key: RFC 3339 timestamp at which the pump started dispatching.
pub const REQUEST_START: &str = "request_start";
/// Bag key: error that made a fallback step take over.
pub const FALLBACK_CAUSE: &str = "fallback_cause";
