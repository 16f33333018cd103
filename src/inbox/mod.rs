//! Inbox: idempotent consumption markers.

mod error;
mod in_memory;
#[allow(clippy::module_inception)]
mod inbox;

pub use error::InboxError;
pub use in_memory::InMemoryInbox;
pub use inbox::{record, Inbox};
#[cfg(feature = "async")]
pub use inbox::{record_async, AsyncInbox};
