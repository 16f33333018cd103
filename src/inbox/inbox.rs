use uuid::Uuid;

#[cfg(feature = "async")]
use async_trait::async_trait;

use super::error::InboxError;

/// Storage contract for "already processed" markers.
///
/// A marker is keyed by message id plus a context key, so the same message can
/// be seen for the first time by several independent consumers.
pub trait Inbox: Send + Sync {
    fn exists(&self, message_id: Uuid, context_key: &str) -> Result<bool, InboxError>;

    /// Record a marker. Fails with [`InboxError::AlreadyExists`] on a duplicate.
    fn add(&self, message_id: Uuid, context_key: &str) -> Result<(), InboxError>;
}

#[cfg(feature = "async")]
#[async_trait]
pub trait AsyncInbox: Send + Sync {
    async fn exists(&self, message_id: Uuid, context_key: &str) -> Result<bool, InboxError>;

    async fn add(&self, message_id: Uuid, context_key: &str) -> Result<(), InboxError>;
}

/// Add a marker, treating a concurrent duplicate as success.
pub fn record(inbox: &dyn Inbox, message_id: Uuid, context_key: &str) -> Result<(), InboxError> {
    match inbox.add(message_id, context_key) {
        Ok(()) | Err(InboxError::AlreadyExists { .. }) => Ok(()),
        Err(err) => Err(err),
    }
}

#[cfg(feature = "async")]
pub async fn record_async(
    inbox: &dyn AsyncInbox,
    message_id: Uuid,
    context_key: &str,
) -> Result<(), InboxError> {
    match inbox.add(message_id, context_key).await {
        Ok(()) | Err(InboxError::AlreadyExists { .. }) => Ok(()),
        Err(err) => Err(err),
    }
}
