use std::any::Any;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[cfg(feature = "async")]
use async_trait::async_trait;

use super::error::OutboxError;
use crate::message::Message;

/// A stored message and its dispatch bookkeeping.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OutboxEntry {
    pub message: Message,
    pub deposited_at: DateTime<Utc>,
    pub dispatched_at: Option<DateTime<Utc>>,
}

impl OutboxEntry {
    pub fn new(message: Message) -> Self {
        Self {
            message,
            deposited_at: Utc::now(),
            dispatched_at: None,
        }
    }

    pub fn id(&self) -> Uuid {
        self.message.id()
    }

    pub fn is_dispatched(&self) -> bool {
        self.dispatched_at.is_some()
    }

    /// Time since deposit. Clock skew into the future counts as zero.
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        (now - self.deposited_at).to_std().unwrap_or(Duration::ZERO)
    }
}

/// The caller's unit of work, handed through to the store.
///
/// Each store downcasts to its own transaction type and refuses foreign ones.
pub trait Transaction: Send + Sync {
    fn as_any(&self) -> &dyn Any;
}

/// Storage contract for the outbox.
///
/// `mark_dispatched` must be conditional: concurrent clears of the same id
/// (explicit clear racing the sweeper) must see exactly one `true`.
pub trait Outbox: Send + Sync {
    /// Store a message, inside `transaction` when one is given. Adding an id
    /// that is already stored keeps the first entry.
    fn add(&self, message: &Message, transaction: Option<&dyn Transaction>) -> Result<(), OutboxError>;

    fn get(&self, id: Uuid) -> Result<Option<OutboxEntry>, OutboxError>;

    /// Entries in deposit order. `page_number` starts at 1.
    fn get_page(&self, page_size: usize, page_number: usize) -> Result<Vec<OutboxEntry>, OutboxError>;

    /// Returns `false` if the entry is absent or already dispatched.
    fn mark_dispatched(&self, id: Uuid, at: DateTime<Utc>) -> Result<bool, OutboxError>;

    /// Undispatched entries deposited at least `older_than` ago, oldest first.
    fn outstanding_messages(&self, older_than: Duration, page_size: usize) -> Result<Vec<OutboxEntry>, OutboxError>;

    /// Entries dispatched at least `since` ago, oldest dispatch first.
    fn dispatched_messages(&self, since: Duration, page_size: usize) -> Result<Vec<OutboxEntry>, OutboxError>;

    fn outstanding_count(&self) -> Result<usize, OutboxError>;
}

#[cfg(feature = "async")]
#[async_trait]
pub trait AsyncOutbox: Send + Sync {
    async fn add(&self, message: &Message, transaction: Option<&dyn Transaction>) -> Result<(), OutboxError>;

    async fn get(&self, id: Uuid) -> Result<Option<OutboxEntry>, OutboxError>;

    async fn mark_dispatched(&self, id: Uuid, at: DateTime<Utc>) -> Result<bool, OutboxError>;

    async fn outstanding_messages(&self, older_than: Duration, page_size: usize) -> Result<Vec<OutboxEntry>, OutboxError>;

    async fn outstanding_count(&self) -> Result<usize, OutboxError>;
}
