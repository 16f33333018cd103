use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OutboxError {
    #[error("outbox lock poisoned during {0}")]
    LockPoisoned(&'static str),
    /// The transaction handle belongs to another store.
    #[error("transaction does not belong to this outbox")]
    ForeignTransaction,
    #[error("transaction already finished")]
    TransactionClosed,
    #[error("too many outstanding messages: {outstanding} (limit {max})")]
    LimitReached { outstanding: usize, max: usize },
    #[error("outbox storage failure for {id:?}: {reason}")]
    Storage { id: Option<Uuid>, reason: String },
}
