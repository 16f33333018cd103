use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InboxError {
    /// The marker is already present. Callers racing on the same key treat this
    /// as success.
    #[error("message {id} already recorded for context {context_key}")]
    AlreadyExists { id: Uuid, context_key: String },
    #[error("inbox lock poisoned during {0}")]
    LockPoisoned(&'static str),
    #[error("inbox storage failure: {0}")]
    Storage(String),
}
