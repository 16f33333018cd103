use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProducerError {
    /// The transport could not be reached. Worth retrying.
    #[error("producer connection failed: {0}")]
    ConnectionFailed(String),
    /// The transport refused the message.
    #[error("message rejected by transport: {0}")]
    Rejected(String),
    #[error("producer lock poisoned during {0}")]
    LockPoisoned(&'static str),
}

impl ProducerError {
    pub fn is_transient(&self) -> bool {
        matches!(self, ProducerError::ConnectionFailed(_))
    }
}
