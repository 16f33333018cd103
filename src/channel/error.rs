use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChannelError {
    /// The transport failed. The pump backs off and receives again.
    #[error("channel {channel} failed: {reason}")]
    Failure { channel: String, reason: String },
    #[error("infrastructure for channel {channel} does not exist")]
    MissingInfrastructure { channel: String },
    #[error("channel lock poisoned during {0}")]
    LockPoisoned(&'static str),
    #[error("channel {0} is closed")]
    Closed(String),
}

impl ChannelError {
    pub fn failure(channel: impl Into<String>, reason: impl Into<String>) -> Self {
        ChannelError::Failure {
            channel: channel.into(),
            reason: reason.into(),
        }
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, ChannelError::Failure { .. })
    }
}
