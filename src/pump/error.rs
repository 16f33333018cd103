use thiserror::Error;

use super::dispatcher::DispatcherState;
use crate::channel::ChannelError;
use crate::error::ConfigurationError;

#[derive(Debug, Error)]
pub enum DispatcherError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    #[error(transparent)]
    Channel(#[from] ChannelError),
    #[error("dispatcher is {state:?}, expected {expected:?}")]
    InvalidState {
        state: DispatcherState,
        expected: DispatcherState,
    },
    #[error("unknown subscription {0}")]
    UnknownSubscription(String),
    #[error("failed to spawn performer thread: {0}")]
    Spawn(String),
    #[error("dispatcher lock poisoned during {0}")]
    LockPoisoned(&'static str),
}
