use thiserror::Error;

/// Error type for lock operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LockError {
    /// The underlying lock primitive was poisoned (a thread panicked while holding it).
    #[error("lock poisoned: {0}")]
    Poisoned(String),
    /// Failed to talk to the lock backend.
    #[error("lock acquire failed: {0}")]
    AcquireFailed(String),
    /// The caller does not hold the lock it tried to release.
    #[error("lock release failed: {0}")]
    ReleaseFailed(String),
    /// The lease elapsed before the lock was released.
    #[error("lock expired: {0}")]
    Expired(String),
}
