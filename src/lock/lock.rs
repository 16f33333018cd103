use super::LockError;

/// Cross-process mutual exclusion on a named resource.
///
/// Used to keep several sweeper instances from clearing the same outbox at
/// once. Implementations might use Redis, Postgres advisory locks, etcd
/// leases, etc.
pub trait DistributedLock: Send + Sync {
    /// Try to take the lock without blocking.
    /// Returns `Ok(Some(lock_id))` if acquired, `Ok(None)` if someone else holds it.
    fn obtain_lock(&self, resource: &str) -> Result<Option<String>, LockError>;

    /// Release a lock previously obtained with `lock_id`.
    fn release_lock(&self, resource: &str, lock_id: &str) -> Result<(), LockError>;
}
