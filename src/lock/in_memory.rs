use std::collections::HashMap;
use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant};

use uuid::Uuid;

use super::{DistributedLock, LockError};

struct Lease {
    lock_id: String,
    acquired: Instant,
}

/// In-process lock table backed by `Mutex<HashMap>` + `Condvar`.
///
/// With a lease, a holder that never releases loses the lock once the lease
/// has elapsed.
pub struct InMemoryDistributedLock {
    held: Mutex<HashMap<String, Lease>>,
    wake: Condvar,
    lease: Option<Duration>,
}

impl InMemoryDistributedLock {
    pub fn new() -> Self {
        InMemoryDistributedLock {
            held: Mutex::new(HashMap::new()),
            wake: Condvar::new(),
            lease: None,
        }
    }

    pub fn with_lease(lease: Duration) -> Self {
        InMemoryDistributedLock {
            lease: Some(lease),
            ..Self::new()
        }
    }

    fn is_live(&self, lease: &Lease) -> bool {
        match self.lease {
            Some(limit) => lease.acquired.elapsed() < limit,
            None => true,
        }
    }

    /// Block until the lock is obtained or `timeout` elapses.
    pub fn wait_for_lock(&self, resource: &str, timeout: Duration) -> Result<Option<String>, LockError> {
        let deadline = Instant::now() + timeout;
        let mut held = self
            .held
            .lock()
            .map_err(|e| LockError::Poisoned(e.to_string()))?;
        loop {
            let free = match held.get(resource) {
                Some(lease) => !self.is_live(lease),
                None => true,
            };
            if free {
                let lock_id = Uuid::new_v4().to_string();
                held.insert(
                    resource.to_string(),
                    Lease {
                        lock_id: lock_id.clone(),
                        acquired: Instant::now(),
                    },
                );
                return Ok(Some(lock_id));
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }
            held = self
                .wake
                .wait_timeout(held, deadline - now)
                .map_err(|e| LockError::Poisoned(e.to_string()))?
                .0;
        }
    }

    pub fn is_locked(&self, resource: &str) -> bool {
        self.held
            .lock()
            .map(|held| held.get(resource).is_some_and(|lease| self.is_live(lease)))
            .unwrap_or(false)
    }
}

impl Default for InMemoryDistributedLock {
    fn default() -> Self {
        Self::new()
    }
}

impl DistributedLock for InMemoryDistributedLock {
    fn obtain_lock(&self, resource: &str) -> Result<Option<String>, LockError> {
        self.wait_for_lock(resource, Duration::ZERO)
    }

    fn release_lock(&self, resource: &str, lock_id: &str) -> Result<(), LockError> {
        let mut held = self
            .held
            .lock()
            .map_err(|e| LockError::Poisoned(e.to_string()))?;
        match held.get(resource) {
            Some(lease) if lease.lock_id == lock_id => {
                let expired = !self.is_live(lease);
                held.remove(resource);
                self.wake.notify_one();
                if expired {
                    return Err(LockError::Expired(resource.to_string()));
                }
                Ok(())
            }
            _ => Err(LockError::ReleaseFailed(format!(
                "{} is not held by {}",
                resource, lock_id
            ))),
        }
    }
}
