use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::mediator::{ClearReport, OutboxProducerMediator};
use super::outbox::OutboxEntry;
use crate::lock::DistributedLock;

/// Lock resource shared by every sweeper instance.
pub const SWEEPER_LOCK: &str = "outbox-sweeper";

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SweeperConfig {
    pub interval_ms: u64,
    /// Entries younger than this are left to the explicit clear.
    pub min_age_ms: u64,
    pub batch_size: usize,
}

impl Default for SweeperConfig {
    fn default() -> Self {
        Self {
            interval_ms: 5000,
            min_age_ms: 5000,
            batch_size: 100,
        }
    }
}

impl SweeperConfig {
    pub fn new(interval: Duration, min_age: Duration, batch_size: usize) -> Self {
        Self {
            interval_ms: interval.as_millis() as u64,
            min_age_ms: min_age.as_millis() as u64,
            batch_size,
        }
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn min_age(&self) -> Duration {
        Duration::from_millis(self.min_age_ms)
    }
}

/// Statistics from one or more sweeps.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SweepStats {
    pub passes: usize,
    /// Passes skipped because another instance held the lock.
    pub lock_contended: usize,
    pub candidates: usize,
    pub cleared: ClearReport,
}

impl SweepStats {
    pub fn merge(&mut self, other: &SweepStats) {
        self.passes += other.passes;
        self.lock_contended += other.lock_contended;
        self.candidates += other.candidates;
        self.cleared.merge(&other.cleared);
    }
}

/// Resends outbox entries that were deposited but never cleared.
pub struct OutboxSweeper {
    mediator: Arc<OutboxProducerMediator>,
    config: SweeperConfig,
    lock: Option<Arc<dyn DistributedLock>>,
}

impl OutboxSweeper {
    pub fn new(mediator: Arc<OutboxProducerMediator>, config: SweeperConfig) -> Self {
        Self {
            mediator,
            config,
            lock: None,
        }
    }

    /// Coordinate with other sweepers through `lock`.
    pub fn with_lock(mut self, lock: Arc<dyn DistributedLock>) -> Self {
        self.lock = Some(lock);
        self
    }

    pub fn config(&self) -> &SweeperConfig {
        &self.config
    }

    fn obtain(&self) -> Result<Option<String>, ()> {
        let Some(lock) = &self.lock else {
            return Ok(Some(String::new()));
        };
        match lock.obtain_lock(SWEEPER_LOCK) {
            Ok(Some(id)) => Ok(Some(id)),
            Ok(None) => {
                debug!("another sweeper holds the lock");
                Ok(None)
            }
            Err(err) => {
                warn!(error = %err, "could not obtain sweeper lock");
                Err(())
            }
        }
    }

    fn release(&self, lock_id: &str) {
        if let Some(lock) = &self.lock {
            if let Err(err) = lock.release_lock(SWEEPER_LOCK, lock_id) {
                warn!(error = %err, "could not release sweeper lock");
            }
        }
    }

    /// One pass: clear up to `batch_size` outstanding entries, oldest first.
    pub fn sweep(&self) -> SweepStats {
        let mut stats = SweepStats {
            passes: 1,
            ..SweepStats::default()
        };
        let lock_id = match self.obtain() {
            Ok(Some(id)) => id,
            Ok(None) => {
                stats.lock_contended = 1;
                return stats;
            }
            Err(()) => return stats,
        };

        match self
            .mediator
            .outbox()
            .outstanding_messages(self.config.min_age(), self.config.batch_size)
        {
            Ok(entries) => {
                let ids: Vec<Uuid> = entries.iter().map(OutboxEntry::id).collect();
                stats.candidates = ids.len();
                if !ids.is_empty() {
                    info!(candidates = ids.len(), "sweeping outstanding outbox messages");
                    stats.cleared = self.mediator.clear(&ids);
                }
            }
            Err(err) => warn!(error = %err, "could not list outstanding messages"),
        }

        self.release(&lock_id);
        stats
    }

    #[cfg(feature = "async")]
    pub async fn sweep_async(&self) -> SweepStats {
        let mut stats = SweepStats {
            passes: 1,
            ..SweepStats::default()
        };
        let Some(outbox) = self.mediator.async_outbox() else {
            warn!("no async outbox configured, sweeping synchronously");
            return self.sweep();
        };
        let lock_id = match self.obtain() {
            Ok(Some(id)) => id,
            Ok(None) => {
                stats.lock_contended = 1;
                return stats;
            }
            Err(()) => return stats,
        };

        match outbox
            .outstanding_messages(self.config.min_age(), self.config.batch_size)
            .await
        {
            Ok(entries) => {
                let ids: Vec<Uuid> = entries.iter().map(OutboxEntry::id).collect();
                stats.candidates = ids.len();
                if !ids.is_empty() {
                    info!(candidates = ids.len(), "sweeping outstanding outbox messages");
                    stats.cleared = self.mediator.clear_async(&ids).await;
                }
            }
            Err(err) => warn!(error = %err, "could not list outstanding messages"),
        }

        self.release(&lock_id);
        stats
    }
}
