use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use chrono::Utc;
use serde::Deserialize;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::error::OutboxError;
use super::outbox::{Outbox, OutboxEntry, Transaction};
#[cfg(feature = "async")]
use super::outbox::AsyncOutbox;
#[cfg(feature = "async")]
use super::in_memory::InMemoryOutbox;
use crate::message::Message;
use crate::producer::ProducerRegistry;

/// Back-pressure on deposits while too much is waiting to be sent.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct OutboxLimits {
    /// Zero disables the check.
    pub max_outstanding: usize,
    pub check_interval_ms: u64,
}

impl Default for OutboxLimits {
    fn default() -> Self {
        Self {
            max_outstanding: 0,
            check_interval_ms: 1000,
        }
    }
}

impl OutboxLimits {
    pub fn new(max_outstanding: usize, check_interval: Duration) -> Self {
        Self {
            max_outstanding,
            check_interval_ms: check_interval.as_millis() as u64,
        }
    }

    pub fn check_interval(&self) -> Duration {
        Duration::from_millis(self.check_interval_ms)
    }

    pub fn is_enabled(&self) -> bool {
        self.max_outstanding > 0
    }
}

/// What a clear did with each requested id.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ClearReport {
    pub sent: usize,
    /// No entry: never deposited, or its transaction rolled back.
    pub skipped_missing: usize,
    pub skipped_dispatched: usize,
    pub failed: usize,
}

impl ClearReport {
    pub fn merge(&mut self, other: &ClearReport) {
        self.sent += other.sent;
        self.skipped_missing += other.skipped_missing;
        self.skipped_dispatched += other.skipped_dispatched;
        self.failed += other.failed;
    }

    pub fn is_clean(&self) -> bool {
        self.failed == 0
    }
}

#[derive(Default)]
struct OutstandingCache {
    checked: Option<Instant>,
    count: usize,
}

/// Moves messages between the outbox and the producers.
///
/// Shared by the command processor (deposit, clear) and the sweeper
/// (recovery).
pub struct OutboxProducerMediator {
    outbox: Arc<dyn Outbox>,
    #[cfg(feature = "async")]
    async_outbox: Option<Arc<dyn AsyncOutbox>>,
    producers: ProducerRegistry,
    limits: OutboxLimits,
    cache: Mutex<OutstandingCache>,
}

impl OutboxProducerMediator {
    pub fn new(outbox: Arc<dyn Outbox>, producers: ProducerRegistry) -> Self {
        Self {
            outbox,
            #[cfg(feature = "async")]
            async_outbox: None,
            producers,
            limits: OutboxLimits::default(),
            cache: Mutex::new(OutstandingCache::default()),
        }
    }

    /// Mediator over an in-memory outbox, for both sync and async paths.
    #[cfg(feature = "async")]
    pub fn in_memory(outbox: InMemoryOutbox, producers: ProducerRegistry) -> Self {
        let mut mediator = Self::new(Arc::new(outbox.clone()), producers);
        mediator.async_outbox = Some(Arc::new(outbox));
        mediator
    }

    #[cfg(feature = "async")]
    pub fn with_async_outbox(mut self, outbox: Arc<dyn AsyncOutbox>) -> Self {
        self.async_outbox = Some(outbox);
        self
    }

    pub fn with_limits(mut self, limits: OutboxLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn outbox(&self) -> &dyn Outbox {
        self.outbox.as_ref()
    }

    #[cfg(feature = "async")]
    pub fn async_outbox(&self) -> Option<&dyn AsyncOutbox> {
        self.async_outbox.as_deref()
    }

    pub fn producers(&self) -> &ProducerRegistry {
        &self.producers
    }

    /// Refresh the cached outstanding count if it is stale, then test it.
    fn check_limit(&self, fresh_count: impl FnOnce() -> Result<usize, OutboxError>) -> Result<(), OutboxError> {
        if !self.limits.is_enabled() {
            return Ok(());
        }
        let mut cache = self
            .cache
            .lock()
            .map_err(|_| OutboxError::LockPoisoned("outstanding cache"))?;
        let stale = cache
            .checked
            .map_or(true, |at| at.elapsed() >= self.limits.check_interval());
        if stale {
            cache.count = fresh_count()?;
            cache.checked = Some(Instant::now());
        }
        if cache.count >= self.limits.max_outstanding {
            warn!(
                outstanding = cache.count,
                max = self.limits.max_outstanding,
                "outbox limit reached"
            );
            return Err(OutboxError::LimitReached {
                outstanding: cache.count,
                max: self.limits.max_outstanding,
            });
        }
        Ok(())
    }

    /// Count a deposit that reached the outbox. Deposits later rolled back
    /// stay counted until the next refresh.
    fn note_deposit(&self) {
        if !self.limits.is_enabled() {
            return;
        }
        if let Ok(mut cache) = self.cache.lock() {
            cache.count += 1;
        }
    }

    pub fn deposit(&self, message: &Message, transaction: Option<&dyn Transaction>) -> Result<(), OutboxError> {
        self.check_limit(|| self.outbox.outstanding_count())?;
        self.outbox.add(message, transaction)?;
        self.note_deposit();
        debug!(message_id = %message.id(), topic = %message.topic(), "deposited in outbox");
        Ok(())
    }

    /// Send and mark each id, in order.
    pub fn clear(&self, ids: &[Uuid]) -> ClearReport {
        let mut report = ClearReport::default();
        for &id in ids {
            match self.outbox.get(id) {
                Ok(Some(entry)) if entry.is_dispatched() => report.skipped_dispatched += 1,
                Ok(Some(entry)) => self.dispatch(entry, &mut report),
                Ok(None) => {
                    debug!(message_id = %id, "nothing in outbox to clear");
                    report.skipped_missing += 1;
                }
                Err(err) => {
                    error!(message_id = %id, error = %err, "failed to read outbox");
                    report.failed += 1;
                }
            }
        }
        if report.sent > 0 {
            info!(sent = report.sent, "outbox cleared");
        }
        report
    }

    fn dispatch(&self, entry: OutboxEntry, report: &mut ClearReport) {
        let message = &entry.message;
        let sent = self
            .producers
            .lookup(message.topic())
            .map_err(|err| err.to_string())
            .and_then(|producer| producer.send(message).map_err(|err| err.to_string()));
        match sent {
            Ok(()) => self.mark(message.id(), report),
            Err(reason) => {
                warn!(message_id = %message.id(), topic = %message.topic(), error = %reason, "send failed, left in outbox");
                report.failed += 1;
            }
        }
    }

    fn mark(&self, id: Uuid, report: &mut ClearReport) {
        match self.outbox.mark_dispatched(id, Utc::now()) {
            Ok(true) => report.sent += 1,
            // Another clearer got there first; the transport has seen it twice.
            Ok(false) => report.skipped_dispatched += 1,
            Err(err) => {
                error!(message_id = %id, error = %err, "sent but could not mark dispatched");
                report.failed += 1;
            }
        }
    }

    #[cfg(feature = "async")]
    fn require_async(&self) -> Result<&dyn AsyncOutbox, OutboxError> {
        self.async_outbox.as_deref().ok_or_else(|| OutboxError::Storage {
            id: None,
            reason: "no async outbox configured".into(),
        })
    }

    #[cfg(feature = "async")]
    pub async fn deposit_async(&self, message: &Message, transaction: Option<&dyn Transaction>) -> Result<(), OutboxError> {
        let outbox = self.require_async()?;
        if self.limits.is_enabled() {
            let count = outbox.outstanding_count().await?;
            self.check_limit(|| Ok(count))?;
        }
        outbox.add(message, transaction).await?;
        self.note_deposit();
        debug!(message_id = %message.id(), topic = %message.topic(), "deposited in outbox");
        Ok(())
    }

    /// Async clear. Entries are loaded in order and consecutive entries for
    /// the same topic are sent as one batch; marking keeps the id order.
    #[cfg(feature = "async")]
    pub async fn clear_async(&self, ids: &[Uuid]) -> ClearReport {
        let mut report = ClearReport::default();
        let outbox = match self.require_async() {
            Ok(outbox) => outbox,
            Err(err) => {
                error!(error = %err, "cannot clear outbox");
                report.failed = ids.len();
                return report;
            }
        };

        let mut pending: Vec<Message> = Vec::new();
        for &id in ids {
            match outbox.get(id).await {
                Ok(Some(entry)) if entry.is_dispatched() => report.skipped_dispatched += 1,
                Ok(Some(entry)) => pending.push(entry.message),
                Ok(None) => report.skipped_missing += 1,
                Err(err) => {
                    error!(message_id = %id, error = %err, "failed to read outbox");
                    report.failed += 1;
                }
            }
        }

        let mut start = 0;
        while start < pending.len() {
            let topic = pending[start].topic().to_string();
            let end = pending[start..]
                .iter()
                .position(|m| m.topic() != topic)
                .map_or(pending.len(), |offset| start + offset);
            let batch = &pending[start..end];

            let sent = match self.producers.lookup_async(&topic) {
                Ok(producer) => {
                    let (sent, result) = producer.send_batch(batch).await;
                    if let Err(err) = result {
                        warn!(topic = %topic, error = %err, "batch send failed, rest left in outbox");
                    }
                    sent.min(batch.len())
                }
                Err(err) => {
                    warn!(topic = %topic, error = %err, "no producer, left in outbox");
                    0
                }
            };
            report.failed += batch.len() - sent;

            for message in &batch[..sent] {
                match outbox.mark_dispatched(message.id(), Utc::now()).await {
                    Ok(true) => report.sent += 1,
                    Ok(false) => report.skipped_dispatched += 1,
                    Err(err) => {
                        error!(message_id = %message.id(), error = %err, "sent but could not mark dispatched");
                        report.failed += 1;
                    }
                }
            }
            start = end;
        }
        report
    }
}
