use std::any::Any;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::debug;
use uuid::Uuid;

#[cfg(feature = "async")]
use async_trait::async_trait;

use super::error::OutboxError;
use super::outbox::{Outbox, OutboxEntry, Transaction};
#[cfg(feature = "async")]
use super::outbox::AsyncOutbox;
use crate::message::Message;

#[derive(Default)]
struct Store {
    entries: Vec<OutboxEntry>,
    index: HashMap<Uuid, usize>,
}

impl Store {
    fn insert(&mut self, entry: OutboxEntry) {
        let id = entry.id();
        if self.index.contains_key(&id) {
            debug!(message_id = %id, "outbox already holds message, keeping first copy");
            return;
        }
        self.index.insert(id, self.entries.len());
        self.entries.push(entry);
    }

    fn get(&self, id: Uuid) -> Option<&OutboxEntry> {
        self.index.get(&id).map(|&i| &self.entries[i])
    }
}

/// Outbox kept in process memory. Clones share the same storage.
///
/// Writes made through an [`InMemoryTransaction`] only become visible on
/// commit.
#[derive(Clone, Default)]
pub struct InMemoryOutbox {
    store: Arc<RwLock<Store>>,
}

impl InMemoryOutbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin(&self) -> InMemoryTransaction {
        InMemoryTransaction {
            store: Arc::clone(&self.store),
            pending: Mutex::new(Some(Vec::new())),
        }
    }

    pub fn len(&self) -> usize {
        self.store.read().map(|s| s.entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn entries(&self) -> Result<Vec<OutboxEntry>, OutboxError> {
        let store = self
            .store
            .read()
            .map_err(|_| OutboxError::LockPoisoned("read"))?;
        Ok(store.entries.clone())
    }

    fn stage_or_insert(&self, entry: OutboxEntry, transaction: Option<&dyn Transaction>) -> Result<(), OutboxError> {
        match transaction {
            Some(transaction) => {
                let transaction = transaction
                    .as_any()
                    .downcast_ref::<InMemoryTransaction>()
                    .filter(|tx| Arc::ptr_eq(&tx.store, &self.store))
                    .ok_or(OutboxError::ForeignTransaction)?;
                transaction.stage(entry)
            }
            None => {
                let mut store = self
                    .store
                    .write()
                    .map_err(|_| OutboxError::LockPoisoned("write"))?;
                store.insert(entry);
                Ok(())
            }
        }
    }
}

/// Buffered unit of work against an [`InMemoryOutbox`].
///
/// Dropping an uncommitted transaction discards its writes.
pub struct InMemoryTransaction {
    store: Arc<RwLock<Store>>,
    pending: Mutex<Option<Vec<OutboxEntry>>>,
}

impl InMemoryTransaction {
    fn stage(&self, entry: OutboxEntry) -> Result<(), OutboxError> {
        let mut pending = self
            .pending
            .lock()
            .map_err(|_| OutboxError::LockPoisoned("transaction"))?;
        pending
            .as_mut()
            .ok_or(OutboxError::TransactionClosed)?
            .push(entry);
        Ok(())
    }

    /// Number of writes waiting for commit.
    pub fn pending(&self) -> usize {
        self.pending
            .lock()
            .ok()
            .and_then(|p| p.as_ref().map(Vec::len))
            .unwrap_or(0)
    }

    pub fn commit(self) -> Result<(), OutboxError> {
        let staged = self
            .pending
            .lock()
            .map_err(|_| OutboxError::LockPoisoned("transaction"))?
            .take()
            .ok_or(OutboxError::TransactionClosed)?;
        let mut store = self
            .store
            .write()
            .map_err(|_| OutboxError::LockPoisoned("commit"))?;
        for entry in staged {
            store.insert(entry);
        }
        Ok(())
    }

    pub fn rollback(self) {
        if let Ok(mut pending) = self.pending.lock() {
            pending.take();
        }
    }
}

impl Transaction for InMemoryTransaction {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Drop for InMemoryTransaction {
    fn drop(&mut self) {
        let discarded = self.pending();
        if discarded > 0 {
            debug!(discarded, "outbox transaction dropped without commit");
        }
    }
}

fn outstanding(store: &Store, older_than: Duration, page_size: usize) -> Vec<OutboxEntry> {
    let now = Utc::now();
    store
        .entries
        .iter()
        .filter(|entry| !entry.is_dispatched() && entry.age(now) >= older_than)
        .take(page_size)
        .cloned()
        .collect()
}

fn mark(store: &mut Store, id: Uuid, at: DateTime<Utc>) -> bool {
    let Some(&index) = store.index.get(&id) else {
        return false;
    };
    let entry = &mut store.entries[index];
    if entry.dispatched_at.is_some() {
        return false;
    }
    entry.dispatched_at = Some(at);
    true
}

impl Outbox for InMemoryOutbox {
    fn add(&self, message: &Message, transaction: Option<&dyn Transaction>) -> Result<(), OutboxError> {
        self.stage_or_insert(OutboxEntry::new(message.clone()), transaction)
    }

    fn get(&self, id: Uuid) -> Result<Option<OutboxEntry>, OutboxError> {
        let store = self
            .store
            .read()
            .map_err(|_| OutboxError::LockPoisoned("read"))?;
        Ok(store.get(id).cloned())
    }

    fn get_page(&self, page_size: usize, page_number: usize) -> Result<Vec<OutboxEntry>, OutboxError> {
        let store = self
            .store
            .read()
            .map_err(|_| OutboxError::LockPoisoned("read"))?;
        let skip = page_number.saturating_sub(1).saturating_mul(page_size);
        Ok(store.entries.iter().skip(skip).take(page_size).cloned().collect())
    }

    fn mark_dispatched(&self, id: Uuid, at: DateTime<Utc>) -> Result<bool, OutboxError> {
        let mut store = self
            .store
            .write()
            .map_err(|_| OutboxError::LockPoisoned("mark dispatched"))?;
        Ok(mark(&mut store, id, at))
    }

    fn outstanding_messages(&self, older_than: Duration, page_size: usize) -> Result<Vec<OutboxEntry>, OutboxError> {
        let store = self
            .store
            .read()
            .map_err(|_| OutboxError::LockPoisoned("read"))?;
        Ok(outstanding(&store, older_than, page_size))
    }

    fn dispatched_messages(&self, since: Duration, page_size: usize) -> Result<Vec<OutboxEntry>, OutboxError> {
        let store = self
            .store
            .read()
            .map_err(|_| OutboxError::LockPoisoned("read"))?;
        let now = Utc::now();
        let mut dispatched: Vec<OutboxEntry> = store
            .entries
            .iter()
            .filter(|entry| {
                entry
                    .dispatched_at
                    .is_some_and(|at| (now - at).to_std().unwrap_or(Duration::ZERO) >= since)
            })
            .cloned()
            .collect();
        dispatched.sort_by_key(|entry| entry.dispatched_at);
        dispatched.truncate(page_size);
        Ok(dispatched)
    }

    fn outstanding_count(&self) -> Result<usize, OutboxError> {
        let store = self
            .store
            .read()
            .map_err(|_| OutboxError::LockPoisoned("read"))?;
        Ok(store.entries.iter().filter(|e| !e.is_dispatched()).count())
    }
}

#[cfg(feature = "async")]
#[async_trait]
impl AsyncOutbox for InMemoryOutbox {
    async fn add(&self, message: &Message, transaction: Option<&dyn Transaction>) -> Result<(), OutboxError> {
        Outbox::add(self, message, transaction)
    }

    async fn get(&self, id: Uuid) -> Result<Option<OutboxEntry>, OutboxError> {
        Outbox::get(self, id)
    }

    async fn mark_dispatched(&self, id: Uuid, at: DateTime<Utc>) -> Result<bool, OutboxError> {
        Outbox::mark_dispatched(self, id, at)
    }

    async fn outstanding_messages(&self, older_than: Duration, page_size: usize) -> Result<Vec<OutboxEntry>, OutboxError> {
        Outbox::outstanding_messages(self, older_than, page_size)
    }

    async fn outstanding_count(&self) -> Result<usize, OutboxError> {
        Outbox::outstanding_count(self)
    }
}
