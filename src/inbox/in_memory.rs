use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use uuid::Uuid;

#[cfg(feature = "async")]
use async_trait::async_trait;

use super::error::InboxError;
use super::inbox::Inbox;
#[cfg(feature = "async")]
use super::inbox::AsyncInbox;

/// Inbox kept in process memory. Clones share the same storage.
#[derive(Clone, Default)]
pub struct InMemoryInbox {
    entries: Arc<RwLock<HashMap<(Uuid, String), DateTime<Utc>>>>,
}

impl InMemoryInbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// When the marker was first recorded.
    pub fn recorded_at(&self, message_id: Uuid, context_key: &str) -> Option<DateTime<Utc>> {
        self.entries
            .read()
            .ok()?
            .get(&(message_id, context_key.to_string()))
            .copied()
    }
}

impl Inbox for InMemoryInbox {
    fn exists(&self, message_id: Uuid, context_key: &str) -> Result<bool, InboxError> {
        let entries = self
            .entries
            .read()
            .map_err(|_| InboxError::LockPoisoned("read"))?;
        Ok(entries.contains_key(&(message_id, context_key.to_string())))
    }

    fn add(&self, message_id: Uuid, context_key: &str) -> Result<(), InboxError> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| InboxError::LockPoisoned("write"))?;
        let key = (message_id, context_key.to_string());
        if entries.contains_key(&key) {
            return Err(InboxError::AlreadyExists {
                id: message_id,
                context_key: context_key.to_string(),
            });
        }
        entries.insert(key, Utc::now());
        Ok(())
    }
}

#[cfg(feature = "async")]
#[async_trait]
impl AsyncInbox for InMemoryInbox {
    async fn exists(&self, message_id: Uuid, context_key: &str) -> Result<bool, InboxError> {
        Inbox::exists(self, message_id, context_key)
    }

    async fn add(&self, message_id: Uuid, context_key: &str) -> Result<(), InboxError> {
        Inbox::add(self, message_id, context_key)
    }
}
