use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::cache::store::{Store, StoreError};

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    deadline: DateTime<Utc>,
}

/// Process-local store: key -> (value, deadline)
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<HashMap<String, Entry>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop entries whose deadline has passed.
    pub async fn purge_expired(&self) -> usize {
        let now = Utc::now();
        let mut map = self.inner.write().await;
        let before = map.len();
        map.retain(|_, entry| now < entry.deadline);
        before - map.len()
    }
}

impl Store for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let map = self.inner.read().await;
        Ok(map
            .get(key)
            .filter(|entry| Utc::now() < entry.deadline)
            .map(|entry| entry.value.clone()))
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), StoreError> {
        let ttl = chrono::Duration::from_std(ttl)
            .map_err(|e| StoreError::Unavailable(format!("ttl out of range: {}", e)))?;
        let entry = Entry {
            value,
            deadline: Utc::now() + ttl,
        };
        self.inner.write().await.insert(key.to_owned(), entry);
        Ok(())
    }
}
