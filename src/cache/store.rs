use std::future::Future;
use std::time::Duration;

use thiserror::Error;

use crate::cache::file_store::FileStore;
use crate::cache::memory_store::MemoryStore;
use crate::cache::redis_store::RedisStore;

/// Failures of the key-value backend. The token cache absorbs all of them.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("store io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("store entry encoding error: {0}")]
    Encoding(#[from] serde_json::Error),

    #[error("store call timed out after {0:?}")]
    TimedOut(Duration),
}

/// Key-value backend shared by every holder of the cache key.
///
/// Implementations must be safe for concurrent use. A `ttl` of zero means
/// the entry expires immediately, never that it lives forever.
pub trait Store: Send + Sync {
    /// `Ok(None)` when the key is missing or its TTL has elapsed.
    fn get(&self, key: &str) -> impl Future<Output = Result<Option<String>, StoreError>> + Send;

    fn set(
        &self,
        key: &str,
        value: String,
        ttl: Duration,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;
}

/// Backends selectable from configuration.
#[derive(Debug, Clone)]
pub enum StoreKind {
    Memory(MemoryStore),
    File(FileStore),
    Redis(RedisStore),
}

impl Store for StoreKind {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        match self {
            StoreKind::Memory(s) => s.get(key).await,
            StoreKind::File(s) => s.get(key).await,
            StoreKind::Redis(s) => s.get(key).await,
        }
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), StoreError> {
        match self {
            StoreKind::Memory(s) => s.set(key, value, ttl).await,
            StoreKind::File(s) => s.set(key, value, ttl).await,
            StoreKind::Redis(s) => s.set(key, value, ttl).await,
        }
    }
}
