use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};
use std::fmt;
use std::time::Duration;
use tracing::{debug, error};

use crate::cache::store::{Store, StoreError};

/// Redis-backed store shared by every gateway instance.
///
/// `ConnectionManager` is cheap to clone and reconnects on its own, so each
/// call works on a clone instead of locking a shared connection.
#[derive(Clone)]
pub struct RedisStore {
    connection: ConnectionManager,
}

impl RedisStore {
    pub async fn connect(redis_url: &str) -> Result<Self, StoreError> {
        // the url may carry a password; never log it
        let client = Client::open(redis_url).inspect_err(|e| error!("cannot open redis client: {}", e))?;
        let connection = ConnectionManager::new(client)
            .await
            .inspect_err(|e| error!("cannot connect to redis: {}", e))?;
        Ok(Self { connection })
    }
}

impl fmt::Debug for RedisStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisStore").finish_non_exhaustive()
    }
}

/// `PX` argument for `ttl`. `None` means the entry is already expired and
/// must not be written, since a key without `PX` would never expire.
pub fn px_millis(ttl: Duration) -> Option<u64> {
    if ttl.is_zero() {
        return None;
    }
    Some(u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1))
}

impl Store for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut conn = self.connection.clone();
        let value: Option<String> = conn.get(key).await?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), StoreError> {
        let mut conn = self.connection.clone();
        match px_millis(ttl) {
            Some(ms) => {
                let _: () = redis::cmd("SET").arg(key).arg(value).arg("PX").arg(ms).query_async(&mut conn).await?;
            }
            None => {
                debug!("redis store: '{}' written with zero ttl, removing it", key);
                let _: () = conn.del(key).await?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_ttl_is_never_written_as_persistent_key() {
        assert_eq!(px_millis(Duration::ZERO), None);
    }

    #[test]
    fn sub_millisecond_ttl_rounds_up_to_one() {
        assert_eq!(px_millis(Duration::from_micros(300)), Some(1));
        assert_eq!(px_millis(Duration::from_secs(300)), Some(300_000));
    }

    // runs only when REDIS_URL points at a live server
    #[tokio::test]
    async fn entries_expire_with_their_ttl() {
        let Ok(url) = std::env::var("REDIS_URL") else {
            eprintln!("REDIS_URL not set, skipping");
            return;
        };
        let store = RedisStore::connect(&url).await.unwrap();
        let key = format!("bullion-gateway-test-{}", crate::helpers::merge::unique_id(8));

        store.set(&key, "v1".into(), Duration::from_millis(300)).await.unwrap();
        assert_eq!(store.get(&key).await.unwrap().as_deref(), Some("v1"));

        store.set(&key, "v2".into(), Duration::ZERO).await.unwrap();
        assert_eq!(store.get(&key).await.unwrap(), None);

        store.set(&key, "v3".into(), Duration::from_millis(100)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(250)).await;
        assert_eq!(store.get(&key).await.unwrap(), None);
    }
}
