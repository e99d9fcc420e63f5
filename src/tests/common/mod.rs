// tests/common/mod.rs
pub use axum::Router;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::task::JoinHandle;

use crate::auth::{AuthClient, AuthError, IssuedToken};
use crate::cache::memory_store::MemoryStore;
use crate::cache::store::{Store, StoreError};
use crate::cache::token::CachedToken;
use crate::cache::token_cache::{CacheSettings, RefreshStrategy, TokenCache};

pub const KEY: &str = "partner-token";

/// Spawn an Axum router on an ephemeral port and return (JoinHandle, SocketAddr)
pub async fn spawn_axum(router: Router) -> (JoinHandle<()>, SocketAddr) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind failed");
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        axum::serve(listener, router).await.expect("server failed");
    });
    (handle, addr)
}

#[derive(Debug, Clone)]
pub enum Outcome {
    ValidFor(ChronoDuration),
    ExpiresAt(DateTime<Utc>),
    Reject,
}

/// Login stub issuing `token-<n>` for the n-th call.
#[derive(Debug)]
pub struct FakeAuth {
    calls: AtomicUsize,
    outcome: Outcome,
    delay: Duration,
}

impl FakeAuth {
    pub fn valid_for_secs(secs: i64) -> Self {
        Self::with_outcome(Outcome::ValidFor(ChronoDuration::seconds(secs)))
    }

    pub fn expiring_at(at: DateTime<Utc>) -> Self {
        Self::with_outcome(Outcome::ExpiresAt(at))
    }

    pub fn rejecting() -> Self {
        Self::with_outcome(Outcome::Reject)
    }

    fn with_outcome(outcome: Outcome) -> Self {
        Self { calls: AtomicUsize::new(0), outcome, delay: Duration::ZERO }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl AuthClient for FakeAuth {
    async fn login(&self) -> Result<IssuedToken, AuthError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        match &self.outcome {
            Outcome::ValidFor(ttl) => Ok(IssuedToken::new(format!("token-{n}"), Utc::now() + *ttl)),
            Outcome::ExpiresAt(at) => Ok(IssuedToken::new(format!("token-{n}"), *at)),
            Outcome::Reject => Err(AuthError::Rejected {
                status_code: 401,
                message: "invalid merchant credentials".into(),
            }),
        }
    }
}

/// MemoryStore wrapper that records writes and can be told to fail.
#[derive(Debug, Default)]
pub struct RecordingStore {
    pub inner: MemoryStore,
    pub fail_reads: AtomicBool,
    pub fail_writes: AtomicBool,
    pub read_delay: Mutex<Option<Duration>>,
    pub write_delay: Mutex<Option<Duration>>,
    gets: AtomicUsize,
    set_attempts: AtomicUsize,
    sets: Mutex<Vec<(String, String, Duration)>>,
}

impl RecordingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_reads(self) -> Self {
        self.fail_reads.store(true, Ordering::SeqCst);
        self
    }

    pub fn failing_writes(self) -> Self {
        self.fail_writes.store(true, Ordering::SeqCst);
        self
    }

    pub fn slow_reads(self, delay: Duration) -> Self {
        *self.read_delay.lock().unwrap() = Some(delay);
        self
    }

    pub fn slow_writes(self, delay: Duration) -> Self {
        *self.write_delay.lock().unwrap() = Some(delay);
        self
    }

    pub fn gets(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }

    pub fn set_attempts(&self) -> usize {
        self.set_attempts.load(Ordering::SeqCst)
    }

    /// Successful writes as (key, raw value, ttl).
    pub fn sets(&self) -> Vec<(String, String, Duration)> {
        self.sets.lock().unwrap().clone()
    }

    /// Puts an entry in place without recording it as a write.
    pub async fn seed(&self, value: &str, expires_at: DateTime<Utc>) {
        let raw = CachedToken::new(value.to_owned(), expires_at).encode().unwrap();
        self.inner.set(KEY, raw, Duration::from_secs(3600)).await.unwrap();
    }

    pub async fn seed_raw(&self, raw: &str) {
        self.inner.set(KEY, raw.to_owned(), Duration::from_secs(3600)).await.unwrap();
    }

    pub async fn cached(&self) -> Option<CachedToken> {
        self.inner
            .get(KEY)
            .await
            .unwrap()
            .map(|raw| CachedToken::decode(&raw).unwrap())
    }
}

impl Store for RecordingStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("connection refused".into()));
        }
        let delay = *self.read_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), StoreError> {
        self.set_attempts.fetch_add(1, Ordering::SeqCst);
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("connection refused".into()));
        }
        let delay = *self.write_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.sets.lock().unwrap().push((key.to_owned(), value.clone(), ttl));
        self.inner.set(key, value, ttl).await
    }
}

pub fn settings(strategy: RefreshStrategy) -> CacheSettings {
    CacheSettings {
        key: KEY.to_owned(),
        strategy,
        store_timeout: Duration::from_millis(200),
        login_timeout: Duration::from_secs(2),
    }
}

pub fn build_cache(
    auth: FakeAuth,
    store: RecordingStore,
    strategy: RefreshStrategy,
) -> TokenCache<FakeAuth, RecordingStore> {
    TokenCache::new(auth, store, settings(strategy))
}
