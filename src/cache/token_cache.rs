use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::time::{timeout, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::auth::{AuthClient, AuthError};
use crate::cache::store::{Store, StoreError};
use crate::cache::token::{CachedToken, TokenState};
use crate::config::types::CacheConfig;
use crate::observability::metrics::{
    Metrics, OUTCOME_FAILURE, OUTCOME_SUCCESS, RESULT_HIT, RESULT_MISS, RESULT_STORE_ERROR,
};
use crate::utils::constants::{DEFAULT_CACHE_KEY, DEFAULT_LOGIN_TIMEOUT_MS, DEFAULT_STORE_TIMEOUT_MS};

/// Errors surfaced by [`TokenCache`]. Store failures never show up here.
#[derive(Debug, Error)]
pub enum TokenError {
    #[error("authentication failed: {0}")]
    AuthenticationFailed(#[source] AuthError),

    #[error("token request cancelled")]
    Cancelled,
}

/// How concurrent misses are handled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RefreshStrategy {
    /// Every caller that misses logs in; the store's last write wins.
    #[default]
    Optimistic,
    /// An in-process mutex collapses concurrent misses into one login.
    Coalesced,
}

#[derive(Debug, Clone)]
pub struct CacheSettings {
    pub key: String,
    pub strategy: RefreshStrategy,
    pub store_timeout: Duration,
    pub login_timeout: Duration,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            key: DEFAULT_CACHE_KEY.to_owned(),
            strategy: RefreshStrategy::default(),
            store_timeout: Duration::from_millis(DEFAULT_STORE_TIMEOUT_MS),
            login_timeout: Duration::from_millis(DEFAULT_LOGIN_TIMEOUT_MS),
        }
    }
}

impl From<&CacheConfig> for CacheSettings {
    fn from(cfg: &CacheConfig) -> Self {
        Self {
            key: cfg.key.to_owned(),
            strategy: cfg.strategy,
            store_timeout: cfg.store_timeout(),
            login_timeout: cfg.login_timeout(),
        }
    }
}

/// Snapshot of the cache key, for status endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenStatus {
    pub key: String,
    pub state: TokenState,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Lazily refreshed partner token backed by a shared [`Store`].
///
/// The cache keeps no token of its own in the optimistic strategy: the
/// store is the only shared state, so one instance can serve every request
/// handler and several processes can share one store. The coalesced
/// strategy additionally serializes refreshes behind `refresh_lock` and
/// remembers the token it last obtained in `last_issued`, which is only
/// ever locked briefly and never across an await.
pub struct TokenCache<A, S> {
    auth: A,
    store: S,
    settings: CacheSettings,
    refresh_lock: Mutex<()>,
    last_issued: RwLock<Option<CachedToken>>,
    metrics: Option<Arc<Metrics>>,
}

impl<A: AuthClient, S: Store> TokenCache<A, S> {
    pub fn new(auth: A, store: S, settings: CacheSettings) -> Self {
        Self {
            auth,
            store,
            settings,
            refresh_lock: Mutex::new(()),
            last_issued: RwLock::new(None),
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn settings(&self) -> &CacheSettings {
        &self.settings
    }

    pub fn auth(&self) -> &A {
        &self.auth
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Returns a token that is valid now, logging in only when the store
    /// holds no usable entry.
    pub async fn get_valid_token(&self) -> Result<String, TokenError> {
        self.get_valid_token_with_cancel(&CancellationToken::new()).await
    }

    /// Like [`get_valid_token`](Self::get_valid_token) but gives up with
    /// [`TokenError::Cancelled`] once `deadline` has elapsed.
    pub async fn get_valid_token_with_timeout(&self, deadline: Duration) -> Result<String, TokenError> {
        match timeout(deadline, self.get_valid_token()).await {
            Ok(result) => result,
            Err(_) => {
                warn!("token request for '{}' abandoned after {:?}", self.settings.key, deadline);
                Err(TokenError::Cancelled)
            }
        }
    }

    /// Aborts with [`TokenError::Cancelled`] as soon as `cancel` fires.
    /// A cancelled call never writes to the store.
    pub async fn get_valid_token_with_cancel(&self, cancel: &CancellationToken) -> Result<String, TokenError> {
        if let Some(token) = cancellable(cancel, self.read_cached()).await? {
            return Ok(token.value);
        }
        match self.settings.strategy {
            RefreshStrategy::Optimistic => self.refresh(cancel).await.map(|token| token.value),
            RefreshStrategy::Coalesced => self.refresh_coalesced(cancel).await,
        }
    }

    /// Reports the lifecycle state of the cache key without refreshing.
    pub async fn state(&self) -> Result<TokenStatus, StoreError> {
        let key = self.settings.key.to_owned();
        let now = Utc::now();
        let stored = match timeout(self.settings.store_timeout, self.store.get(&key)).await {
            Ok(raw) => raw?.map(|raw| CachedToken::decode(&raw)).transpose()?,
            Err(_) => return Err(StoreError::TimedOut(self.settings.store_timeout)),
        };
        let token = match stored {
            Some(token) => Some(token),
            None => self.last_issued(),
        };

        Ok(match token {
            Some(token) => TokenStatus { key, state: token.state_at(now), expires_at: Some(token.expires_at) },
            None => TokenStatus { key, state: TokenState::Absent, expires_at: None },
        })
    }

    async fn refresh_coalesced(&self, cancel: &CancellationToken) -> Result<String, TokenError> {
        let _refreshing = cancellable(cancel, self.refresh_lock.lock()).await?;

        if let Some(token) = self.last_issued().filter(|t| t.is_usable_at(Utc::now())) {
            debug!("token '{}' refreshed by a concurrent caller", self.settings.key);
            return Ok(token.value);
        }
        if let Some(token) = cancellable(cancel, self.read_cached()).await? {
            self.remember(&token);
            return Ok(token.value);
        }

        let token = self.refresh(cancel).await?;
        self.remember(&token);
        Ok(token.value)
    }

    fn last_issued(&self) -> Option<CachedToken> {
        let guard = self.last_issued.read().unwrap_or_else(PoisonError::into_inner);
        (*guard).clone()
    }

    fn remember(&self, token: &CachedToken) {
        let mut guard = self.last_issued.write().unwrap_or_else(PoisonError::into_inner);
        *guard = Some(token.clone());
    }

    /// Reads the store; every failure mode is a miss.
    async fn read_cached(&self) -> Option<CachedToken> {
        let key = self.settings.key.as_str();
        let raw = match timeout(self.settings.store_timeout, self.store.get(key)).await {
            Ok(Ok(raw)) => raw,
            Ok(Err(err)) => {
                warn!("token store read for '{}' failed, forcing refresh: {}", key, err);
                self.count_lookup(RESULT_STORE_ERROR);
                return None;
            }
            Err(_) => {
                warn!("token store read for '{}' timed out after {:?}, forcing refresh", key, self.settings.store_timeout);
                self.count_lookup(RESULT_STORE_ERROR);
                return None;
            }
        };

        let Some(raw) = raw else {
            debug!("token '{}' absent", key);
            self.count_lookup(RESULT_MISS);
            return None;
        };

        match CachedToken::decode(&raw) {
            Ok(token) if token.is_usable_at(Utc::now()) => {
                debug!("token '{}' valid until {}", key, token.expires_at);
                self.count_lookup(RESULT_HIT);
                Some(token)
            }
            Ok(token) => {
                debug!("token '{}' expired at {}", key, token.expires_at);
                self.count_lookup(RESULT_MISS);
                None
            }
            Err(err) => {
                warn!("token store entry for '{}' is undecodable, forcing refresh: {}", key, err);
                self.count_lookup(RESULT_STORE_ERROR);
                None
            }
        }
    }

    async fn refresh(&self, cancel: &CancellationToken) -> Result<CachedToken, TokenError> {
        let key = self.settings.key.as_str();
        let login_timeout = self.settings.login_timeout;
        let start = Instant::now();
        info!("refreshing token '{}'", key);

        let issued = match cancellable(cancel, timeout(login_timeout, self.auth.login())).await? {
            Ok(Ok(issued)) => issued,
            Ok(Err(err)) => {
                error!("login for token '{}' failed: {}", key, err);
                self.record_refresh(OUTCOME_FAILURE, start);
                return Err(TokenError::AuthenticationFailed(err));
            }
            Err(_) => {
                error!("login for token '{}' timed out after {:?}", key, login_timeout);
                self.record_refresh(OUTCOME_FAILURE, start);
                return Err(TokenError::AuthenticationFailed(AuthError::TimedOut(login_timeout)));
            }
        };
        self.record_refresh(OUTCOME_SUCCESS, start);

        let token = CachedToken::new(issued.value, issued.expires_at);
        let now = Utc::now();
        if !token.is_usable_at(now) {
            warn!(
                "login for token '{}' returned expiry {} which is not after local time {}; clock skew with partner?",
                key, token.expires_at, now
            );
            if let Some(metrics) = &self.metrics {
                metrics.clock_skew.inc();
            }
        }
        if let Some(metrics) = &self.metrics {
            metrics.token_expiry_unix.with_label_values(&[key]).set(token.expires_at.timestamp());
        }

        self.persist(&token, token.ttl_at(now), cancel).await?;
        info!("token '{}' refreshed, valid until {}", key, token.expires_at);
        Ok(token)
    }

    /// Write failures are logged only; the caller still gets the token.
    async fn persist(&self, token: &CachedToken, ttl: Duration, cancel: &CancellationToken) -> Result<(), TokenError> {
        let key = self.settings.key.as_str();
        let raw = match token.encode() {
            Ok(raw) => raw,
            Err(err) => {
                self.count_store_write_failure(key, &StoreError::Encoding(err));
                return Ok(());
            }
        };

        match cancellable(cancel, timeout(self.settings.store_timeout, self.store.set(key, raw, ttl))).await? {
            Ok(Ok(())) => debug!("token '{}' stored with ttl {:?}", key, ttl),
            Ok(Err(err)) => self.count_store_write_failure(key, &err),
            Err(_) => self.count_store_write_failure(key, &StoreError::TimedOut(self.settings.store_timeout)),
        }
        Ok(())
    }

    fn count_store_write_failure(&self, key: &str, err: &StoreError) {
        warn!("could not store refreshed token '{}', next caller will log in again: {}", key, err);
        if let Some(metrics) = &self.metrics {
            metrics.store_write_failures.inc();
        }
    }

    fn count_lookup(&self, result: &str) {
        if let Some(metrics) = &self.metrics {
            metrics.cache_lookups.with_label_values(&[result]).inc();
        }
    }

    fn record_refresh(&self, outcome: &str, start: Instant) {
        if let Some(metrics) = &self.metrics {
            metrics.token_refreshes.with_label_values(&[outcome]).inc();
            metrics.token_refresh_duration.observe(start.elapsed().as_secs_f64());
        }
    }
}

async fn cancellable<F: Future>(cancel: &CancellationToken, fut: F) -> Result<F::Output, TokenError> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(TokenError::Cancelled),
        out = fut => Ok(out),
    }
}
