use serde::Deserialize;
use std::time::Duration;

use crate::cache::token_cache::RefreshStrategy;
use crate::config::settings::SettingsConfig;
use crate::utils::constants::{
    DEFAULT_CACHE_KEY, DEFAULT_LOGIN_TIMEOUT_MS, DEFAULT_PARTNER_TIMEOUT_MS, DEFAULT_STORE_TIMEOUT_MS,
};

/// ================================
/// Full service configuration
/// ================================
#[derive(Debug, Deserialize, Clone)]
pub struct ServiceConfig {
    pub settings: SettingsConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    pub partner: PartnerConfig,
}

/// ================================
/// Partner token cache
/// ================================
#[derive(Debug, Deserialize, Clone)]
pub struct CacheConfig {
    #[serde(default = "default_cache_key")]
    pub key: String,
    #[serde(default)]
    pub strategy: RefreshStrategy,
    pub store_timeout_ms: Option<u64>,
    pub login_timeout_ms: Option<u64>,
    #[serde(default)]
    pub store: StoreConfig,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            key: default_cache_key(),
            strategy: RefreshStrategy::default(),
            store_timeout_ms: None,
            login_timeout_ms: None,
            store: StoreConfig::default(),
        }
    }
}

impl CacheConfig {
    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms.unwrap_or(DEFAULT_STORE_TIMEOUT_MS))
    }

    pub fn login_timeout(&self) -> Duration {
        Duration::from_millis(self.login_timeout_ms.unwrap_or(DEFAULT_LOGIN_TIMEOUT_MS))
    }
}

#[derive(Debug, Deserialize, Clone, Default, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StoreConfig {
    #[default]
    Memory,
    File { path: String },
    Redis { url: String },
}

/// ================================
/// Partner merchant API
/// ================================
#[derive(Debug, Deserialize, Clone)]
pub struct PartnerConfig {
    pub host: String,
    pub email: String,
    pub password: String,
    /// offset of the naive `expireAt` timestamps the partner returns
    #[serde(default)]
    pub utc_offset_minutes: i32,
    pub request_timeout_ms: Option<u64>,
}

impl PartnerConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms.unwrap_or(DEFAULT_PARTNER_TIMEOUT_MS))
    }
}

fn default_cache_key() -> String {
    DEFAULT_CACHE_KEY.to_string()
}
