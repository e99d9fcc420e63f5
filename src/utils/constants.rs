//! Shared constants and invariants

pub const DEFAULT_CACHE_KEY: &str = "partner-token";
pub const DEFAULT_STORE_TIMEOUT_MS: u64 = 2000;
pub const DEFAULT_LOGIN_TIMEOUT_MS: u64 = 10000;
pub const DEFAULT_PARTNER_TIMEOUT_MS: u64 = 10000;

pub const DEFAULT_RETRY_ATTEMPTS: u32 = 3;
pub const DEFAULT_RETRY_BASE_DELAY_MS: u64 = 200;
pub const DEFAULT_RETRY_MAX_DELAY_MS: u64 = 1000;

// Partner merchant API paths
pub const PARTNER_LOGIN_PATH: &str = "/merchant/v1/auth/login";

pub const MEMORY_STORE_PURGE_INTERVAL_SECS: u64 = 60;
