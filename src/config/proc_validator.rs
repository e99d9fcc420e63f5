//! Configuration validation with aggregated errors.
//! Every problem is collected so a broken file is fixed in one pass.

use tracing::error;

use crate::config::settings::{RetryConfig, SettingsConfig};
use crate::config::types::{CacheConfig, PartnerConfig, ServiceConfig, StoreConfig};

const MAX_UTC_OFFSET_MINUTES: i32 = 14 * 60;

/// Public entrypoint: returns Ok(()) or Err(Vec<String>) containing all issues.
pub fn validate_service_config(cfg: &ServiceConfig) -> Result<(), Vec<String>> {
    let mut errors: Vec<String> = Vec::new();

    validate_settings(&cfg.settings, &mut errors);
    validate_cache(&cfg.cache, &mut errors);
    validate_partner(&cfg.partner, &mut errors);

    if errors.is_empty() {
        Ok(())
    } else {
        for e in &errors {
            error!("config: {}", e);
        }
        Err(errors)
    }
}

fn validate_settings(settings: &SettingsConfig, errors: &mut Vec<String>) {
    if settings.server.host.trim().is_empty() {
        errors.push("settings.server.host must not be empty".to_string());
    }
    if settings.server.port.parse::<u16>().is_err() {
        errors.push(format!("settings.server.port '{}' is not a valid port", settings.server.port));
    }
    if settings.metrics.is_enabled && !settings.metrics.path.starts_with('/') {
        errors.push(format!("settings.metrics.path '{}' must start with '/'", settings.metrics.path));
    }
    if let Some(logging) = &settings.logging {
        let level = logging.level.to_lowercase();
        if !["trace", "debug", "info", "warn", "error"].contains(&level.as_str()) {
            errors.push(format!("settings.logging.level '{}' is not one of trace|debug|info|warn|error", logging.level));
        }
    }
    if let Some(retry) = &settings.retry {
        validate_retry(retry, errors);
    }
}

fn validate_retry(retry: &RetryConfig, errors: &mut Vec<String>) {
    if retry.attempts == Some(0) {
        errors.push("settings.retry.attempts must be >= 1".to_string());
    }
    if let (Some(base), Some(max)) = (retry.base_delay_ms, retry.max_delay_ms) {
        if max < base {
            errors.push(format!("settings.retry.max_delay_ms ({}) must be >= base_delay_ms ({})", max, base));
        }
    }
}

fn validate_cache(cache: &CacheConfig, errors: &mut Vec<String>) {
    if cache.key.trim().is_empty() {
        errors.push("cache.key must not be empty".to_string());
    }
    if cache.store_timeout_ms == Some(0) {
        errors.push("cache.store_timeout_ms must be > 0".to_string());
    }
    if cache.login_timeout_ms == Some(0) {
        errors.push("cache.login_timeout_ms must be > 0".to_string());
    }
    if let StoreConfig::File { path } = &cache.store {
        if path.trim().is_empty() {
            errors.push("cache.store.path must not be empty for a file store".to_string());
        }
    }
    if let StoreConfig::Redis { url } = &cache.store {
        if !(url.starts_with("redis://") || url.starts_with("rediss://")) {
            errors.push("cache.store.url must be a redis:// or rediss:// URL".to_string());
        }
    }
}

fn validate_partner(partner: &PartnerConfig, errors: &mut Vec<String>) {
    if !(partner.host.starts_with("http://") || partner.host.starts_with("https://")) {
        errors.push(format!("partner.host '{}' must be an http(s) URL", partner.host));
    }
    if partner.email.trim().is_empty() {
        errors.push("partner.email must not be empty".to_string());
    }
    if partner.password.is_empty() {
        errors.push("partner.password must not be empty".to_string());
    }
    if partner.utc_offset_minutes.abs() > MAX_UTC_OFFSET_MINUTES {
        errors.push(format!("partner.utc_offset_minutes {} is out of range", partner.utc_offset_minutes));
    }
    if partner.request_timeout_ms == Some(0) {
        errors.push("partner.request_timeout_ms must be > 0".to_string());
    }
}
