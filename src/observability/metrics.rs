use anyhow::Result;
use prometheus::{
    Gauge, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, IntGaugeVec, Opts, Registry,
};
use std::sync::Arc;
use tracing::info;

pub const RESULT_HIT: &str = "hit";
pub const RESULT_MISS: &str = "miss";
pub const RESULT_STORE_ERROR: &str = "store_error";
pub const OUTCOME_SUCCESS: &str = "success";
pub const OUTCOME_FAILURE: &str = "failure";

/// Prometheus instruments, built once by the composition root and handed
/// to whatever needs them.
#[derive(Clone)]
pub struct Metrics {
    pub registry: Registry,

    // Token cache metrics
    pub cache_lookups: IntCounterVec,
    pub token_refreshes: IntCounterVec,
    pub token_refresh_duration: Histogram,
    pub store_write_failures: IntCounter,
    pub clock_skew: IntCounter,
    pub token_expiry_unix: IntGaugeVec,

    // Partner API metrics
    pub partner_requests: IntCounterVec,

    // Config/runtime
    pub up: IntGauge,

    // === Service resource metrics ===
    pub process_cpu_usage: Gauge,
    pub process_memory_usage: IntGauge,
    pub process_open_fds: IntGauge,
    pub process_start_time: IntGauge,
    pub process_uptime: IntGauge,
}

impl Metrics {
    pub fn new() -> Result<Arc<Self>> {
        info!("Initializing Metrics ...");
        let registry = Registry::new_custom(Some("bullion_gateway".into()), None)?;

        let metrics = Arc::new(Self {
            // Cache
            cache_lookups: IntCounterVec::new(Opts::new("token_cache_lookups_total", "Token cache lookups by result"), &["result"])?,
            token_refreshes: IntCounterVec::new(Opts::new("token_refresh_total", "Partner logins by outcome"), &["outcome"])?,
            token_refresh_duration: Histogram::with_opts(HistogramOpts::new("token_refresh_duration_seconds", "Partner login duration seconds").buckets(vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]))?,
            store_write_failures: IntCounter::new("token_store_write_failures_total", "Failed writes of a fresh token to the store")?,
            clock_skew: IntCounter::new("token_clock_skew_total", "Logins that returned an already expired token")?,
            token_expiry_unix: IntGaugeVec::new(Opts::new("token_expiry_unix_seconds", "Expiry of the most recently issued token"), &["key"])?,

            // Partner
            partner_requests: IntCounterVec::new(Opts::new("partner_requests_total", "Partner merchant API calls"), &["endpoint", "outcome"])?,

            up: IntGauge::new("up", "1 if service is healthy")?,
            process_cpu_usage: Gauge::new("process_cpu_usage_percent", "CPU usage % of this process")?,
            process_memory_usage: IntGauge::new("process_memory_usage_bytes", "Resident memory used by this process")?,
            process_open_fds: IntGauge::new("process_open_fds", "Number of open file descriptors")?,
            process_start_time: IntGauge::new("process_start_time_seconds", "Process start time (UNIX seconds)")?,
            process_uptime: IntGauge::new("process_uptime_seconds", "Process uptime seconds")?,

            registry,
        });

        // Register all metrics in the registry
        let reg = &metrics.registry;
        reg.register(Box::new(metrics.cache_lookups.clone()))?;
        reg.register(Box::new(metrics.token_refreshes.clone()))?;
        reg.register(Box::new(metrics.token_refresh_duration.clone()))?;
        reg.register(Box::new(metrics.store_write_failures.clone()))?;
        reg.register(Box::new(metrics.clock_skew.clone()))?;
        reg.register(Box::new(metrics.token_expiry_unix.clone()))?;
        reg.register(Box::new(metrics.partner_requests.clone()))?;
        reg.register(Box::new(metrics.up.clone()))?;

        reg.register(Box::new(metrics.process_cpu_usage.clone()))?;
        reg.register(Box::new(metrics.process_memory_usage.clone()))?;
        reg.register(Box::new(metrics.process_open_fds.clone()))?;
        reg.register(Box::new(metrics.process_start_time.clone()))?;
        reg.register(Box::new(metrics.process_uptime.clone()))?;

        Ok(metrics)
    }
}
