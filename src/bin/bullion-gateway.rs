use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use bullion_gateway::auth::partner::PartnerAuthClient;
use bullion_gateway::cache::file_store::FileStore;
use bullion_gateway::cache::memory_store::MemoryStore;
use bullion_gateway::cache::redis_store::RedisStore;
use bullion_gateway::cache::store::StoreKind;
use bullion_gateway::cache::token_cache::{CacheSettings, TokenCache};
use bullion_gateway::config::types::StoreConfig;
use bullion_gateway::observability::metrics::Metrics;
use bullion_gateway::observability::service_resources_metrics::collect_process_metrics;
use bullion_gateway::server::server::{self, AppState};
use bullion_gateway::utils::config_loader;
use bullion_gateway::utils::constants::MEMORY_STORE_PURGE_INTERVAL_SECS;
use bullion_gateway::utils::logging::{self, LogLevel};
use clap::Parser;
use tracing::{debug, error, info};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long, env = "CONFIG", default_value = "bullion-gateway.yaml")]
    config: String,
    #[arg(long, env = "LOG_LEVEL", value_enum)]
    log_level: Option<LogLevel>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // -------------------------------
    // 1. Load YAML config, start logging
    // -------------------------------

    let args = Args::parse();
    let service_config = config_loader::run(&args.config)?;
    logging::run(&service_config, args.log_level);

    // -------------------------------
    // 2. Build collaborators
    // -------------------------------

    let metrics = Metrics::new()?;
    let store = match &service_config.cache.store {
        StoreConfig::Memory => {
            let memory = MemoryStore::new();
            let sweeper = memory.clone();
            tokio::spawn(async move {
                let mut ticker = tokio::time::interval(Duration::from_secs(MEMORY_STORE_PURGE_INTERVAL_SECS));
                loop {
                    ticker.tick().await;
                    let purged = sweeper.purge_expired().await;
                    if purged > 0 {
                        debug!("purged {} expired token store entries", purged);
                    }
                }
            });
            StoreKind::Memory(memory)
        }
        StoreConfig::File { path } => StoreKind::File(FileStore::new(path)),
        StoreConfig::Redis { url } => StoreKind::Redis(RedisStore::connect(url).await?),
    };
    info!("token store: {}", store_name(&service_config.cache.store));
    let auth = PartnerAuthClient::new(&service_config.partner)?;

    // -------------------------------
    // 3. Token cache shared by every handler
    // -------------------------------

    let settings = CacheSettings::from(&service_config.cache);
    info!("token cache key '{}', strategy {:?}", settings.key, settings.strategy);
    let tokens = Arc::new(TokenCache::new(auth, store, settings).with_metrics(metrics.clone()));

    // -------------------------------
    // 4. Process metrics
    // -------------------------------

    let process_metrics = collect_process_metrics(metrics.clone(), service_config.settings.metrics.is_enabled);
    tokio::spawn(async move {
        if let Err(err) = process_metrics.await {
            error!("process metrics collection stopped: {}", err);
        }
    });

    // -------------------------------
    // 5. Serve http until shutdown signal
    // -------------------------------

    info!("Service starting...");
    server::start(&service_config.settings, AppState::new(tokens, metrics)).await?;
    info!("Service stopped");
    Ok(())
}

fn store_name(store: &StoreConfig) -> &'static str {
    match store {
        StoreConfig::Memory => "memory",
        StoreConfig::File { .. } => "file",
        StoreConfig::Redis { .. } => "redis",
    }
}
