use anyhow::{Context, Result};
use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use http::StatusCode;
use serde_json::json;
use std::sync::Arc;
use tokio::select;
use tokio::signal::unix::{signal, SignalKind};
use tracing::{info, warn};

use crate::auth::AuthClient;
use crate::cache::store::Store;
use crate::cache::token_cache::{TokenCache, TokenError};
use crate::config::settings::SettingsConfig;
use crate::observability::metrics::Metrics;
use crate::observability::routes::get_metrics;

/// Shared handles for every request handler, wired by the binary.
pub struct AppState<A, S> {
    pub tokens: Arc<TokenCache<A, S>>,
    pub metrics: Arc<Metrics>,
}

impl<A, S> Clone for AppState<A, S> {
    fn clone(&self) -> Self {
        Self { tokens: self.tokens.clone(), metrics: self.metrics.clone() }
    }
}

impl<A, S> AppState<A, S> {
    pub fn new(tokens: Arc<TokenCache<A, S>>, metrics: Arc<Metrics>) -> Self {
        Self { tokens, metrics }
    }
}

/// Partner login trouble is a backend-to-backend problem, never the
/// client's fault.
pub fn token_error_status(err: &TokenError) -> StatusCode {
    match err {
        TokenError::AuthenticationFailed(_) => StatusCode::BAD_GATEWAY,
        TokenError::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
    }
}

pub fn router<A, S>(settings_config: &SettingsConfig, state: AppState<A, S>) -> Router
where
    A: AuthClient + 'static,
    S: Store + 'static,
{
    let mut router = Router::new()
        .route("/health", get(health))
        .route("/ready", get(ready::<A, S>))
        .route("/token/status", get(token_status::<A, S>));

    if settings_config.metrics.is_enabled {
        info!("served path: {}", settings_config.metrics.path);
        router = router.route(settings_config.metrics.path.as_str(), get(get_metrics::<A, S>));
    }
    router.with_state(state)
}

/// Serve until SIGINT or SIGTERM.
pub async fn start<A, S>(settings_config: &SettingsConfig, state: AppState<A, S>) -> Result<()>
where
    A: AuthClient + 'static,
    S: Store + 'static,
{
    let metrics = state.metrics.clone();
    let app = router(settings_config, state);

    let bind_addr = format!("{}:{}", settings_config.server.host, settings_config.server.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("cannot bind {}", bind_addr))?;
    info!("listening on {}", bind_addr);

    metrics.up.set(1);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("http server failed")?;
    metrics.up.set(0);
    Ok(())
}

async fn shutdown_signal() {
    let (Ok(mut sigint), Ok(mut sigterm)) = (signal(SignalKind::interrupt()), signal(SignalKind::terminate())) else {
        warn!("cannot install signal handlers, serving until killed");
        return std::future::pending().await;
    };
    select! {
        _ = sigint.recv() => info!("Received SIGINT (Ctrl+C). Initiating graceful shutdown..."),
        _ = sigterm.recv() => info!("Received SIGTERM. Initiating graceful shutdown..."),
    }
}

async fn health() -> Response {
    (StatusCode::OK, Json(json!({"status": "ok"}))).into_response()
}

async fn ready<A, S>(State(state): State<AppState<A, S>>) -> Response
where
    A: AuthClient + 'static,
    S: Store + 'static,
{
    match state.tokens.get_valid_token().await {
        Ok(_) => (StatusCode::OK, Json(json!({"status": "ready"}))).into_response(),
        Err(err) => {
            warn!("readiness check failed: {}", err);
            (token_error_status(&err), Json(json!({"status": "unavailable", "error": err.to_string()}))).into_response()
        }
    }
}

async fn token_status<A, S>(State(state): State<AppState<A, S>>) -> Response
where
    A: AuthClient + 'static,
    S: Store + 'static,
{
    match state.tokens.state().await {
        Ok(status) => (StatusCode::OK, Json(status)).into_response(),
        Err(err) => {
            warn!("token status unavailable: {}", err);
            (StatusCode::SERVICE_UNAVAILABLE, Json(json!({"error": err.to_string()}))).into_response()
        }
    }
}
