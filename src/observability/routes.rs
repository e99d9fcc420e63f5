use axum::extract::State;
use axum::response::{IntoResponse, Response};
use http::{header::CONTENT_TYPE, StatusCode};
use prometheus::{Encoder, TextEncoder};
use tracing::error;

use crate::auth::AuthClient;
use crate::cache::store::Store;
use crate::server::server::AppState;

/// Prometheus text exposition of the shared registry.
pub async fn get_metrics<A, S>(State(state): State<AppState<A, S>>) -> Response
where
    A: AuthClient + 'static,
    S: Store + 'static,
{
    let encoder = TextEncoder::new();
    let metric_families = state.metrics.registry.gather();
    let mut buffer = Vec::new();

    if let Err(err) = encoder.encode(&metric_families, &mut buffer) {
        error!("failed to encode metrics: {}", err);
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }

    (
        StatusCode::OK,
        [(CONTENT_TYPE, "text/plain; version=0.0.4")],
        buffer,
    )
        .into_response()
}
