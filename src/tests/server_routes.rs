// HTTP surface: readiness, token status and metrics over a real listener.

#[cfg(test)]
mod test {
    use chrono::{Duration as ChronoDuration, Utc};
    use http::StatusCode;
    use serde_json::Value;
    use std::sync::Arc;

    use crate::cache::token_cache::RefreshStrategy;
    use crate::config::settings::SettingsConfig;
    use crate::observability::metrics::Metrics;
    use crate::server::server::{router, AppState};
    use crate::tests::common::{build_cache, spawn_axum, FakeAuth, RecordingStore};

    fn settings_config(metrics_enabled: bool) -> SettingsConfig {
        serde_yaml::from_str(&format!("metrics:\n  path: /metrics\n  is_enabled: {}\n", metrics_enabled)).unwrap()
    }

    async fn serve(auth: FakeAuth, store: RecordingStore, metrics_enabled: bool) -> (String, Arc<Metrics>) {
        let metrics = Metrics::new().unwrap();
        let tokens = Arc::new(build_cache(auth, store, RefreshStrategy::Coalesced).with_metrics(metrics.clone()));
        let app = router(&settings_config(metrics_enabled), AppState::new(tokens, metrics.clone()));
        let (_handle, addr) = spawn_axum(app).await;
        (format!("http://{}", addr), metrics)
    }

    #[tokio::test]
    async fn health_is_always_ok() {
        let (base, _) = serve(FakeAuth::rejecting(), RecordingStore::new(), false).await;
        let resp = reqwest::get(format!("{}/health", base)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn ready_warms_the_cache() {
        let (base, _) = serve(FakeAuth::valid_for_secs(300), RecordingStore::new(), false).await;

        let resp = reqwest::get(format!("{}/ready", base)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let status: Value = reqwest::get(format!("{}/token/status", base)).await.unwrap().json().await.unwrap();
        assert_eq!(status["key"], "partner-token");
        assert_eq!(status["state"], "valid");
        assert!(status["expiresAt"].is_string());
    }

    #[tokio::test]
    async fn ready_reports_partner_login_failure_as_bad_gateway() {
        let (base, _) = serve(FakeAuth::rejecting(), RecordingStore::new(), false).await;

        let resp = reqwest::get(format!("{}/ready", base)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["status"], "unavailable");
        assert!(body["error"].as_str().unwrap().contains("invalid merchant credentials"));
    }

    #[tokio::test]
    async fn token_status_does_not_log_in() {
        let store = RecordingStore::new();
        store.seed("stale", Utc::now() - ChronoDuration::seconds(5)).await;
        let (base, metrics) = serve(FakeAuth::valid_for_secs(300), store, false).await;

        let status: Value = reqwest::get(format!("{}/token/status", base)).await.unwrap().json().await.unwrap();
        assert_eq!(status["state"], "expired");
        assert_eq!(metrics.token_refreshes.with_label_values(&["success"]).get(), 0);
    }

    #[tokio::test]
    async fn metrics_route_exposes_cache_counters() {
        let (base, _) = serve(FakeAuth::valid_for_secs(300), RecordingStore::new(), true).await;
        reqwest::get(format!("{}/ready", base)).await.unwrap();

        let resp = reqwest::get(format!("{}/metrics", base)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let text = resp.text().await.unwrap();
        assert!(text.contains("bullion_gateway_token_refresh_total{outcome=\"success\"} 1"), "{}", text);
        assert!(text.contains("bullion_gateway_token_cache_lookups_total{result=\"miss\"}"), "{}", text);
    }

    #[tokio::test]
    async fn metrics_route_absent_when_disabled() {
        let (base, _) = serve(FakeAuth::valid_for_secs(300), RecordingStore::new(), false).await;
        let resp = reqwest::get(format!("{}/metrics", base)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }
}
