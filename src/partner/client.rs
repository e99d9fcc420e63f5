use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::auth::AuthClient;
use crate::cache::store::Store;
use crate::cache::token_cache::{TokenCache, TokenError};
use crate::config::types::PartnerConfig;
use crate::helpers::merge::form_fields;
use crate::observability::metrics::{Metrics, OUTCOME_FAILURE, OUTCOME_SUCCESS};
use crate::partner::response::PartnerResponse;
use crate::partner::PartnerError;
use crate::resilience::retry::RetrySettings;

/// Calls partner merchant endpoints with `Authorization: Bearer <token>`.
///
/// Token acquisition is retried per `retry` when the login failed; the
/// partner call itself is sent once.
///
/// `endpoint` names the call for metrics, e.g. `"user_get"`. It must not
/// carry per-user ids, which belong in `path`.
pub struct PartnerClient<A, S> {
    client: Client,
    base_url: String,
    tokens: Arc<TokenCache<A, S>>,
    retry: RetrySettings,
    metrics: Option<Arc<Metrics>>,
}

impl<A: AuthClient, S: Store> PartnerClient<A, S> {
    pub fn new(
        cfg: &PartnerConfig,
        tokens: Arc<TokenCache<A, S>>,
        retry: RetrySettings,
    ) -> Result<Self, PartnerError> {
        let client = Client::builder().timeout(cfg.request_timeout()).build()?;
        Ok(Self {
            client,
            base_url: cfg.host.trim_end_matches('/').to_owned(),
            tokens,
            retry,
            metrics: None,
        })
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub async fn get<T: DeserializeOwned>(&self, endpoint: &'static str, path: &str) -> Result<T, PartnerError> {
        let request = self.client.get(self.url(path));
        self.send(endpoint, request).await
    }

    /// Sends the non-empty fields of `body` as an urlencoded form.
    pub async fn post_form<T: DeserializeOwned, B: Serialize>(
        &self,
        endpoint: &'static str,
        path: &str,
        body: &B,
    ) -> Result<T, PartnerError> {
        let form = form_fields(body)?;
        let request = self.client.post(self.url(path)).form(&form);
        self.send(endpoint, request).await
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    async fn bearer(&self) -> Result<String, TokenError> {
        self.retry
            .run_with_retry(
                || self.tokens.get_valid_token(),
                |err| matches!(err, TokenError::AuthenticationFailed(_)),
            )
            .await
    }

    async fn send<T: DeserializeOwned>(&self, endpoint: &'static str, request: RequestBuilder) -> Result<T, PartnerError> {
        let result = self.send_inner(request).await;
        let outcome = if result.is_ok() { OUTCOME_SUCCESS } else { OUTCOME_FAILURE };
        if let Err(err) = &result {
            warn!("partner call {} failed: {}", endpoint, err);
        }
        if let Some(metrics) = &self.metrics {
            metrics.partner_requests.with_label_values(&[endpoint, outcome]).inc();
        }
        result
    }

    async fn send_inner<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, PartnerError> {
        let token = self.bearer().await?;
        let response = request
            .header(http::header::ACCEPT, "application/json")
            .bearer_auth(token)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        debug!("partner answered HTTP {}", status);

        let envelope: PartnerResponse<T> = match serde_json::from_str(&body) {
            Ok(envelope) => envelope,
            Err(_) if !status.is_success() => return Err(PartnerError::Status { status, body }),
            Err(err) => return Err(PartnerError::MalformedResponse(err.to_string())),
        };
        if !envelope.is_error() && !status.is_success() {
            return Err(PartnerError::Status { status, body });
        }
        envelope.into_result()
    }
}
