use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeZone, Utc};
use reqwest::Client;
use tracing::debug;

use crate::auth::{AuthClient, AuthError, IssuedToken};
use crate::config::types::PartnerConfig;
use crate::partner::response::{LoginResult, PartnerResponse};
use crate::utils::constants::PARTNER_LOGIN_PATH;

const NAIVE_EXPIRE_AT_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Logs into the partner merchant API with the configured merchant
/// credentials.
#[derive(Debug, Clone)]
pub struct PartnerAuthClient {
    client: Client,
    login_url: String,
    email: String,
    password: String,
    offset: FixedOffset,
}

impl PartnerAuthClient {
    pub fn new(cfg: &PartnerConfig) -> Result<Self, AuthError> {
        let client = Client::builder().timeout(cfg.request_timeout()).build()?;
        Self::with_client(client, cfg)
    }

    pub fn with_client(client: Client, cfg: &PartnerConfig) -> Result<Self, AuthError> {
        let offset = FixedOffset::east_opt(cfg.utc_offset_minutes * 60).ok_or_else(|| {
            AuthError::MalformedResponse(format!("invalid partner utc offset {} minutes", cfg.utc_offset_minutes))
        })?;
        Ok(Self {
            client,
            login_url: format!("{}{}", cfg.host.trim_end_matches('/'), PARTNER_LOGIN_PATH),
            email: cfg.email.to_owned(),
            password: cfg.password.to_owned(),
            offset,
        })
    }
}

impl AuthClient for PartnerAuthClient {
    async fn login(&self) -> Result<IssuedToken, AuthError> {
        debug!("partner login: POST {}", self.login_url);
        let response = self
            .client
            .post(&self.login_url)
            .header(http::header::ACCEPT, "application/json")
            .form(&[("email", self.email.as_str()), ("password", self.password.as_str())])
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        let envelope: PartnerResponse<LoginResult> = match serde_json::from_str(&body) {
            Ok(envelope) => envelope,
            Err(_) if !status.is_success() => return Err(AuthError::Status(status)),
            Err(err) => return Err(AuthError::MalformedResponse(err.to_string())),
        };

        if envelope.is_error() {
            return Err(AuthError::Rejected {
                status_code: envelope.status_code,
                message: envelope.message,
            });
        }
        if !status.is_success() {
            return Err(AuthError::Status(status));
        }

        let data = envelope
            .result
            .ok_or_else(|| AuthError::MalformedResponse("missing 'result.data'".to_owned()))?
            .data;
        if data.access_token.is_empty() {
            return Err(AuthError::MalformedResponse("empty 'accessToken'".to_owned()));
        }
        let expires_at = parse_expire_at(&data.expire_at, self.offset)
            .ok_or_else(|| AuthError::MalformedResponse(format!("unparseable 'expireAt': {}", data.expire_at)))?;

        Ok(IssuedToken::new(data.access_token, expires_at))
    }
}

/// Accepts RFC 3339, or the partner's naive `YYYY-MM-DD HH:mm:ss` read in
/// `offset`.
pub fn parse_expire_at(raw: &str, offset: FixedOffset) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    let naive = NaiveDateTime::parse_from_str(raw, NAIVE_EXPIRE_AT_FORMAT).ok()?;
    offset
        .from_local_datetime(&naive)
        .single()
        .map(|ts| ts.with_timezone(&Utc))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn naive_expire_at_is_read_in_partner_offset() {
        let ist = FixedOffset::east_opt(330 * 60).unwrap();
        let got = parse_expire_at("2030-01-01 10:30:00", ist).unwrap();
        assert_eq!(got.to_rfc3339(), "2030-01-01T05:00:00+00:00");
    }

    #[test]
    fn rfc3339_expire_at_ignores_partner_offset() {
        let ist = FixedOffset::east_opt(330 * 60).unwrap();
        let got = parse_expire_at("2030-01-01T10:30:00Z", ist).unwrap();
        assert_eq!(got.to_rfc3339(), "2030-01-01T10:30:00+00:00");
    }

    #[test]
    fn garbage_expire_at_is_rejected() {
        let utc = FixedOffset::east_opt(0).unwrap();
        assert!(parse_expire_at("tomorrow", utc).is_none());
        assert!(parse_expire_at("", utc).is_none());
    }
}
