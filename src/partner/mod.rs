//! Partner merchant API: typed response envelope and an authorized client
//! that draws its bearer token from the token cache.

use thiserror::Error;

use crate::cache::token_cache::TokenError;

pub mod client;
pub mod response;

#[derive(Debug, Error)]
pub enum PartnerError {
    #[error(transparent)]
    Token(#[from] TokenError),

    #[error("partner request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("partner request body could not be encoded: {0}")]
    Encoding(#[from] serde_json::Error),

    #[error("partner answered HTTP {status}: {body}")]
    Status { status: http::StatusCode, body: String },

    #[error("partner rejected request with status {status_code}: {message} {errors}")]
    Rejected { status_code: i64, message: String, errors: String },

    #[error("malformed partner response: {0}")]
    MalformedResponse(String),
}
