//! # Bullion Gateway Library
//!
//! Integration plumbing for a bullion-trading partner's merchant API:
//! a lazily refreshed partner token shared through a key-value store,
//! and an authorized client for the partner endpoints.
//!
//! Modules:
//! - `cache`: token cache, store contract and store backends
//! - `auth`: remote login contract and the partner login client
//! - `partner`: typed partner responses and the authorized API client
//! - `config`: service configuration types, loading and validation
//! - `server`: health, readiness, token status and metrics endpoints

pub mod auth;
pub mod cache;
pub mod config;
pub mod helpers;
pub mod observability;
pub mod partner;
pub mod resilience;
pub mod server;
pub mod utils;

#[cfg(test)]
mod tests;

pub use crate::cache::token_cache::{RefreshStrategy, TokenCache, TokenError};
