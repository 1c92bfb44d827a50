//! Network access to the CRM data endpoints.
//!
//! The sync layer only needs one operation: fetch the JSON document behind a
//! resource key, optionally with a bearer token. `Transport` is that seam;
//! `HttpTransport` implements it over reqwest against the hosted backend.

pub mod error;
pub mod http;

use async_trait::async_trait;
use serde_json::Value;

use crate::cache::ResourceKey;

pub use error::FetchError;
pub use http::HttpTransport;

/// Fetches the current server-side document for a resource key.
///
/// Implementations must return either a JSON array (collection resources) or
/// a JSON object (singleton resources). Any non-success outcome is an error;
/// the caller does not distinguish between kinds of failure.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn fetch(&self, key: &ResourceKey, token: Option<&str>) -> Result<Value, FetchError>;
}
