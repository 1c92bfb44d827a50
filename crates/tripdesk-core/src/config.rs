//! Sync layer configuration.
//!
//! Only three knobs exist: where the backend lives, how long cached data is
//! considered fresh, and which resources are warmed at startup. Values come
//! from code defaults, overridable through the environment (a `.env` file is
//! honored):
//!
//! - `TRIPDESK_API_URL`: backend base URL
//! - `TRIPDESK_CACHE_TTL_MS`: freshness window in milliseconds
//! - `TRIPDESK_PREFETCH_KEYS`: comma-separated resource keys

use std::time::Duration;

use anyhow::{Context, Result};

use crate::cache::ResourceKey;
use crate::models::resources;

/// Default freshness window. Short, since admin views should be near
/// real-time and several agents edit the same records.
pub const DEFAULT_TTL: Duration = Duration::from_secs(5);

const DEFAULT_API_URL: &str = "http://localhost:3000/api";

const ENV_API_URL: &str = "TRIPDESK_API_URL";
const ENV_TTL_MS: &str = "TRIPDESK_CACHE_TTL_MS";
const ENV_PREFETCH_KEYS: &str = "TRIPDESK_PREFETCH_KEYS";

#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub api_base_url: String,
    pub ttl: Duration,
    pub prefetch_keys: Vec<ResourceKey>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_URL.to_string(),
            ttl: DEFAULT_TTL,
            prefetch_keys: resources::DASHBOARD
                .iter()
                .map(|k| ResourceKey::from(*k))
                .collect(),
        }
    }
}

impl SyncConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into();
        self
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_prefetch_keys<I, K>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<ResourceKey>,
    {
        self.prefetch_keys = keys.into_iter().map(Into::into).collect();
        self
    }

    /// Load configuration from the process environment, reading `.env` first
    /// if present.
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (silently ignore if not found)
        let _ = dotenvy::dotenv();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(url) = lookup(ENV_API_URL).filter(|s| !s.trim().is_empty()) {
            config.api_base_url = url.trim().to_string();
        }

        if let Some(raw) = lookup(ENV_TTL_MS) {
            let ms: u64 = raw
                .trim()
                .parse()
                .with_context(|| format!("{} must be a whole number of milliseconds, got {:?}", ENV_TTL_MS, raw))?;
            config.ttl = Duration::from_millis(ms);
        }

        if let Some(raw) = lookup(ENV_PREFETCH_KEYS) {
            config.prefetch_keys = raw
                .split(',')
                .map(str::trim)
                .filter(|k| !k.is_empty())
                .map(ResourceKey::from)
                .collect();
        }

        Ok(config)
    }
}
