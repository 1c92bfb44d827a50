//! TTL-aware loader with per-key fetch deduplication.
//!
//! `load` never fails. A transport error is logged, recorded for
//! `last_error`, and the caller gets whatever the cache already holds.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde_json::Value;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::auth::CredentialSource;
use crate::cache::{ResourceKey, ResourceState, ResourceStore, SubscriptionBroker};
use crate::transport::Transport;

/// How a call to [`FetchCoordinator::load_with_outcome`] was satisfied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// Served from a fresh cache entry; no I/O.
    Cached,
    /// Another fetch for the key was outstanding; served the current value.
    Deduplicated,
    /// Fetched from the backend, stored and published.
    Fetched,
    /// The fetch failed; served the previous value (or the empty default).
    Failed,
}

fn locked<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Clears the in-flight marker when the fetch settles, including when the
/// load future panics or is dropped mid-await.
struct InFlightGuard<'a> {
    in_flight: &'a Mutex<HashSet<ResourceKey>>,
    key: ResourceKey,
}

impl<'a> InFlightGuard<'a> {
    fn acquire(in_flight: &'a Mutex<HashSet<ResourceKey>>, key: &ResourceKey) -> Option<Self> {
        if !locked(in_flight).insert(key.clone()) {
            return None;
        }
        Some(Self {
            in_flight,
            key: key.clone(),
        })
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        locked(self.in_flight).remove(&self.key);
    }
}

pub struct FetchCoordinator {
    store: Arc<ResourceStore>,
    broker: Arc<SubscriptionBroker>,
    transport: Arc<dyn Transport>,
    credentials: Arc<dyn CredentialSource>,
    ttl: Duration,
    in_flight: Mutex<HashSet<ResourceKey>>,
    errors: Mutex<HashMap<ResourceKey, String>>,
}

impl FetchCoordinator {
    pub fn new(
        store: Arc<ResourceStore>,
        broker: Arc<SubscriptionBroker>,
        transport: Arc<dyn Transport>,
        credentials: Arc<dyn CredentialSource>,
        ttl: Duration,
    ) -> Self {
        Self {
            store,
            broker,
            transport,
            credentials,
            ttl,
            in_flight: Mutex::new(HashSet::new()),
            errors: Mutex::new(HashMap::new()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn credentials(&self) -> &Arc<dyn CredentialSource> {
        &self.credentials
    }

    pub fn is_in_flight(&self, key: &ResourceKey) -> bool {
        locked(&self.in_flight).contains(key)
    }

    pub fn state(&self, key: &ResourceKey) -> ResourceState {
        self.store.state(key, self.ttl, self.is_in_flight(key))
    }

    /// Message of the most recent failed fetch for `key`, cleared by the
    /// next successful one.
    pub fn last_error(&self, key: &ResourceKey) -> Option<String> {
        locked(&self.errors).get(key).cloned()
    }

    /// Current value for `key`, refreshed from the backend if stale.
    pub async fn load(&self, key: &ResourceKey, force_refresh: bool) -> Value {
        self.load_with_outcome(key, force_refresh).await.0
    }

    pub async fn load_with_outcome(&self, key: &ResourceKey, force_refresh: bool) -> (Value, LoadOutcome) {
        if force_refresh {
            self.store.expire(key);
        } else if self.store.is_fresh(key, self.ttl) {
            debug!(key = %key, "Cache hit");
            return (self.store.get(key), LoadOutcome::Cached);
        }

        let Some(_guard) = InFlightGuard::acquire(&self.in_flight, key) else {
            debug!(key = %key, "Fetch already in flight, serving cached value");
            return (self.store.get(key), LoadOutcome::Deduplicated);
        };

        let started = Instant::now();
        let token = self.credentials.token().await;

        match self.transport.fetch(key, token.as_deref()).await {
            Ok(value) => {
                let version = self.store.set(key, value.clone(), started);
                locked(&self.errors).remove(key);
                self.broker.publish(key, &value, version);
                debug!(key = %key, elapsed_ms = started.elapsed().as_millis() as u64, "Fetched resource");
                (value, LoadOutcome::Fetched)
            }
            Err(e) => {
                warn!(key = %key, error = %e, "Fetch failed, serving cached value");
                locked(&self.errors).insert(key.clone(), e.to_string());
                (self.store.get(key), LoadOutcome::Failed)
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
