//! The sync engine: one shared cache per process, injected into every view.
//!
//! `SyncEngine::init` wires the store, broker, coordinator and mutation gate
//! together. Create one engine at startup and hand clones of the `Arc` to
//! each binding; tests create as many isolated engines as they like.

use std::sync::Arc;

use anyhow::Result;
use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::info;

use crate::auth::CredentialSource;
use crate::cache::{Listener, ResourceKey, ResourceState, ResourceStore, SubscriptionBroker, SubscriptionId};
use crate::config::SyncConfig;
use crate::sync::{prefetch, FetchCoordinator, MutationGate, PrefetchSummary, ResourceBinding, View};
use crate::transport::{HttpTransport, Transport};

pub struct SyncEngine {
    config: SyncConfig,
    store: Arc<ResourceStore>,
    broker: Arc<SubscriptionBroker>,
    coordinator: Arc<FetchCoordinator>,
    gate: MutationGate,
}

impl SyncEngine {
    pub fn init(
        config: SyncConfig,
        transport: Arc<dyn Transport>,
        credentials: Arc<dyn CredentialSource>,
    ) -> Arc<Self> {
        let store = Arc::new(ResourceStore::new());
        let broker = Arc::new(SubscriptionBroker::new());
        let coordinator = Arc::new(FetchCoordinator::new(
            Arc::clone(&store),
            Arc::clone(&broker),
            transport,
            credentials,
            config.ttl,
        ));
        let gate = MutationGate::new(Arc::clone(&store), Arc::clone(&broker));

        info!(ttl_ms = config.ttl.as_millis() as u64, "Sync engine initialized");
        Arc::new(Self {
            config,
            store,
            broker,
            coordinator,
            gate,
        })
    }

    /// Engine talking HTTP to `config.api_base_url`.
    pub fn connect(config: SyncConfig, credentials: Arc<dyn CredentialSource>) -> Result<Arc<Self>> {
        let transport = HttpTransport::new(config.api_base_url.clone())?;
        Ok(Self::init(config, Arc::new(transport), credentials))
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<ResourceStore> {
        &self.store
    }

    pub fn broker(&self) -> &Arc<SubscriptionBroker> {
        &self.broker
    }

    pub fn coordinator(&self) -> &Arc<FetchCoordinator> {
        &self.coordinator
    }

    pub fn gate(&self) -> &MutationGate {
        &self.gate
    }

    // ===== Reads =====

    /// Cached value for `key` without any I/O; an empty array if never loaded.
    pub fn get_data(&self, key: impl Into<ResourceKey>) -> Value {
        self.store.get(&key.into())
    }

    /// Cached value if fresh, otherwise fetched.
    pub async fn load(&self, key: impl Into<ResourceKey>) -> Value {
        self.coordinator.load(&key.into(), false).await
    }

    /// Fetch regardless of TTL.
    pub async fn refresh(&self, key: impl Into<ResourceKey>) -> Value {
        self.coordinator.load(&key.into(), true).await
    }

    pub fn state(&self, key: impl Into<ResourceKey>) -> ResourceState {
        self.coordinator.state(&key.into())
    }

    pub fn last_error(&self, key: impl Into<ResourceKey>) -> Option<String> {
        self.coordinator.last_error(&key.into())
    }

    // ===== Writes =====

    /// Optimistically replace the cached value with `transform(current)`
    /// and notify subscribers. `transform` may read the cache and may run
    /// more than once if a concurrent write to `key` lands first.
    pub fn mutate<F>(&self, key: impl Into<ResourceKey>, transform: F) -> Value
    where
        F: FnMut(&Value) -> Value,
    {
        self.gate.apply(&key.into(), transform)
    }

    pub fn set_data(&self, key: impl Into<ResourceKey>, value: Value) -> Value {
        self.gate.replace(&key.into(), value)
    }

    /// Drop the cached entry for `key`. Subscribers are not notified; the
    /// next load fetches.
    pub fn invalidate(&self, key: impl Into<ResourceKey>) -> bool {
        let key = key.into();
        let removed = self.store.delete(&key);
        if removed {
            info!(key = %key, "Cache entry invalidated");
        }
        removed
    }

    /// Drop every cached entry, e.g. on sign-out.
    pub fn clear(&self) {
        info!(entries = self.store.len(), "Clearing cache");
        self.store.clear();
    }

    // ===== Subscriptions =====

    pub fn subscribe(&self, key: impl Into<ResourceKey>, listener: Listener) -> SubscriptionId {
        self.broker.subscribe(&key.into(), listener)
    }

    pub fn unsubscribe(&self, key: impl Into<ResourceKey>, id: SubscriptionId) -> bool {
        self.broker.unsubscribe(&key.into(), id)
    }

    pub fn bind(self: &Arc<Self>, key: impl Into<ResourceKey>) -> ResourceBinding {
        ResourceBinding::activate(Arc::clone(self), key)
    }

    pub fn bind_view(self: &Arc<Self>, key: impl Into<ResourceKey>, view: Arc<dyn View>) -> ResourceBinding {
        ResourceBinding::activate_with_view(Arc::clone(self), key, view)
    }

    // ===== Warm-up =====

    /// Load every configured prefetch key in parallel. Skips entirely when no
    /// credential is available yet.
    pub async fn prefetch_all(&self) -> PrefetchSummary {
        prefetch::prefetch_all(&self.coordinator, &self.config.prefetch_keys).await
    }

    /// Fire-and-forget variant of [`prefetch_all`](Self::prefetch_all).
    pub fn spawn_prefetch_all(self: &Arc<Self>) -> JoinHandle<PrefetchSummary> {
        let engine = Arc::clone(self);
        tokio::spawn(async move { engine.prefetch_all().await })
    }

    /// Human-readable age of each cached entry, e.g. `("/queries", "just now")`.
    pub fn cache_ages(&self) -> Vec<(ResourceKey, String)> {
        self.store
            .keys()
            .into_iter()
            .filter_map(|key| {
                let age = self.store.entry(&key)?.age_display();
                Some((key, age))
            })
            .collect()
    }
}

// ============================================================================
// Tests
// ============================================================================
