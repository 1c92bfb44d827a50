//! Per-view adapter over the shared cache.
//!
//! A `ResourceBinding` lives as long as the view showing a resource. It
//! renders cached data immediately, keeps itself subscribed for updates,
//! kicks off a TTL-respecting background load, and unsubscribes on drop.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::cache::{Listener, ResourceKey, ResourceState, ResourceStore, SubscriptionId};
use crate::engine::SyncEngine;

fn sync_from_store(tx: &watch::Sender<Value>, store: &ResourceStore, key: &ResourceKey) {
    tx.send_if_modified(|current| {
        let latest = store.get(key);
        if *current == latest {
            return false;
        }
        *current = latest;
        true
    });
}

/// Anything that can display a resource.
pub trait View: Send + Sync {
    fn render(&self, data: &Value, is_loading: bool);
}

pub struct ResourceBinding {
    key: ResourceKey,
    engine: Arc<SyncEngine>,
    data: watch::Receiver<Value>,
    subscription: SubscriptionId,
    initial_load: Option<JoinHandle<Value>>,
}

impl ResourceBinding {
    /// Bind to `key`. Must be called from within a tokio runtime.
    pub fn activate(engine: Arc<SyncEngine>, key: impl Into<ResourceKey>) -> Self {
        Self::activate_inner(engine, key.into(), None)
    }

    /// Bind to `key` and render `view` now and on every change.
    pub fn activate_with_view(
        engine: Arc<SyncEngine>,
        key: impl Into<ResourceKey>,
        view: Arc<dyn View>,
    ) -> Self {
        Self::activate_inner(engine, key.into(), Some(view))
    }

    fn activate_inner(engine: Arc<SyncEngine>, key: ResourceKey, view: Option<Arc<dyn View>>) -> Self {
        let (tx, rx) = watch::channel(engine.store().get(&key));
        let tx = Arc::new(tx);

        // The cell is always refreshed from the store while holding the watch
        // lock, so concurrent refreshes can never leave an older value behind.
        let listener_tx = Arc::clone(&tx);
        let store = Arc::clone(engine.store());
        let listener_key = key.clone();
        let listener_view = view.clone();
        let listener: Listener = Arc::new(move |_: &Value| {
            sync_from_store(&listener_tx, &store, &listener_key);
            if let Some(view) = &listener_view {
                let current = listener_tx.borrow().clone();
                view.render(&current, false);
            }
        });
        let subscription = engine.broker().subscribe(&key, listener);
        // Catch a write that landed between the first read and the subscribe
        sync_from_store(&tx, engine.store(), &key);

        let coordinator = Arc::clone(engine.coordinator());
        let load_key = key.clone();
        let initial_load = tokio::spawn(async move { coordinator.load(&load_key, false).await });

        debug!(key = %key, "Binding activated");
        let binding = Self {
            key,
            engine,
            data: rx,
            subscription,
            initial_load: Some(initial_load),
        };
        if let Some(view) = view {
            view.render(&binding.data(), binding.is_loading());
        }
        binding
    }

    pub fn key(&self) -> &ResourceKey {
        &self.key
    }

    /// The latest value seen by this binding; an empty array until data arrives.
    pub fn data(&self) -> Value {
        self.data.borrow().clone()
    }

    /// Decode the current value into a typed record or collection.
    pub fn data_as<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        T::deserialize(&*self.data.borrow())
    }

    /// A receiver that is notified whenever the bound resource changes.
    pub fn watch(&self) -> watch::Receiver<Value> {
        self.data.clone()
    }

    /// True only while nothing is cached and a fetch is outstanding. Stale
    /// data never shows as loading.
    pub fn is_loading(&self) -> bool {
        if self.engine.store().contains(&self.key) {
            return false;
        }
        let initial_pending = self
            .initial_load
            .as_ref()
            .map(|h| !h.is_finished())
            .unwrap_or(false);
        initial_pending || self.engine.coordinator().is_in_flight(&self.key)
    }

    pub fn state(&self) -> ResourceState {
        self.engine.coordinator().state(&self.key)
    }

    /// Message of the last failed fetch, if the most recent one failed.
    pub fn error(&self) -> Option<String> {
        self.engine.coordinator().last_error(&self.key)
    }

    /// Wait for the load started at activation and return the current data.
    pub async fn ready(&mut self) -> Value {
        if let Some(handle) = self.initial_load.take() {
            if let Err(e) = handle.await {
                warn!(key = %self.key, error = %e, "Initial load task did not complete");
            }
        }
        self.data()
    }

    /// Refetch regardless of TTL.
    pub async fn refresh(&self) -> Value {
        self.engine.coordinator().load(&self.key, true).await
    }

    /// Optionally apply `optimistic` locally, then reconcile with the backend.
    pub async fn mutate(&self, optimistic: Option<Value>) -> Value {
        if let Some(value) = optimistic {
            self.engine.gate().replace(&self.key, value);
        }
        self.refresh().await
    }

    /// Transform the current value locally, then reconcile with the backend.
    /// `transform` may be re-run if another write to the key races with it.
    pub async fn mutate_with<F>(&self, transform: F) -> Value
    where
        F: FnMut(&Value) -> Value,
    {
        self.engine.gate().apply(&self.key, transform);
        self.refresh().await
    }

    /// Write a value already known to be authoritative; no reconciliation fetch.
    pub fn set_data(&self, value: Value) {
        self.engine.gate().replace(&self.key, value);
    }

    /// Stop receiving updates. Equivalent to dropping the binding.
    pub fn deactivate(self) {}
}

impl Drop for ResourceBinding {
    fn drop(&mut self) {
        self.engine.broker().unsubscribe(&self.key, self.subscription);
        debug!(key = %self.key, "Binding deactivated");
    }
}

// ============================================================================
// Tests
// ============================================================================
