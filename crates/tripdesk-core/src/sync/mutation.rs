use std::sync::Arc;

use serde_json::Value;
use tokio::time::Instant;
use tracing::debug;

use crate::cache::{ResourceKey, ResourceStore, SubscriptionBroker};

/// Applies local edits to the cache before the backend confirms them.
///
/// A mutation counts as a write for TTL purposes and is published to all
/// subscribers before the call returns. There is no conflict detection: a
/// later fetch simply overwrites the optimistic value.
pub struct MutationGate {
    store: Arc<ResourceStore>,
    broker: Arc<SubscriptionBroker>,
}

impl MutationGate {
    pub fn new(store: Arc<ResourceStore>, broker: Arc<SubscriptionBroker>) -> Self {
        Self { store, broker }
    }

    /// Replace the cached value with `transform(current)`.
    ///
    /// `transform` receives the empty default if nothing is cached. It may
    /// be called more than once if another write to `key` races with it.
    pub fn apply<F>(&self, key: &ResourceKey, transform: F) -> Value
    where
        F: FnMut(&Value) -> Value,
    {
        let (next, version) = self.store.update(key, transform, Instant::now());
        debug!(key = %key, version, "Applied optimistic mutation");
        self.broker.publish(key, &next, version);
        next
    }

    /// Replace the cached value outright.
    pub fn replace(&self, key: &ResourceKey, value: Value) -> Value {
        let version = self.store.set(key, value.clone(), Instant::now());
        debug!(key = %key, version, "Replaced cached value");
        self.broker.publish(key, &value, version);
        value
    }
}

/// Append `item` to a collection value; non-array values are replaced by a
/// one-element collection.
pub fn push_item(current: &Value, item: Value) -> Value {
    let mut items = current.as_array().cloned().unwrap_or_default();
    items.push(item);
    Value::Array(items)
}

/// Drop every element of a collection whose `id` equals `id`.
pub fn remove_by_id(current: &Value, id: &Value) -> Value {
    let items = current
        .as_array()
        .map(|items| items.iter().filter(|item| item.get("id") != Some(id)).cloned().collect())
        .unwrap_or_default();
    Value::Array(items)
}
