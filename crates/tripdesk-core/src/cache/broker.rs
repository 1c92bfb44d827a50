use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde_json::Value;
use tracing::{debug, error, trace};

use super::ResourceKey;

/// Callback invoked with the latest value of a resource.
pub type Listener = Arc<dyn Fn(&Value) + Send + Sync>;

/// Handle returned by [`SubscriptionBroker::subscribe`].
/// Every registration gets its own id, so duplicates are removed independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Per-key delivery state.
#[derive(Default)]
struct Topic {
    listeners: Vec<(SubscriptionId, Listener)>,
    /// Highest store version accepted for delivery.
    latest: u64,
    /// Set while a publish is running this key's listeners.
    delivering: bool,
    /// Newer value that arrived while `delivering` was set.
    pending: Option<Value>,
}

type TopicMap = HashMap<ResourceKey, Topic>;

/// Fans out resource changes to every listener registered for the key.
///
/// Deliveries for one key never overlap. A publish that arrives while
/// another one is running for the same key is handed to the running one,
/// which delivers it once the current pass ends. Publishes carrying an older
/// store version than one already accepted are dropped, so listeners always
/// finish on the value the store holds.
#[derive(Default)]
pub struct SubscriptionBroker {
    topics: Mutex<TopicMap>,
    next_id: AtomicU64,
}

impl SubscriptionBroker {
    pub fn new() -> Self {
        Self::default()
    }

    fn topics(&self) -> MutexGuard<'_, TopicMap> {
        self.topics.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn subscribe(&self, key: &ResourceKey, listener: Listener) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.topics()
            .entry(key.clone())
            .or_default()
            .listeners
            .push((id, listener));
        trace!(key = %key, id = id.0, "Listener subscribed");
        id
    }

    /// Remove one registration. Returns false if it was already gone.
    pub fn unsubscribe(&self, key: &ResourceKey, id: SubscriptionId) -> bool {
        let mut topics = self.topics();
        let Some(topic) = topics.get_mut(key) else {
            return false;
        };
        let Some(pos) = topic.listeners.iter().position(|(sid, _)| *sid == id) else {
            return false;
        };
        topic.listeners.remove(pos);
        trace!(key = %key, id = id.0, "Listener unsubscribed");
        true
    }

    pub fn subscriber_count(&self, key: &ResourceKey) -> usize {
        self.topics().get(key).map(|t| t.listeners.len()).unwrap_or(0)
    }

    /// Deliver `value`, written to the store as `version`, to every listener
    /// of `key` in registration order.
    ///
    /// Listeners run after the lock is released so they may subscribe,
    /// unsubscribe or write from inside the callback; a write made there is
    /// delivered after the current pass. A panicking listener is logged and
    /// skipped; the rest still receive the value. Returns the number of
    /// listener calls this publish completed, which is zero when the value
    /// was superseded or handed to a delivery already running.
    pub fn publish(&self, key: &ResourceKey, value: &Value, version: u64) -> usize {
        {
            let mut topics = self.topics();
            let topic = topics.entry(key.clone()).or_default();
            if version <= topic.latest {
                trace!(key = %key, version, latest = topic.latest, "Dropping superseded update");
                return 0;
            }
            topic.latest = version;
            if topic.delivering {
                topic.pending = Some(value.clone());
                trace!(key = %key, version, "Queued update behind running delivery");
                return 0;
            }
            topic.delivering = true;
        }

        let mut delivered = 0;
        let mut current = value.clone();
        loop {
            let snapshot = self
                .topics()
                .get(key)
                .map(|t| t.listeners.clone())
                .unwrap_or_default();

            for (id, listener) in snapshot {
                match panic::catch_unwind(AssertUnwindSafe(|| listener(&current))) {
                    Ok(()) => delivered += 1,
                    Err(_) => {
                        error!(key = %key, id = id.0, "Listener panicked during publish");
                    }
                }
            }

            let mut topics = self.topics();
            let Some(topic) = topics.get_mut(key) else {
                break;
            };
            match topic.pending.take() {
                Some(next) => current = next,
                None => {
                    topic.delivering = false;
                    break;
                }
            }
        }
        debug!(key = %key, version, delivered, "Published resource update");
        delivered
    }
}
