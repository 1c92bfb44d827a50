use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde_json::Value;
use tokio::time::Instant;
use tracing::trace;

use super::ResourceKey;

/// Value returned for keys that have never been fetched or mutated.
/// Collection views treat it as "no rows yet".
pub fn empty_value() -> Value {
    Value::Array(Vec::new())
}

/// A cached resource and the bookkeeping needed for TTL checks.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub value: Value,
    /// Monotonic start time of the last successful fetch or mutation.
    /// `None` once the entry has been expired by a forced refresh.
    pub fetched_at: Option<Instant>,
    /// Wall-clock time of the last write, for display only.
    pub cached_at: DateTime<Utc>,
    /// Store-wide write sequence number. Later writes always carry a
    /// higher version, across all keys.
    pub version: u64,
}

impl CacheEntry {
    pub fn new(value: Value, fetched_at: Instant, version: u64) -> Self {
        Self {
            value,
            fetched_at: Some(fetched_at),
            cached_at: Utc::now(),
            version,
        }
    }

    pub fn is_fresh(&self, ttl: Duration) -> bool {
        match self.fetched_at {
            Some(at) => Instant::now().saturating_duration_since(at) <= ttl,
            None => false,
        }
    }

    pub fn age_minutes(&self) -> i64 {
        (Utc::now() - self.cached_at).num_minutes()
    }

    pub fn age_display(&self) -> String {
        let minutes = self.age_minutes();
        if minutes < 1 {
            // Negative ages come from clock skew
            "just now".to_string()
        } else if minutes < 60 {
            format!("{}m ago", minutes)
        } else if minutes < 1440 {
            let hours = minutes / 60;
            if minutes % 60 >= 30 {
                format!("{}h ago", hours + 1)
            } else {
                format!("{}h ago", hours)
            }
        } else {
            let days = minutes / 1440;
            if (minutes % 1440) / 60 >= 12 {
                format!("{}d ago", days + 1)
            } else {
                format!("{}d ago", days)
            }
        }
    }
}

/// Lifecycle state of a single resource key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceState {
    /// Nothing cached and no fetch outstanding.
    Empty,
    /// A fetch is outstanding.
    Loading,
    /// Cached and younger than the TTL.
    Fresh,
    /// Cached but expired, or expired by a forced refresh.
    Stale,
}

/// Process-wide key → value map. Pure data holder: no I/O, no notifications.
///
/// Every write is stamped with a version so that publishers can tell which
/// of two racing writes is the newer one.
#[derive(Debug, Default)]
pub struct ResourceStore {
    entries: Mutex<HashMap<ResourceKey, CacheEntry>>,
    last_version: AtomicU64,
}

impl ResourceStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<ResourceKey, CacheEntry>> {
        // Writers never panic while holding the lock, recover the map regardless
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current value for `key`, or an empty array if nothing is cached.
    pub fn get(&self, key: &ResourceKey) -> Value {
        self.entries()
            .get(key)
            .map(|e| e.value.clone())
            .unwrap_or_else(empty_value)
    }

    pub fn entry(&self, key: &ResourceKey) -> Option<CacheEntry> {
        self.entries().get(key).cloned()
    }

    pub fn contains(&self, key: &ResourceKey) -> bool {
        self.entries().contains_key(key)
    }

    // Must be called with the entries lock held so versions follow write order.
    fn next_version(&self) -> u64 {
        self.last_version.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Store `value` and return the version of the write.
    pub fn set(&self, key: &ResourceKey, value: Value, fetched_at: Instant) -> u64 {
        let mut entries = self.entries();
        let version = self.next_version();
        entries.insert(key.clone(), CacheEntry::new(value, fetched_at, version));
        version
    }

    /// Replace the value with `transform(current)` and return the new value
    /// with the version of the write.
    ///
    /// `transform` runs without the lock held, so it may read the store. If
    /// another write lands on `key` in the meantime, `transform` is re-run
    /// against the newer value.
    pub fn update<F>(&self, key: &ResourceKey, mut transform: F, fetched_at: Instant) -> (Value, u64)
    where
        F: FnMut(&Value) -> Value,
    {
        loop {
            let (current, seen) = match self.entries().get(key) {
                Some(entry) => (entry.value.clone(), Some(entry.version)),
                None => (empty_value(), None),
            };
            let next = transform(&current);

            let mut entries = self.entries();
            if entries.get(key).map(|e| e.version) == seen {
                let version = self.next_version();
                entries.insert(key.clone(), CacheEntry::new(next.clone(), fetched_at, version));
                return (next, version);
            }
            trace!(key = %key, "Concurrent write during update, retrying");
        }
    }

    /// Remove the entry. Returns whether one existed.
    pub fn delete(&self, key: &ResourceKey) -> bool {
        self.entries().remove(key).is_some()
    }

    /// Forget the fetch timestamp but keep the value, so the next load
    /// refetches while readers still see the last known data.
    pub fn expire(&self, key: &ResourceKey) {
        if let Some(entry) = self.entries().get_mut(key) {
            entry.fetched_at = None;
        }
    }

    pub fn is_fresh(&self, key: &ResourceKey, ttl: Duration) -> bool {
        self.entries()
            .get(key)
            .map(|e| e.is_fresh(ttl))
            .unwrap_or(false)
    }

    /// State of `key` given whether a fetch for it is outstanding.
    ///
    /// A fresh entry wins over an outstanding fetch: an optimistic write
    /// made while a fetch is running reports `Fresh`.
    pub fn state(&self, key: &ResourceKey, ttl: Duration, in_flight: bool) -> ResourceState {
        match self.entries().get(key) {
            Some(e) if e.is_fresh(ttl) => ResourceState::Fresh,
            _ if in_flight => ResourceState::Loading,
            Some(_) => ResourceState::Stale,
            None => ResourceState::Empty,
        }
    }

    pub fn keys(&self) -> Vec<ResourceKey> {
        let mut keys: Vec<_> = self.entries().keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }

    /// Drop every entry.
    pub fn clear(&self) {
        self.entries().clear();
    }
}

// ============================================================================
// Tests
// ============================================================================
