//! In-memory resource cache.
//!
//! This module provides:
//! - `ResourceStore`: key → JSON value map with per-key fetch timestamps
//! - `SubscriptionBroker`: per-key listeners notified on every store change
//! - `ResourceState`: the derived Empty/Loading/Fresh/Stale state of a key
//!
//! Neither type performs I/O. Entries live until invalidated or until the
//! owning engine is dropped.

pub mod broker;
pub mod key;
pub mod store;

pub use broker::{Listener, SubscriptionBroker, SubscriptionId};
pub use key::ResourceKey;
pub use store::{CacheEntry, ResourceState, ResourceStore};
