//! Synchronization between the cache, the backend and consumers.
//!
//! This module provides:
//! - `FetchCoordinator`: TTL-aware, deduplicated loads from the transport
//! - `MutationGate`: optimistic local writes, published immediately
//! - `ResourceBinding`: per-view adapter exposing data, loading flag and mutations
//! - `prefetch_all`: startup warm-up of the dashboard collections

pub mod binding;
pub mod coordinator;
pub mod mutation;
pub mod prefetch;

pub use binding::{ResourceBinding, View};
pub use coordinator::{FetchCoordinator, LoadOutcome};
pub use mutation::{push_item, remove_by_id, MutationGate};
pub use prefetch::PrefetchSummary;
