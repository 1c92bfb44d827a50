//! tripdesk-core - data synchronization layer for the tripdesk CRM dashboard.
//!
//! The dashboard's views (queries, packages, hotels, ...) all read from one
//! in-memory cache owned by a [`SyncEngine`]. The engine:
//! - serves cached data while it is younger than the TTL
//! - issues at most one network fetch per resource key at a time
//! - applies optimistic mutations locally and reconciles them with a fetch
//! - pushes every change to all bound consumers of that key
//!
//! Nothing is persisted; dropping the engine discards the cache.

pub mod auth;
pub mod cache;
pub mod config;
pub mod engine;
pub mod logging;
pub mod models;
pub mod sync;
pub mod transport;

#[cfg(test)]
pub(crate) mod test_support;

pub use auth::{CredentialSource, Session, SessionData, StaticToken};
pub use cache::{ResourceKey, ResourceState, ResourceStore, SubscriptionBroker, SubscriptionId};
pub use config::SyncConfig;
pub use engine::SyncEngine;
pub use sync::{FetchCoordinator, LoadOutcome, MutationGate, PrefetchSummary, ResourceBinding, View};
pub use transport::{FetchError, HttpTransport, Transport};
