//! Startup warm-up of the dashboard collections.

use std::sync::Arc;

use futures::future::join_all;
use tracing::{debug, info};

use super::{FetchCoordinator, LoadOutcome};
use crate::cache::ResourceKey;

/// Result of a warm-up pass. Informational only; nothing acts on failures.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrefetchSummary {
    pub requested: usize,
    pub fetched: usize,
    pub cached: usize,
    pub failed: usize,
    /// True when no credential was available and nothing was loaded.
    pub skipped: bool,
}

/// Load every key in parallel, each in its own task.
///
/// A failing or panicking load never affects its siblings; the join only
/// signals that all of them have settled.
pub async fn prefetch_all(coordinator: &Arc<FetchCoordinator>, keys: &[ResourceKey]) -> PrefetchSummary {
    if coordinator.credentials().token().await.is_none() {
        info!("No credential available, skipping prefetch");
        return PrefetchSummary {
            requested: keys.len(),
            skipped: true,
            ..Default::default()
        };
    }

    info!(count = keys.len(), "Prefetching resources");
    let tasks: Vec<_> = keys
        .iter()
        .cloned()
        .map(|key| {
            let coordinator = Arc::clone(coordinator);
            tokio::spawn(async move { coordinator.load_with_outcome(&key, false).await.1 })
        })
        .collect();

    let mut summary = PrefetchSummary {
        requested: keys.len(),
        ..Default::default()
    };
    for result in join_all(tasks).await {
        match result {
            Ok(LoadOutcome::Fetched) => summary.fetched += 1,
            Ok(LoadOutcome::Cached) | Ok(LoadOutcome::Deduplicated) => summary.cached += 1,
            Ok(LoadOutcome::Failed) => summary.failed += 1,
            Err(e) => {
                debug!(error = %e, "Prefetch task aborted");
                summary.failed += 1;
            }
        }
    }
    info!(
        fetched = summary.fetched,
        cached = summary.cached,
        failed = summary.failed,
        "Prefetch complete"
    );
    summary
}
