// Matchday-keyed cache of merged results.
//
// The map lock is held only around map reads and writes. Fetching and merging
// run without it, so builds for different matchdays proceed in parallel.
// Two concurrent refreshes of the same matchday both run the pipeline and
// the later store wins.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Local};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::RefreshError;
use crate::manager::ManagerSnapshotFetcher;
use crate::merge::{merge, MergedResult};
use crate::player::PublicCatalogFetcher;

// ---------------------------------------------------------------------------
// Clock
// ---------------------------------------------------------------------------

/// Wall-clock source, injectable for tests.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Local>;
}

/// The server's local time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Local> {
        Local::now()
    }
}

// ---------------------------------------------------------------------------
// MatchdayCache
// ---------------------------------------------------------------------------

pub struct MatchdayCache {
    catalog: PublicCatalogFetcher,
    snapshots: ManagerSnapshotFetcher,
    manager_ids: Vec<String>,
    clock: Arc<dyn Clock>,
    entries: Mutex<HashMap<u32, Arc<MergedResult>>>,
}

impl MatchdayCache {
    pub fn new(
        catalog: PublicCatalogFetcher,
        snapshots: ManagerSnapshotFetcher,
        manager_ids: Vec<String>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            catalog,
            snapshots,
            manager_ids,
            clock,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Number of managers the league tracks (not necessarily fetched).
    pub fn tracked_managers(&self) -> usize {
        self.manager_ids.len()
    }

    /// Return the cached result for `matchday`, building and storing it on
    /// first access. A cached entry is served as-is, however old.
    pub async fn get_or_build(&self, matchday: u32) -> Result<Arc<MergedResult>, RefreshError> {
        if let Some(hit) = self.get(matchday).await {
            debug!(matchday, "cache hit");
            return Ok(hit);
        }
        debug!(matchday, "cache miss, building");
        self.build_and_store(matchday).await
    }

    /// Rebuild `matchday` unconditionally. On failure the previous entry,
    /// if any, stays in place.
    pub async fn force_refresh(&self, matchday: u32) -> Result<Arc<MergedResult>, RefreshError> {
        self.build_and_store(matchday).await
    }

    /// Cached result without building.
    pub async fn get(&self, matchday: u32) -> Option<Arc<MergedResult>> {
        self.entries.lock().await.get(&matchday).cloned()
    }

    /// Highest matchday currently cached.
    pub async fn latest_matchday(&self) -> Option<u32> {
        self.entries.lock().await.keys().max().copied()
    }

    async fn build_and_store(&self, matchday: u32) -> Result<Arc<MergedResult>, RefreshError> {
        let result = match self.build(matchday).await {
            Ok(result) => Arc::new(result),
            Err(e) => {
                warn!(matchday, "build failed: {e}");
                return Err(e);
            }
        };

        self.entries.lock().await.insert(matchday, Arc::clone(&result));
        info!(
            matchday,
            managers = result.managers.len(),
            players = result.players.len(),
            "matchday cached"
        );
        Ok(result)
    }

    async fn build(&self, matchday: u32) -> Result<MergedResult, RefreshError> {
        let catalog = self
            .catalog
            .fetch(matchday)
            .await
            .map_err(|source| RefreshError::Catalog { matchday, source })?;
        let snapshots = self.snapshots.fetch(matchday, &self.manager_ids).await;

        Ok(merge(
            &catalog,
            &snapshots,
            self.manager_ids.len(),
            matchday,
            self.clock.now(),
        ))
    }
}
