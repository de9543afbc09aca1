// Transport seams for the two upstream feeds.
//
// Implementations hand back the raw JSON body; normalization into typed
// records happens in `player` and `manager` so it can be exercised without a
// network.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::FetchError;

/// Source of the public, matchday-scoped player catalog.
#[async_trait]
pub trait CatalogSource: Send + Sync {
    /// Fetch the raw catalog payload (`{data:{value:{playerList:[...]}}}`).
    async fn fetch_catalog(&self, matchday: u32) -> Result<Value, FetchError>;
}

/// Source of per-manager team snapshots.
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    /// Fetch one manager's raw snapshot payload (`{data:{value:{...}}}`).
    async fn fetch_snapshot(&self, matchday: u32, manager_id: &str) -> Result<Value, FetchError>;
}
