// League data pipeline: catalog and snapshot normalization, merge, matchday
// cache, and the scheduled refresh loop. Transport is injected through the
// traits in `fetch`.

pub mod cache;
pub mod error;
pub mod fetch;
pub mod manager;
pub mod merge;
pub mod player;
pub mod scheduler;

pub use cache::{Clock, MatchdayCache, SystemClock};
pub use error::{FetchError, RefreshError};
pub use fetch::{CatalogSource, SnapshotSource};
pub use manager::{ManagerAlias, ManagerAliases, ManagerSnapshot, ManagerSnapshotFetcher};
pub use merge::{merge, EnrichedPlayer, GlobalPlayerEntry, ManagerView, MergedResult};
pub use player::{Catalog, PlayerRecord, Position, PublicCatalogFetcher};
pub use scheduler::{RefreshScheduler, ScheduleConfig};
