// Error taxonomy for the fetch → merge → cache pipeline.

use thiserror::Error;

/// Failure retrieving or decoding an upstream payload.
///
/// For the catalog this is fatal to a build; for manager snapshots it only
/// drops the affected manager from the result.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FetchError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("request timed out after {secs}s")]
    Timeout { secs: u64 },

    #[error("upstream returned HTTP {status}")]
    Status { status: u16 },

    #[error("malformed payload: {0}")]
    Malformed(String),
}

/// A matchday build failed end to end. Never cached.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RefreshError {
    #[error("catalog fetch failed for matchday {matchday}: {source}")]
    Catalog {
        matchday: u32,
        #[source]
        source: FetchError,
    },
}

impl RefreshError {
    /// The matchday whose build failed.
    pub fn matchday(&self) -> u32 {
        match self {
            RefreshError::Catalog { matchday, .. } => *matchday,
        }
    }
}
