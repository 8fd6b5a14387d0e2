//! Externally driven rank values.
//!
//! Campaign tooling and editorial boosts push per-deal rank bytes through a
//! side channel. The scoring engine reads them synchronously from an
//! in-process cache; a sync job replaces the cached map wholesale. Entries
//! past the staleness threshold are treated as absent rather than served.

use arc_swap::ArcSwap;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::info;
use uuid::Uuid;

use crate::error::Result;

/// Rank assumed when no fresh external value exists for a deal.
pub const DEFAULT_EXTERNAL_RANK: u8 = 50;

/// Age at which cached external ranks stop being trusted.
pub const DEFAULT_STALENESS: Duration = Duration::from_secs(5 * 60);

/// Source of externally computed rank values.
#[async_trait]
pub trait ExternalRankSource: Send + Sync {
    /// Fetch the complete current rank map.
    async fn fetch_ranks(&self) -> Result<HashMap<Uuid, u8>>;
}

#[derive(Debug, Default)]
struct CachedRanks {
    values: HashMap<Uuid, u8>,
    refreshed_at: Option<Instant>,
}

/// Read-many, write-rarely cache of external ranks.
pub struct ExternalRankCache {
    entries: ArcSwap<CachedRanks>,
    staleness: Duration,
}

impl ExternalRankCache {
    pub fn new() -> Self {
        Self::with_staleness(DEFAULT_STALENESS)
    }

    pub fn with_staleness(staleness: Duration) -> Self {
        Self {
            entries: ArcSwap::from_pointee(CachedRanks::default()),
            staleness,
        }
    }

    /// External rank for a deal; `DEFAULT_EXTERNAL_RANK` when the cache has
    /// no fresh value.
    pub fn rank_for(&self, deal_id: Uuid) -> u8 {
        let cached = self.entries.load();
        match cached.refreshed_at {
            Some(refreshed_at) if refreshed_at.elapsed() <= self.staleness => cached
                .values
                .get(&deal_id)
                .copied()
                .unwrap_or(DEFAULT_EXTERNAL_RANK),
            _ => DEFAULT_EXTERNAL_RANK,
        }
    }

    /// Replace the cached map wholesale from the source.
    pub async fn refresh(&self, source: &dyn ExternalRankSource) -> Result<usize> {
        let values = source.fetch_ranks().await?;
        let count = values.len();
        self.entries.store(Arc::new(CachedRanks {
            values,
            refreshed_at: Some(Instant::now()),
        }));
        info!(entries = count, "Refreshed external rank cache");
        Ok(count)
    }

    /// Number of cached entries, fresh or not.
    pub fn entry_count(&self) -> usize {
        self.entries.load().values.len()
    }
}

impl Default for ExternalRankCache {
    fn default() -> Self {
        Self::new()
    }
}
