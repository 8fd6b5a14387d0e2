//! External Rank Sync Background Job
//!
//! Pulls the complete external rank map from its source on an interval and
//! swaps it into the in-process cache. Scoring keeps reading the previous
//! map while a pull is in flight; after a failed pull the cache ages out on
//! its own staleness threshold.

use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::sleep;

use crate::services::external_ranks::{ExternalRankCache, ExternalRankSource};

/// How often to pull external ranks (every minute)
const SYNC_INTERVAL: Duration = Duration::from_secs(60);

/// Configuration for the external rank sync job
#[derive(Debug, Clone)]
pub struct RankSyncConfig {
    pub enabled: bool,
    pub sync_interval: Duration,
}

impl Default for RankSyncConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            sync_interval: SYNC_INTERVAL,
        }
    }
}

/// Start the external rank sync background job
pub async fn start_rank_sync(
    cache: Arc<ExternalRankCache>,
    source: Arc<dyn ExternalRankSource>,
    config: RankSyncConfig,
) {
    if !config.enabled {
        tracing::info!("External rank sync disabled by configuration");
        return;
    }

    tracing::info!(
        interval_secs = config.sync_interval.as_secs(),
        "Starting external rank sync background job"
    );

    loop {
        let cycle_start = Instant::now();

        match cache.refresh(source.as_ref()).await {
            Ok(count) => {
                tracing::info!(
                    entries = count,
                    duration_ms = cycle_start.elapsed().as_millis(),
                    "External rank sync completed"
                );
            }
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    duration_ms = cycle_start.elapsed().as_millis(),
                    "External rank sync failed"
                );
            }
        }

        sleep(config.sync_interval).await;
    }
}
