//! Registry Refresh Background Job
//!
//! Periodically re-reads the registry configuration document, rebuilds the
//! full snapshot off the query path and publishes it with one atomic swap.
//! Queries keep reading the previous snapshot during a rebuild, and a
//! failed read or build changes nothing.

use std::path::PathBuf;
use std::time::{Duration, Instant};
use tokio::time::sleep;

use crate::error::Result;
use crate::registry::{RankingConfigDocument, SharedRegistry};

/// How often to reload the configuration (every 5 minutes)
const REFRESH_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// Configuration for the registry refresh job
#[derive(Debug, Clone)]
pub struct RegistryRefreshConfig {
    pub enabled: bool,
    pub config_path: PathBuf,
    pub refresh_interval: Duration,
}

impl RegistryRefreshConfig {
    pub fn new(config_path: impl Into<PathBuf>) -> Self {
        Self {
            enabled: true,
            config_path: config_path.into(),
            refresh_interval: REFRESH_INTERVAL,
        }
    }
}

/// Start the registry refresh background job
pub async fn start_registry_refresh(registry: SharedRegistry, config: RegistryRefreshConfig) {
    if !config.enabled {
        tracing::info!("Registry refresh disabled by configuration");
        return;
    }

    tracing::info!(
        path = %config.config_path.display(),
        interval_secs = config.refresh_interval.as_secs(),
        "Starting registry refresh background job"
    );

    loop {
        sleep(config.refresh_interval).await;

        let cycle_start = Instant::now();
        match run_refresh_cycle(&registry, &config).await {
            Ok(()) => {
                tracing::info!(
                    duration_ms = cycle_start.elapsed().as_millis(),
                    "Registry snapshot republished"
                );
            }
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    duration_ms = cycle_start.elapsed().as_millis(),
                    "Registry refresh failed, previous snapshot stays live"
                );
            }
        }
    }
}

/// Run a single refresh cycle
async fn run_refresh_cycle(registry: &SharedRegistry, config: &RegistryRefreshConfig) -> Result<()> {
    let content = tokio::fs::read_to_string(&config.config_path).await?;
    let document = RankingConfigDocument::from_json(&content)?;
    registry.rebuild_from(&document)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = RegistryRefreshConfig::new("/etc/dealspot/ranking.json");
        assert!(config.enabled);
        assert_eq!(config.refresh_interval, Duration::from_secs(300));
        assert_eq!(
            config.config_path,
            PathBuf::from("/etc/dealspot/ranking.json")
        );
    }

    #[tokio::test]
    async fn test_refresh_cycle_swaps_only_on_success() {
        use crate::models::flight::Flight;
        use crate::registry::RegistrySnapshot;

        let initial = RankingConfigDocument {
            flights: vec![Flight {
                id: "Default".to_string(),
                version: 1,
                external_id: None,
                description: None,
            }],
            ..RankingConfigDocument::default()
        };
        let registry = SharedRegistry::new(RegistrySnapshot::build(&initial).unwrap());

        let dir = std::env::temp_dir().join(format!("registry-refresh-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("ranking.json");

        // A malformed document leaves the previous snapshot in place.
        std::fs::write(&path, "{oops").unwrap();
        let config = RegistryRefreshConfig::new(&path);
        assert!(run_refresh_cycle(&registry, &config).await.is_err());
        assert_eq!(registry.load().flights.default_key(), "Default_1");

        // A valid document swaps the snapshot in.
        let mut updated = initial.clone();
        updated.flights.push(Flight {
            id: "Default".to_string(),
            version: 2,
            external_id: None,
            description: None,
        });
        std::fs::write(&path, updated.to_json().unwrap()).unwrap();
        run_refresh_cycle(&registry, &config).await.unwrap();
        assert_eq!(registry.load().flights.default_key(), "Default_2");

        std::fs::remove_dir_all(&dir).ok();
    }
}
