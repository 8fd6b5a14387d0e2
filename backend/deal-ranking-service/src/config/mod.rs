use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub app: AppConfig,
    pub registry: RegistryConfig,
    #[serde(default)]
    pub external_ranks: ExternalRanksConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub env: String,
    pub log_level: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Path of the registry configuration document.
    pub config_path: String,
    #[serde(default = "default_registry_refresh_secs")]
    pub refresh_secs: u64,
    /// Log unmapped client id segments during canonicalization.
    #[serde(default)]
    pub validate_clients: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExternalRanksConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_rank_sync_secs")]
    pub sync_secs: u64,
    #[serde(default = "default_rank_staleness_secs")]
    pub staleness_secs: u64,
}

impl Default for ExternalRanksConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            sync_secs: default_rank_sync_secs(),
            staleness_secs: default_rank_staleness_secs(),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        Ok(Config {
            app: AppConfig {
                env: std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
                log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            },
            registry: RegistryConfig {
                config_path: std::env::var("RANKING_CONFIG_PATH")
                    .unwrap_or_else(|_| "./config/ranking.json".to_string()),
                refresh_secs: std::env::var("REGISTRY_REFRESH_SECS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or_else(default_registry_refresh_secs),
                validate_clients: std::env::var("VALIDATE_CLIENTS")
                    .unwrap_or_else(|_| "false".to_string())
                    .parse()
                    .unwrap_or(false),
            },
            external_ranks: ExternalRanksConfig {
                enabled: std::env::var("EXTERNAL_RANKS_ENABLED")
                    .unwrap_or_else(|_| "false".to_string())
                    .parse()?,
                sync_secs: std::env::var("EXTERNAL_RANKS_SYNC_SECS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or_else(default_rank_sync_secs),
                staleness_secs: std::env::var("EXTERNAL_RANKS_STALENESS_SECS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or_else(default_rank_staleness_secs),
            },
        })
    }
}

impl RegistryConfig {
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_secs)
    }
}

impl ExternalRanksConfig {
    pub fn sync_interval(&self) -> Duration {
        Duration::from_secs(self.sync_secs)
    }

    pub fn staleness(&self) -> Duration {
        Duration::from_secs(self.staleness_secs)
    }
}

fn default_registry_refresh_secs() -> u64 {
    300
}

fn default_rank_sync_secs() -> u64 {
    60
}

fn default_rank_staleness_secs() -> u64 {
    300
}
