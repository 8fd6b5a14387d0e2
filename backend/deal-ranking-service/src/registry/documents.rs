//! Serialized registry configuration.
//!
//! The document set round-trips losslessly through JSON. Deserialization
//! stays permissive; structural validation happens when the registries are
//! built, so a bad document can be inspected after it is rejected.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::Result;
use crate::models::allocation::TrafficAllocation;
use crate::models::client::ClientMappings;
use crate::models::flight::Flight;
use crate::models::placement::ClientFlightPlacement;
use crate::models::publishing::PublishingVersion;
use crate::models::ranking_group::RankingGroup;

/// Complete registry configuration document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RankingConfigDocument {
    #[serde(default)]
    pub clients: ClientMappings,
    #[serde(default)]
    pub flights: Vec<Flight>,
    #[serde(default)]
    pub allocations: Vec<TrafficAllocation>,
    #[serde(default)]
    pub placements: Vec<ClientFlightPlacement>,
    #[serde(default)]
    pub ranking_groups: Vec<RankingGroup>,
    #[serde(default)]
    pub publishing_versions: Vec<PublishingVersion>,
}

impl RankingConfigDocument {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_json(&content)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
