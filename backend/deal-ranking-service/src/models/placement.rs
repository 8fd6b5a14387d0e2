//! Placement assignments: which result placements a (client, flight) pair
//! serves, and with which ranking group.

use serde::{Deserialize, Serialize};

use crate::models::flight::flight_key;
use crate::models::ranking_group::RankingGroupRef;

/// Name of the placement carrying the main ranked result list. Feature
/// placements (carousels, spotlight strips) use any other name.
pub const DEFAULT_PLACEMENT: &str = "Default";

/// Per-placement rule settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlacementRules {
    /// Ranking group whose rank bytes order this placement.
    pub ranking_group: RankingGroupRef,
    /// How many deals a feature placement shows.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feature_deal_count: Option<u32>,
    /// Shuffle window size when the ranking group enables random selection.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub randomization_window: Option<u32>,
    /// Widen the result set when the primary one comes back empty.
    #[serde(default)]
    pub fallback_to_broader_results: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_deals_count: Option<u32>,
}

/// Assignment of one placement to a (client pattern, flight) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientFlightPlacement {
    pub client_id: String,
    pub client_app: String,
    pub flight_id: String,
    pub flight_version: u32,
    pub placement: String,
    /// Ordering of this placement within the result layout.
    pub position: u16,
    pub rules: PlacementRules,
}

impl ClientFlightPlacement {
    pub fn client_key(&self) -> String {
        format!("{}_{}", self.client_id, self.client_app)
    }

    pub fn flight_key(&self) -> String {
        flight_key(&self.flight_id, self.flight_version)
    }

    pub fn is_default_placement(&self) -> bool {
        self.placement == DEFAULT_PLACEMENT
    }
}
