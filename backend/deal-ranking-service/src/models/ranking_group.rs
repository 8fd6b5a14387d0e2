//! Ranking groups: versioned bundles of scoring weights and eligibility
//! rules.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::models::deal::DealType;

/// Reference to a ranking group at an exact version.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RankingGroupRef {
    pub id: String,
    pub version: u32,
}

impl RankingGroupRef {
    pub fn new(id: impl Into<String>, version: u32) -> Self {
        Self { id: id.into(), version }
    }
}

impl fmt::Display for RankingGroupRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.id, self.version)
    }
}

/// Minimum acceptable image dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageSize {
    pub width: u32,
    pub height: u32,
}

/// Scoring and eligibility rule set of one ranking group.
///
/// Every field is optional in the serialized form; an absent filter is
/// simply not applied. Weight exceptions are exact-match lookups falling
/// back to `default_weight`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankingRules {
    #[serde(default = "default_weight")]
    pub default_weight: f64,
    #[serde(default)]
    pub provider_weights: HashMap<String, f64>,
    #[serde(default)]
    pub category_weights: HashMap<String, f64>,
    #[serde(default)]
    pub deal_type_weights: HashMap<DealType, f64>,

    // Eligibility filters
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_image_size: Option<ImageSize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_discount: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required_categories: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required_keywords: Option<Vec<String>>,
    /// Case-insensitive regular expressions matched against deal titles and
    /// business names.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blacklist_title_patterns: Option<Vec<String>>,

    /// Sibling group to rank with when the query carries no filters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub not_filtered_group: Option<RankingGroupRef>,
    /// Result pages shuffle within a window instead of strict rank order.
    #[serde(default)]
    pub random_selection: bool,

    // Scoring overrides, strongest first
    #[serde(default)]
    pub pure_ctr: bool,
    #[serde(default)]
    pub randomized_providers: Vec<String>,
    #[serde(default)]
    pub external_ranks: bool,
    /// Collapse the weight to zero when a deal carries only placeholder
    /// imagery.
    #[serde(default)]
    pub require_real_image: bool,
}

impl Default for RankingRules {
    fn default() -> Self {
        Self {
            default_weight: default_weight(),
            provider_weights: HashMap::new(),
            category_weights: HashMap::new(),
            deal_type_weights: HashMap::new(),
            min_image_size: None,
            min_price: None,
            min_discount: None,
            required_categories: None,
            required_keywords: None,
            blacklist_title_patterns: None,
            not_filtered_group: None,
            random_selection: false,
            pure_ctr: false,
            randomized_providers: Vec::new(),
            external_ranks: false,
            require_real_image: false,
        }
    }
}

fn default_weight() -> f64 {
    1.0
}

/// A versioned ranking group document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankingGroup {
    pub id: String,
    pub version: u32,
    #[serde(default)]
    pub rules: RankingRules,
}

impl RankingGroup {
    pub fn group_ref(&self) -> RankingGroupRef {
        RankingGroupRef::new(self.id.clone(), self.version)
    }
}
