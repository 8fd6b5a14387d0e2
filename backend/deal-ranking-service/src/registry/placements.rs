//! Placement assignment index: which placements a (client, flight) pair
//! serves, with per-placement settings pre-extracted for the query path.

use std::collections::HashMap;
use tracing::debug;

use crate::error::{AppError, Result};
use crate::models::allocation::WILDCARD;
use crate::models::client::Client;
use crate::models::placement::{ClientFlightPlacement, DEFAULT_PLACEMENT};
use crate::models::ranking_group::RankingGroupRef;
use crate::registry::flights::FlightRegistry;
use crate::registry::groups::RankingGroupRegistry;

/// One placement with everything the query path needs, resolved at build
/// time so queries never parse rule documents.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedPlacement {
    pub name: String,
    pub position: u16,
    pub ranking_group: RankingGroupRef,
    pub feature_deal_count: Option<u32>,
    pub randomization_window: Option<u32>,
    pub fallback_to_broader_results: bool,
    pub default_deals_count: Option<u32>,
    /// Lifted out of the referenced ranking group.
    pub random_selection: bool,
    /// Sibling group to use when the query carries no filters.
    pub not_filtered_group: Option<RankingGroupRef>,
}

/// Placements of one (client pattern, flight) pair, ordered by position.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlacementSet {
    pub placements: Vec<ResolvedPlacement>,
}

impl PlacementSet {
    /// The placement carrying the main ranked list.
    pub fn default_placement(&self) -> Option<&ResolvedPlacement> {
        self.placements
            .iter()
            .find(|placement| placement.name == DEFAULT_PLACEMENT)
    }

    /// Every placement other than the main list, in layout order.
    pub fn feature_placements(&self) -> impl Iterator<Item = &ResolvedPlacement> {
        self.placements
            .iter()
            .filter(|placement| placement.name != DEFAULT_PLACEMENT)
    }

    pub fn len(&self) -> usize {
        self.placements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.placements.is_empty()
    }
}

#[derive(Debug, Clone, Default)]
pub struct PlacementAssignmentIndex {
    /// Client key pattern -> flight key -> placements.
    sets: HashMap<String, HashMap<String, PlacementSet>>,
    default_flight_key: String,
}

impl PlacementAssignmentIndex {
    /// Build from placement records, resolving every ranking group reference
    /// up front.
    pub fn build(
        placements: &[ClientFlightPlacement],
        flights: &FlightRegistry,
        groups: &RankingGroupRegistry,
    ) -> Result<Self> {
        let mut sets: HashMap<String, HashMap<String, PlacementSet>> = HashMap::new();

        for record in placements {
            if !flights.contains(&record.flight_key()) {
                return Err(AppError::Configuration(format!(
                    "placement '{}' for '{}' references unknown flight '{}'",
                    record.placement,
                    record.client_key(),
                    record.flight_key()
                )));
            }
            let compiled = groups.get(&record.rules.ranking_group).ok_or_else(|| {
                AppError::Configuration(format!(
                    "placement '{}' for '{}'/'{}' references unknown ranking group {}",
                    record.placement,
                    record.client_key(),
                    record.flight_key(),
                    record.rules.ranking_group
                ))
            })?;

            let resolved = ResolvedPlacement {
                name: record.placement.clone(),
                position: record.position,
                ranking_group: record.rules.ranking_group.clone(),
                feature_deal_count: record.rules.feature_deal_count,
                randomization_window: record.rules.randomization_window,
                fallback_to_broader_results: record.rules.fallback_to_broader_results,
                default_deals_count: record.rules.default_deals_count,
                random_selection: compiled.group.rules.random_selection,
                not_filtered_group: compiled.group.rules.not_filtered_group.clone(),
            };

            let set = sets
                .entry(record.client_key())
                .or_default()
                .entry(record.flight_key())
                .or_default();
            if set.placements.iter().any(|existing| existing.name == resolved.name) {
                return Err(AppError::Configuration(format!(
                    "duplicate placement '{}' for '{}'/'{}'",
                    resolved.name,
                    record.client_key(),
                    record.flight_key()
                )));
            }
            set.placements.push(resolved);
        }

        for flights_of_client in sets.values_mut() {
            for set in flights_of_client.values_mut() {
                set.placements
                    .sort_by(|a, b| a.position.cmp(&b.position).then_with(|| a.name.cmp(&b.name)));
            }
        }

        Ok(Self {
            sets,
            default_flight_key: flights.default_key().to_string(),
        })
    }

    /// Placement set for a client and flight.
    ///
    /// Client keys are tried from most to least specific. When no level
    /// matches and the caller permits it, the walk repeats against the
    /// Default flight; a missing Default mapping at that point is a fatal
    /// configuration error rather than an empty result.
    pub fn resolve(
        &self,
        client: &Client,
        flight_key: &str,
        allow_default_fallback: bool,
    ) -> Result<Option<&PlacementSet>> {
        if let Some(set) = self.lookup(client, flight_key) {
            return Ok(Some(set));
        }

        if !allow_default_fallback {
            debug!(client = %client.key(), flight = %flight_key, "No placements at any client level");
            return Ok(None);
        }

        match self.lookup(client, &self.default_flight_key) {
            Some(set) => {
                debug!(
                    client = %client.key(),
                    flight = %flight_key,
                    fallback = %self.default_flight_key,
                    "Using Default flight placements"
                );
                Ok(Some(set))
            }
            None => Err(AppError::Configuration(format!(
                "no placements configured for the Default flight '{}'",
                self.default_flight_key
            ))),
        }
    }

    fn lookup(&self, client: &Client, flight_key: &str) -> Option<&PlacementSet> {
        let candidate_keys = [
            client.key(),
            format!("{}_{}", client.id.as_str(), WILDCARD),
            format!("{}_{}", WILDCARD, WILDCARD),
        ];
        candidate_keys.iter().find_map(|key| {
            self.sets
                .get(key)
                .and_then(|flights_of_client| flights_of_client.get(flight_key))
        })
    }
}
