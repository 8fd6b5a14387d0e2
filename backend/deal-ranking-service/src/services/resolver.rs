//! Query resolution: from caller identity to a ranking context.
//!
//! `resolve` runs the whole pre-search chain -- sticky flight keys, bucket
//! assignment, placement lookup, active publishing version -- and returns
//! either a ready `QueryRankingContext` or `None` when the query should be
//! served unranked. Configuration inconsistencies that must page someone
//! surface as errors instead.

use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::Result;
use crate::models::client::Client;
use crate::models::deal::Rankable;
use crate::models::publishing::PublishingVersion;
use crate::registry::placements::ResolvedPlacement;
use crate::registry::traffic::FlightAssignment;
use crate::registry::SharedRegistry;
use crate::services::context::{FeaturePlacement, QueryFilters, QueryRankingContext};
use crate::services::external_ranks::ExternalRankCache;
use crate::services::scoring::ScoringEngine;

/// Deals a feature placement shows when its record does not say.
const DEFAULT_FEATURE_DEAL_COUNT: u32 = 3;

/// Entry point for the query-serving layer.
pub struct DealRankingService {
    registry: SharedRegistry,
    scoring: ScoringEngine,
    external_ranks: Arc<ExternalRankCache>,
}

impl DealRankingService {
    pub fn new(registry: SharedRegistry) -> Self {
        Self::with_external_ranks(registry, Arc::new(ExternalRankCache::new()))
    }

    pub fn with_external_ranks(
        registry: SharedRegistry,
        external_ranks: Arc<ExternalRankCache>,
    ) -> Self {
        Self {
            scoring: ScoringEngine::new(external_ranks.clone()),
            registry,
            external_ranks,
        }
    }

    pub fn registry(&self) -> &SharedRegistry {
        &self.registry
    }

    pub fn scoring(&self) -> &ScoringEngine {
        &self.scoring
    }

    pub fn external_ranks(&self) -> &Arc<ExternalRankCache> {
        &self.external_ranks
    }

    /// Canonicalize a raw caller token against the current snapshot.
    pub fn resolve_client(&self, raw: &str, validate: bool) -> Client {
        self.registry.load().clients.resolve(raw, validate)
    }

    /// Build the ranking context for one query.
    ///
    /// `input_flight_keys` are assignments the caller already holds (echoed
    /// back by a previous response); the first one that still exists and
    /// still maps to placements for this client is reused, keeping
    /// experiment membership sticky across a session. `Ok(None)` means the
    /// query should be served without ranking.
    pub fn resolve(
        &self,
        client: &Client,
        user_id: Option<&str>,
        filters: &QueryFilters,
        input_flight_keys: &[String],
        allow_default_fallback: bool,
    ) -> Result<Option<QueryRankingContext>> {
        let snapshot = self.registry.load();

        let mut assignment: Option<FlightAssignment> = None;
        for key in input_flight_keys {
            if !snapshot.flights.contains(key) {
                debug!(flight = %key, "Input flight key no longer configured, ignoring");
                continue;
            }
            if snapshot.placements.resolve(client, key, false)?.is_some() {
                debug!(flight = %key, "Reusing caller's flight assignment");
                assignment = Some(FlightAssignment {
                    flight_key: key.clone(),
                    bucket: None,
                    via_default: false,
                });
                break;
            }
        }

        let assignment = match assignment {
            Some(assignment) => assignment,
            None => snapshot.traffic.resolve_flight(client, user_id, Utc::now()),
        };

        let Some(placements) =
            snapshot
                .placements
                .resolve(client, &assignment.flight_key, allow_default_fallback)?
        else {
            debug!(
                client = %client.key(),
                flight = %assignment.flight_key,
                "No placements for this client and flight, serving unranked"
            );
            return Ok(None);
        };

        let Some((slot, version)) = snapshot.publishing.active() else {
            debug!("No queryable publishing version, serving unranked");
            return Ok(None);
        };

        let Some(default_placement) = placements.default_placement() else {
            warn!(
                client = %client.key(),
                flight = %assignment.flight_key,
                "Placement set has no Default placement, serving unranked"
            );
            return Ok(None);
        };

        let unfiltered = filters.is_empty();
        let Some(default_sequence) = sequence_for(version, default_placement, unfiltered) else {
            warn!(
                group = %default_placement.ranking_group,
                publishing_version = version.version,
                "Default placement's ranking group has no sequence in the active pass, serving unranked"
            );
            return Ok(None);
        };

        let mut placement_names = HashMap::new();
        placement_names.insert(default_sequence, default_placement.name.clone());

        let mut features = Vec::new();
        for placement in placements.feature_placements() {
            let Some(sequence) = sequence_for(version, placement, unfiltered) else {
                debug!(
                    placement = %placement.name,
                    group = %placement.ranking_group,
                    "Feature placement's group has no sequence in the active pass, skipping"
                );
                continue;
            };
            placement_names.insert(sequence, placement.name.clone());
            features.push(FeaturePlacement {
                name: placement.name.clone(),
                sequence,
                deal_count: placement
                    .feature_deal_count
                    .unwrap_or(DEFAULT_FEATURE_DEAL_COUNT),
            });
        }

        Ok(Some(QueryRankingContext {
            flight_key: assignment.flight_key,
            slot,
            publishing_version: version.version,
            default_sequence,
            features,
            placement_names,
            random_selection: default_placement.random_selection,
            randomization_window: default_placement.randomization_window,
            fallback_to_broader_results: default_placement.fallback_to_broader_results,
            default_deals_count: default_placement.default_deals_count,
        }))
    }

    /// Ordering score of one candidate under a resolved context.
    pub fn rank<R: Rankable>(&self, deal: &R, context: &QueryRankingContext) -> u8 {
        context.rank_of(deal)
    }
}

/// Sequence a placement ranks by. Unfiltered queries swap in the group's
/// not-filtered sibling when one is registered in the active pass.
fn sequence_for(
    version: &PublishingVersion,
    placement: &ResolvedPlacement,
    unfiltered: bool,
) -> Option<u16> {
    if unfiltered {
        if let Some(sibling) = &placement.not_filtered_group {
            if let Some(sequence) = version.sequence_of(sibling) {
                return Some(sequence);
            }
        }
    }
    version.sequence_of(&placement.ranking_group)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::allocation::TrafficAllocation;
    use crate::models::client::{ClientApp, ClientId};
    use crate::models::flight::Flight;
    use crate::models::placement::{ClientFlightPlacement, PlacementRules, DEFAULT_PLACEMENT};
    use crate::models::publishing::RankSlot;
    use crate::models::ranking_group::{RankingGroup, RankingGroupRef, RankingRules};
    use crate::registry::{RankingConfigDocument, RegistrySnapshot};
    use std::collections::BTreeMap;

    fn flight(id: &str, version: u32) -> Flight {
        Flight {
            id: id.to_string(),
            version,
            external_id: None,
            description: None,
        }
    }

    fn allocation(client_id: &str, flight_id: &str, percent: u8) -> TrafficAllocation {
        TrafficAllocation {
            client_id: client_id.to_string(),
            client_app: "*".to_string(),
            flight_id: flight_id.to_string(),
            flight_version: 1,
            allocation_version: 1,
            publishing_version: None,
            percent,
            active_from: None,
            active_until: None,
            reseed_interval_secs: None,
        }
    }

    fn placement(
        client_id: &str,
        client_app: &str,
        flight_id: &str,
        name: &str,
        position: u16,
        group: &str,
    ) -> ClientFlightPlacement {
        ClientFlightPlacement {
            client_id: client_id.to_string(),
            client_app: client_app.to_string(),
            flight_id: flight_id.to_string(),
            flight_version: 1,
            placement: name.to_string(),
            position,
            rules: PlacementRules {
                ranking_group: RankingGroupRef::new(group, 1),
                feature_deal_count: Some(5),
                randomization_window: None,
                fallback_to_broader_results: false,
                default_deals_count: None,
            },
        }
    }

    fn group(id: &str, rules: RankingRules) -> RankingGroup {
        RankingGroup {
            id: id.to_string(),
            version: 1,
            rules,
        }
    }

    fn publishing_version(
        version: u64,
        slot: RankSlot,
        queryable: bool,
        group_ids: &[&str],
    ) -> crate::models::publishing::PublishingVersion {
        let now = Utc::now();
        let sequences: BTreeMap<u16, RankingGroupRef> = group_ids
            .iter()
            .enumerate()
            .map(|(index, id)| ((index + 1) as u16, RankingGroupRef::new(*id, 1)))
            .collect();
        crate::models::publishing::PublishingVersion {
            version,
            slot: Some(slot),
            sequences,
            created_at: now,
            replicas_completed_at: queryable.then_some(now),
            retired_at: None,
        }
    }

    /// Full configuration: Skype traffic 100% in Promo, everyone else on
    /// the Default flight.
    fn document() -> RankingConfigDocument {
        RankingConfigDocument {
            clients: Default::default(),
            flights: vec![flight("Default", 1), flight("Promo", 1)],
            allocations: vec![allocation("Skype", "Promo", 100)],
            placements: vec![
                placement("Skype", "*", "Promo", DEFAULT_PLACEMENT, 0, "PromoGroup"),
                placement("Skype", "*", "Promo", "Carousel", 1, "Featured"),
                placement("*", "*", "Default", DEFAULT_PLACEMENT, 0, "General"),
            ],
            ranking_groups: vec![
                group("General", RankingRules::default()),
                group("Featured", RankingRules::default()),
                group(
                    "PromoGroup",
                    RankingRules {
                        not_filtered_group: Some(RankingGroupRef::new("General", 1)),
                        random_selection: true,
                        ..RankingRules::default()
                    },
                ),
            ],
            publishing_versions: vec![publishing_version(
                7,
                RankSlot::Slot0,
                true,
                &["General", "Featured", "PromoGroup"],
            )],
        }
    }

    fn service() -> DealRankingService {
        let snapshot = RegistrySnapshot::build(&document()).unwrap();
        DealRankingService::new(SharedRegistry::new(snapshot))
    }

    fn skype() -> Client {
        Client::new(ClientId::Skype, ClientApp::Android)
    }

    fn filtered() -> QueryFilters {
        QueryFilters {
            query_text: Some("pizza".to_string()),
            ..QueryFilters::default()
        }
    }

    #[test]
    fn test_fully_allocated_client_gets_its_flight() {
        let service = service();
        for user in 0..50 {
            let context = service
                .resolve(&skype(), Some(&format!("user-{user}")), &filtered(), &[], false)
                .unwrap()
                .unwrap();
            assert_eq!(context.flight_key, "Promo_1");
            assert_eq!(context.publishing_version, 7);
            assert_eq!(context.slot, RankSlot::Slot0);
            // PromoGroup sits at sequence 3 in the active pass.
            assert_eq!(context.default_sequence, 3);
        }
    }

    #[test]
    fn test_unfiltered_query_swaps_in_the_sibling_group() {
        let service = service();
        let context = service
            .resolve(&skype(), Some("user-1"), &QueryFilters::default(), &[], false)
            .unwrap()
            .unwrap();
        // Without filters the Default placement ranks with General.
        assert_eq!(context.default_sequence, 1);
        // Group-level settings still come from the configured group.
        assert!(context.random_selection);
    }

    #[test]
    fn test_feature_placements_carry_sequences_and_counts() {
        let service = service();
        let context = service
            .resolve(&skype(), Some("user-1"), &filtered(), &[], false)
            .unwrap()
            .unwrap();

        assert_eq!(context.features.len(), 1);
        let carousel = &context.features[0];
        assert_eq!(carousel.name, "Carousel");
        assert_eq!(carousel.sequence, 2);
        assert_eq!(carousel.deal_count, 5);
        assert_eq!(context.placement_of(2), Some("Carousel"));
        assert_eq!(context.placement_of(3), Some(DEFAULT_PLACEMENT));
    }

    #[test]
    fn test_feature_placement_without_a_count_shows_three_deals() {
        let mut config = document();
        for record in &mut config.placements {
            if record.placement == "Carousel" {
                record.rules.feature_deal_count = None;
            }
        }
        let snapshot = RegistrySnapshot::build(&config).unwrap();
        let service = DealRankingService::new(SharedRegistry::new(snapshot));

        let context = service
            .resolve(&skype(), Some("user-1"), &filtered(), &[], false)
            .unwrap()
            .unwrap();
        assert_eq!(context.features[0].deal_count, 3);
    }

    #[test]
    fn test_unallocated_client_falls_back_to_default_flight() {
        let service = service();
        let bing = Client::new(ClientId::Bing, ClientApp::Web);

        let context = service
            .resolve(&bing, Some("user-1"), &filtered(), &[], false)
            .unwrap()
            .unwrap();
        assert_eq!(context.flight_key, "Default_1");
        assert_eq!(context.default_sequence, 1);
    }

    #[test]
    fn test_flight_without_placements_serves_unranked() {
        let mut config = document();
        // Strip the wildcard Default mapping; Bing then has no placements
        // anywhere.
        config
            .placements
            .retain(|placement| placement.client_id != "*");
        let snapshot = RegistrySnapshot::build(&config).unwrap();
        let service = DealRankingService::new(SharedRegistry::new(snapshot));
        let bing = Client::new(ClientId::Bing, ClientApp::Web);

        let context = service
            .resolve(&bing, Some("user-1"), &filtered(), &[], false)
            .unwrap();
        assert!(context.is_none());
    }

    #[test]
    fn test_missing_default_placements_is_fatal_when_permitted() {
        let mut config = document();
        config
            .placements
            .retain(|placement| placement.client_id != "*");
        let snapshot = RegistrySnapshot::build(&config).unwrap();
        let service = DealRankingService::new(SharedRegistry::new(snapshot));
        let bing = Client::new(ClientId::Bing, ClientApp::Web);

        let err = service
            .resolve(&bing, Some("user-1"), &filtered(), &[], true)
            .unwrap_err();
        assert!(matches!(err, crate::error::AppError::Configuration(_)));
    }

    #[test]
    fn test_sticky_flight_key_is_reused() {
        let service = service();

        // The caller echoes a Promo assignment; it maps to placements, so
        // it wins over a fresh bucket draw.
        let context = service
            .resolve(
                &skype(),
                Some("user-1"),
                &filtered(),
                &["Promo_1".to_string()],
                false,
            )
            .unwrap()
            .unwrap();
        assert_eq!(context.flight_key, "Promo_1");
    }

    #[test]
    fn test_stale_sticky_keys_are_ignored() {
        let service = service();

        // A retired flight key no longer exists; bucket assignment takes
        // over and lands Skype back in Promo.
        let context = service
            .resolve(
                &skype(),
                Some("user-1"),
                &filtered(),
                &["OldExperiment_9".to_string()],
                false,
            )
            .unwrap()
            .unwrap();
        assert_eq!(context.flight_key, "Promo_1");
    }

    #[test]
    fn test_sticky_key_without_placements_is_skipped() {
        let service = service();
        let bing = Client::new(ClientId::Bing, ClientApp::Web);

        // Promo exists but has no placements for Bing; the echoed key is
        // useless and assignment falls through to Default.
        let context = service
            .resolve(
                &bing,
                Some("user-1"),
                &filtered(),
                &["Promo_1".to_string()],
                false,
            )
            .unwrap()
            .unwrap();
        assert_eq!(context.flight_key, "Default_1");
    }

    #[test]
    fn test_no_queryable_version_serves_unranked() {
        let mut config = document();
        config.publishing_versions =
            vec![publishing_version(7, RankSlot::Slot0, false, &["General"])];
        let snapshot = RegistrySnapshot::build(&config).unwrap();
        let service = DealRankingService::new(SharedRegistry::new(snapshot));

        let context = service
            .resolve(&skype(), Some("user-1"), &filtered(), &[], false)
            .unwrap();
        assert!(context.is_none());
    }

    #[test]
    fn test_group_missing_from_pass_serves_unranked() {
        let mut config = document();
        // The active pass indexes only Featured; the Promo default
        // placement's group has no sequence.
        config.publishing_versions =
            vec![publishing_version(7, RankSlot::Slot0, true, &["Featured"])];
        let snapshot = RegistrySnapshot::build(&config).unwrap();
        let service = DealRankingService::new(SharedRegistry::new(snapshot));

        let context = service
            .resolve(&skype(), Some("user-1"), &filtered(), &[], false)
            .unwrap();
        assert!(context.is_none());
    }

    #[test]
    fn test_rank_reads_through_the_context() {
        use crate::models::deal::SlotRanks;

        struct Candidate {
            slots: [SlotRanks; 2],
        }
        impl Rankable for Candidate {
            fn slot_ranks(&self, slot: RankSlot) -> &SlotRanks {
                &self.slots[slot.index()]
            }
        }

        let service = service();
        let context = service
            .resolve(&skype(), Some("user-1"), &filtered(), &[], false)
            .unwrap()
            .unwrap();

        let scored = Candidate {
            slots: [
                SlotRanks { publishing_version: 7, ranks: vec![10, 20, 30] },
                SlotRanks::default(),
            ],
        };
        assert_eq!(service.rank(&scored, &context), 30);

        let stale = Candidate {
            slots: [
                SlotRanks { publishing_version: 6, ranks: vec![10, 20, 30] },
                SlotRanks::default(),
            ],
        };
        assert_eq!(service.rank(&stale, &context), 0);
    }
}
