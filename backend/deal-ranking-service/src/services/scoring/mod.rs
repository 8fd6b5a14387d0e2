//! Rank computation.
//!
//! For every (deal, ranking group) pair the engine derives one byte: the
//! deal's static rank is adjusted by content heuristics, multiplied by the
//! group's exception weights, optionally replaced by a single override
//! (CTR-driven, randomized, or externally supplied), floored to a byte and
//! finally zeroed for ineligible deals. Identical inputs always produce the
//! identical byte; randomized values are seeded from the deal, the group and
//! the publishing version.

pub mod ctr;
pub mod eligibility;

use rand::Rng;
use std::sync::Arc;
use tracing::warn;

use crate::models::deal::{Deal, DealProjection, LocationType, SlotRanks};
use crate::models::publishing::PublishingVersion;
use crate::models::ranking_group::RankingGroupRef;
use crate::registry::groups::{CompiledRankingGroup, RankingGroupRegistry};
use crate::services::external_ranks::ExternalRankCache;
use crate::utils;

/// Countries whose catalogs skip the long-description bonus.
const DESCRIPTION_BONUS_EXCLUDED: [&str; 5] = ["CN", "JP", "HK", "TW", "KR"];

/// Minimum edge length for the image-quality bonus.
const IMAGE_BONUS_MIN_EDGE: u32 = 250;

/// Description length that earns the description bonus.
const DESCRIPTION_BONUS_MIN_CHARS: usize = 100;

/// Discount thresholds granting one bonus point each.
const DISCOUNT_BONUS_STEPS: [f64; 2] = [25.0, 40.0];

/// Range of the stand-in rank drawn for randomized providers.
const RANDOMIZED_RANK_RANGE: std::ops::RangeInclusive<f64> = 10.0..=90.0;

/// Static rank after content heuristics, before weighting.
///
/// Deals with no location information lose half their editorial rank; small
/// bonuses reward steep discounts, presentable imagery and substantial
/// descriptions. The result stays within [0, 100].
pub fn adjusted_static_rank(deal: &Deal) -> f64 {
    let mut rank = deal.static_rank as f64;

    if deal.location_type == LocationType::NotSpecified {
        rank /= 2.0;
    }

    if let Some(discount) = deal.discount_percent {
        for step in DISCOUNT_BONUS_STEPS {
            if discount >= step {
                rank += 1.0;
            }
        }
    }

    if deal
        .images
        .iter()
        .any(|image| image.meets(IMAGE_BONUS_MIN_EDGE, IMAGE_BONUS_MIN_EDGE))
    {
        rank += 1.0;
    }

    let description_qualifies = deal.description.chars().count() > DESCRIPTION_BONUS_MIN_CHARS
        && deal.primary_country().map_or(true, |country| {
            !DESCRIPTION_BONUS_EXCLUDED
                .iter()
                .any(|excluded| excluded.eq_ignore_ascii_case(country))
        });
    if description_qualifies {
        rank += 1.0;
    }

    rank.clamp(0.0, 100.0)
}

pub struct ScoringEngine {
    external_ranks: Arc<ExternalRankCache>,
}

impl ScoringEngine {
    pub fn new(external_ranks: Arc<ExternalRankCache>) -> Self {
        Self { external_ranks }
    }

    /// Rank byte for one deal under one ranking group.
    pub fn compute_rank(
        &self,
        deal: &Deal,
        group: &CompiledRankingGroup,
        publishing_version: u64,
    ) -> u8 {
        if !eligibility::is_eligible(deal, group) {
            return 0;
        }

        let rules = &group.group.rules;
        let weight = self.weight_for(deal, group);

        // At most one override applies; CTR wins over randomization, which
        // wins over external ranks.
        let (static_rank, weight) = if rules.pure_ctr {
            let seed = override_seed(deal, group, publishing_version, "ctr");
            let collapsed = if weight > 0.0 { 1.0 } else { 0.0 };
            (ctr::static_rank_from_ctr(&deal.engagement, seed), collapsed)
        } else if rules.randomized_providers.contains(&deal.provider) {
            let seed = override_seed(deal, group, publishing_version, "randomized");
            let drawn = utils::seeded_rng(seed).gen_range(RANDOMIZED_RANK_RANGE);
            (drawn, weight)
        } else if rules.external_ranks {
            (self.external_ranks.rank_for(deal.id) as f64, weight)
        } else {
            (adjusted_static_rank(deal), weight)
        };

        (static_rank * weight).floor().clamp(0.0, 255.0) as u8
    }

    /// Multiplicative weight: provider, category and deal type exceptions,
    /// each falling back to the group default. A real-image requirement
    /// collapses the weight of placeholder-only deals to zero.
    fn weight_for(&self, deal: &Deal, group: &CompiledRankingGroup) -> f64 {
        let rules = &group.group.rules;
        let default = rules.default_weight;

        let provider = rules
            .provider_weights
            .get(&deal.provider)
            .copied()
            .unwrap_or(default);

        let category = deal
            .categories
            .iter()
            .find_map(|category| rules.category_weights.get(category))
            .copied()
            .unwrap_or(default);

        let deal_type = rules
            .deal_type_weights
            .get(&deal.deal_type)
            .copied()
            .unwrap_or(default);

        let mut weight = provider * category * deal_type;
        if rules.require_real_image && !deal.has_real_image() {
            weight = 0.0;
        }
        weight
    }

    /// Full rank array for one pass: one byte per registered sequence.
    pub fn compute_slot_ranks(
        &self,
        deal: &Deal,
        version: &PublishingVersion,
        groups: &RankingGroupRegistry,
    ) -> SlotRanks {
        let mut ranks = SlotRanks::new(version.version, version.sequence_count());
        for (sequence, group_ref) in &version.sequences {
            let Some(position) = (*sequence as usize).checked_sub(1) else {
                continue;
            };
            match (groups.get(group_ref), ranks.ranks.get_mut(position)) {
                (Some(group), Some(stored)) => {
                    *stored = self.compute_rank(deal, group, version.version);
                }
                (None, _) => {
                    warn!(
                        group = %group_ref,
                        publishing_version = version.version,
                        "Sequence references an unregistered ranking group, leaving rank 0"
                    );
                }
                _ => {}
            }
        }
        ranks
    }

    /// Recompute a projection's whole array for one pass and store it in
    /// that pass's slot. Returns whether the stored bytes changed.
    pub fn refresh_projection(
        &self,
        projection: &mut DealProjection,
        deal: &Deal,
        version: &PublishingVersion,
        groups: &RankingGroupRegistry,
    ) -> bool {
        let Some(slot) = version.slot else {
            warn!(
                publishing_version = version.version,
                "Pass has no slot assignment, skipping rank refresh"
            );
            return false;
        };
        let ranks = self.compute_slot_ranks(deal, version, groups);
        projection.replace_slot_ranks(slot, ranks)
    }

    /// Recompute a single sequence position on a projection.
    ///
    /// Used by incremental updates when one ranking group's rules change;
    /// other positions keep their bytes. Returns whether the stored state
    /// changed.
    pub fn refresh_sequence(
        &self,
        projection: &mut DealProjection,
        deal: &Deal,
        version: &PublishingVersion,
        group_ref: &RankingGroupRef,
        groups: &RankingGroupRegistry,
    ) -> bool {
        let Some(slot) = version.slot else {
            warn!(
                publishing_version = version.version,
                "Pass has no slot assignment, skipping rank refresh"
            );
            return false;
        };
        let Some(sequence) = version.sequence_of(group_ref) else {
            warn!(
                group = %group_ref,
                publishing_version = version.version,
                "Group has no sequence in this pass, skipping rank refresh"
            );
            return false;
        };
        let Some(group) = groups.get(group_ref) else {
            warn!(group = %group_ref, "Unknown ranking group, skipping rank refresh");
            return false;
        };

        let value = self.compute_rank(deal, group, version.version);
        projection.update_rank(slot, version.version, sequence, value, version.sequence_count())
    }
}

fn override_seed(
    deal: &Deal,
    group: &CompiledRankingGroup,
    publishing_version: u64,
    salt: &str,
) -> u64 {
    utils::stable_hash(&(
        deal.id,
        publishing_version,
        group.group.id.as_str(),
        group.group.version,
        salt,
    ))
}
