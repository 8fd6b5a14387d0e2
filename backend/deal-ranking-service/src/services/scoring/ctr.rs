//! CTR-driven static rank.
//!
//! Measured click-through rates are mapped onto the rank scale
//! logarithmically: rank = 50 + 20 * (log10(ctr) + 4), clamped to [5, 90].
//! That puts a 1e-4 CTR at 50, 1e-2 at 90 and 1e-6 at 10. Deals without
//! enough impressions for a trustworthy CTR draw a deterministic stand-in
//! value instead of defaulting to the bottom of the scale.

use rand::Rng;

use crate::models::deal::DealEngagement;
use crate::utils;

/// Impressions required before a measured CTR is trusted.
pub const MIN_RELIABLE_IMPRESSIONS: u64 = 500;

const CTR_RANK_FLOOR: f64 = 5.0;
const CTR_RANK_CEILING: f64 = 90.0;

/// Stand-in range for deals with too few impressions.
const FALLBACK_RANGE: std::ops::RangeInclusive<f64> = 10.0..=70.0;

/// Map a measured click-through rate onto the rank scale.
pub fn rank_from_ctr(ctr: f64) -> f64 {
    if ctr <= 0.0 {
        return CTR_RANK_FLOOR;
    }
    (50.0 + 20.0 * (ctr.log10() + 4.0)).clamp(CTR_RANK_FLOOR, CTR_RANK_CEILING)
}

/// CTR-driven static rank for a deal.
///
/// With enough impressions the measured CTR decides; below the threshold a
/// uniform stand-in from `fallback_seed` keeps the deal competitive and
/// stable across recomputations of the same pass.
pub fn static_rank_from_ctr(engagement: &DealEngagement, fallback_seed: u64) -> f64 {
    if engagement.impressions >= MIN_RELIABLE_IMPRESSIONS {
        rank_from_ctr(engagement.ctr())
    } else {
        utils::seeded_rng(fallback_seed).gen_range(FALLBACK_RANGE)
    }
}
