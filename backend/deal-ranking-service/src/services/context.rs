//! Per-query ranking context.
//!
//! Built once per request from the resolved flight, placement set and active
//! publishing version, then dropped with the request. Rank reads through the
//! context are plain array lookups gated on the publishing version.

use std::collections::HashMap;

use crate::models::deal::Rankable;
use crate::models::publishing::RankSlot;

/// Search-time filters accompanying a query.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryFilters {
    pub query_text: Option<String>,
    pub categories: Vec<String>,
    pub market: Option<String>,
}

impl QueryFilters {
    /// True when the query carries no explicit filtering at all; such
    /// queries may rank with a group's not-filtered sibling.
    pub fn is_empty(&self) -> bool {
        self.query_text.as_deref().map_or(true, str::is_empty)
            && self.categories.is_empty()
            && self.market.as_deref().map_or(true, str::is_empty)
    }
}

/// A feature placement resolved to its rank sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeaturePlacement {
    pub name: String,
    /// 1-based sequence of the placement's ranking group in the active pass.
    pub sequence: u16,
    pub deal_count: u32,
}

/// Everything a query needs to order candidate deals.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryRankingContext {
    pub flight_key: String,
    pub slot: RankSlot,
    pub publishing_version: u64,
    /// Sequence of the Default placement's ranking group; the main result
    /// list orders by this position.
    pub default_sequence: u16,
    pub features: Vec<FeaturePlacement>,
    /// Sequence -> placement name, covering the default and every feature.
    pub placement_names: HashMap<u16, String>,
    pub random_selection: bool,
    pub randomization_window: Option<u32>,
    pub fallback_to_broader_results: bool,
    pub default_deals_count: Option<u32>,
}

impl QueryRankingContext {
    /// Ordering score for the main result list.
    pub fn rank_of<R: Rankable>(&self, deal: &R) -> u8 {
        self.rank_at(deal, self.default_sequence)
    }

    /// Rank byte at an arbitrary sequence.
    ///
    /// Bytes computed under a different publishing version read as zero, so
    /// deals not yet re-scored by the active pass sink instead of carrying
    /// stale positions.
    pub fn rank_at<R: Rankable>(&self, deal: &R, sequence: u16) -> u8 {
        let ranks = deal.slot_ranks(self.slot);
        if ranks.publishing_version != self.publishing_version {
            return 0;
        }
        ranks.rank_at(sequence)
    }

    pub fn placement_of(&self, sequence: u16) -> Option<&str> {
        self.placement_names.get(&sequence).map(String::as_str)
    }
}
