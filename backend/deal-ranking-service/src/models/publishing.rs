//! Publishing versions: one record per full re-indexing pass, double
//! buffered across two rank storage slots.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::models::ranking_group::RankingGroupRef;

/// One of the two rank storage positions in the index schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RankSlot {
    Slot0,
    Slot1,
}

impl RankSlot {
    pub const COUNT: usize = 2;

    pub fn index(self) -> usize {
        match self {
            RankSlot::Slot0 => 0,
            RankSlot::Slot1 => 1,
        }
    }

    pub fn other(self) -> RankSlot {
        match self {
            RankSlot::Slot0 => RankSlot::Slot1,
            RankSlot::Slot1 => RankSlot::Slot0,
        }
    }
}

/// Record of one full re-indexing pass.
///
/// The sequence map assigns each participating ranking group a 1-based
/// position in the per-deal rank byte array; positions must stay contiguous
/// so the array can be indexed directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublishingVersion {
    /// Monotonically increasing pass number.
    pub version: u64,
    /// Slot this pass wrote its rank bytes into. Absent while the pass is
    /// still being prepared.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slot: Option<RankSlot>,
    #[serde(default)]
    pub sequences: BTreeMap<u16, RankingGroupRef>,
    pub created_at: DateTime<Utc>,
    /// Set once every index replica has finished the pass.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replicas_completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retired_at: Option<DateTime<Utc>>,
}

impl PublishingVersion {
    /// Queryable once all replicas completed the pass and it has not been
    /// retired.
    pub fn is_queryable(&self) -> bool {
        self.replicas_completed_at.is_some() && self.retired_at.is_none()
    }

    pub fn sequence_count(&self) -> u16 {
        self.sequences.len() as u16
    }

    /// 1-based sequence of a ranking group in this pass, if it participated.
    pub fn sequence_of(&self, group: &RankingGroupRef) -> Option<u16> {
        self.sequences
            .iter()
            .find(|(_, candidate)| *candidate == group)
            .map(|(sequence, _)| *sequence)
    }

    pub fn group_at(&self, sequence: u16) -> Option<&RankingGroupRef> {
        self.sequences.get(&sequence)
    }
}
