//! Publishing version registry: double-buffered pass records and the
//! active-version rule.

use std::collections::HashMap;

use crate::error::{AppError, Result};
use crate::models::publishing::{PublishingVersion, RankSlot};
use crate::registry::groups::RankingGroupRegistry;

#[derive(Debug, Clone, Default)]
pub struct PublishingVersionRegistry {
    versions: HashMap<u64, PublishingVersion>,
    slot_versions: [Option<u64>; RankSlot::COUNT],
}

impl PublishingVersionRegistry {
    /// Build from pass records, validating sequence contiguity, group
    /// references and slot exclusivity.
    pub fn build(
        versions: &[PublishingVersion],
        groups: &RankingGroupRegistry,
    ) -> Result<Self> {
        let mut by_version = HashMap::new();
        let mut slot_versions: [Option<u64>; RankSlot::COUNT] = [None; RankSlot::COUNT];

        for version in versions {
            for (index, sequence) in version.sequences.keys().enumerate() {
                let expected = (index + 1) as u16;
                if *sequence != expected {
                    return Err(AppError::Configuration(format!(
                        "publishing version {} has a non-contiguous sequence map (expected {}, found {})",
                        version.version, expected, sequence
                    )));
                }
            }

            for group_ref in version.sequences.values() {
                if !groups.contains(group_ref) {
                    return Err(AppError::Configuration(format!(
                        "publishing version {} references unknown ranking group {}",
                        version.version, group_ref
                    )));
                }
            }

            if let (Some(slot), None) = (version.slot, version.retired_at) {
                let occupant = &mut slot_versions[slot.index()];
                if let Some(existing) = occupant {
                    return Err(AppError::Configuration(format!(
                        "rank slot {:?} is claimed by both publishing versions {} and {}",
                        slot, existing, version.version
                    )));
                }
                *occupant = Some(version.version);
            }

            if by_version.insert(version.version, version.clone()).is_some() {
                return Err(AppError::Configuration(format!(
                    "duplicate publishing version {}",
                    version.version
                )));
            }
        }

        Ok(Self {
            versions: by_version,
            slot_versions,
        })
    }

    pub fn get(&self, version: u64) -> Option<&PublishingVersion> {
        self.versions.get(&version)
    }

    /// Non-retired version currently occupying a slot, queryable or not.
    pub fn slot_version(&self, slot: RankSlot) -> Option<&PublishingVersion> {
        self.slot_versions[slot.index()].and_then(|version| self.versions.get(&version))
    }

    /// Queryable version in a slot, if any.
    pub fn queryable_in(&self, slot: RankSlot) -> Option<&PublishingVersion> {
        self.slot_version(slot).filter(|version| version.is_queryable())
    }

    /// The (slot, version) pair queries score against right now. When both
    /// slots hold queryable versions the higher version number wins.
    pub fn active(&self) -> Option<(RankSlot, &PublishingVersion)> {
        [RankSlot::Slot0, RankSlot::Slot1]
            .into_iter()
            .filter_map(|slot| self.queryable_in(slot).map(|version| (slot, version)))
            .max_by_key(|(_, version)| version.version)
    }

    /// Slot the next re-indexing pass should write into: the one opposite
    /// the active version, or `Slot0` on a cold start.
    pub fn staging_slot(&self) -> RankSlot {
        match self.active() {
            Some((slot, _)) => slot.other(),
            None => RankSlot::Slot0,
        }
    }

    pub fn len(&self) -> usize {
        self.versions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.versions.is_empty()
    }
}
