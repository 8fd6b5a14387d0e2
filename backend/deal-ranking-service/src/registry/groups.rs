//! Ranking group registry with rule state compiled for the query path.

use regex::RegexBuilder;
use std::collections::HashMap;

use crate::error::{AppError, Result};
use crate::models::ranking_group::{RankingGroup, RankingGroupRef};

/// A ranking group with its blacklist patterns compiled once at build time.
#[derive(Debug, Clone)]
pub struct CompiledRankingGroup {
    pub group: RankingGroup,
    pub blacklist: Vec<regex::Regex>,
}

impl CompiledRankingGroup {
    fn compile(group: &RankingGroup) -> Result<Self> {
        let mut blacklist = Vec::new();
        if let Some(patterns) = &group.rules.blacklist_title_patterns {
            for pattern in patterns {
                let compiled = RegexBuilder::new(pattern)
                    .case_insensitive(true)
                    .build()
                    .map_err(|err| {
                        AppError::Configuration(format!(
                            "ranking group {}:{} has invalid blacklist pattern '{}': {}",
                            group.id, group.version, pattern, err
                        ))
                    })?;
                blacklist.push(compiled);
            }
        }
        Ok(Self {
            group: group.clone(),
            blacklist,
        })
    }
}

/// Parsed rule documents keyed by (id, version).
#[derive(Debug, Clone, Default)]
pub struct RankingGroupRegistry {
    groups: HashMap<RankingGroupRef, CompiledRankingGroup>,
}

impl RankingGroupRegistry {
    /// Parse and compile every group document, failing fast on the first
    /// malformed one.
    pub fn build(groups: &[RankingGroup]) -> Result<Self> {
        let mut compiled = HashMap::new();
        for group in groups {
            let entry = CompiledRankingGroup::compile(group)?;
            if compiled.insert(group.group_ref(), entry).is_some() {
                return Err(AppError::Configuration(format!(
                    "duplicate ranking group {}:{}",
                    group.id, group.version
                )));
            }
        }
        Ok(Self { groups: compiled })
    }

    pub fn get(&self, group_ref: &RankingGroupRef) -> Option<&CompiledRankingGroup> {
        self.groups.get(group_ref)
    }

    pub fn contains(&self, group_ref: &RankingGroupRef) -> bool {
        self.groups.contains_key(group_ref)
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}
