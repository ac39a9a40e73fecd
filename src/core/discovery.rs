//! Discovery propagation: unlocking clues and gated areas.
//!
//! Propagation is idempotent. Each call returns exactly the clues (or
//! areas) that were newly added, so a second call with the same source
//! returns an empty set.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::content::{
    AreaId, CharacterId, ClueId, DetailId, DiscoveryCondition, LocationId, ObjectId, Story,
};
use crate::core::ledger::gating_check;
use crate::core::progress::{Effect, Mutation, PlayerProgress};

/// The event that may unlock clues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum DiscoverySource {
    /// A character reached `level`.
    Character {
        character_id: CharacterId,
        level: u32,
    },
    /// A detail was observed in an area.
    Detail {
        location_id: Option<LocationId>,
        area_id: AreaId,
        detail_id: DetailId,
    },
    /// An object's knowledge level reached `level`.
    ObjectLevel { object_id: ObjectId, level: u32 },
}

impl DiscoveryCondition {
    /// Whether this condition is satisfied by `source`.
    pub fn matches(&self, source: &DiscoverySource) -> bool {
        match (self, source) {
            (
                DiscoveryCondition::Character {
                    character_id,
                    min_level,
                },
                DiscoverySource::Character {
                    character_id: src,
                    level,
                },
            ) => character_id == src && min_level.is_none_or(|min| *level >= min),
            (
                DiscoveryCondition::Detail {
                    location_id,
                    area_id,
                    detail_id,
                },
                DiscoverySource::Detail {
                    location_id: src_location,
                    area_id: src_area,
                    detail_id: src_detail,
                },
            ) => {
                detail_id == src_detail
                    && area_id.is_none_or(|a| a == *src_area)
                    && location_id.is_none_or(|l| Some(l) == *src_location)
            }
            (
                DiscoveryCondition::ObjectLevel {
                    object_id,
                    min_level,
                },
                DiscoverySource::ObjectLevel {
                    object_id: src,
                    level,
                },
            ) => object_id == src && level >= min_level,
            _ => false,
        }
    }
}

/// Finds and records newly unlocked content.
#[derive(Debug, Clone, Copy)]
pub struct Propagator<'a> {
    story: &'a Story,
}

impl<'a> Propagator<'a> {
    pub fn new(story: &'a Story) -> Self {
        Self { story }
    }

    /// Clues a source would unlock that are not yet discovered.
    pub fn candidates(&self, progress: &PlayerProgress, source: &DiscoverySource) -> BTreeSet<ClueId> {
        self.story
            .clues
            .iter()
            .filter(|clue| !progress.discovered_clues.contains(&clue.id))
            .filter(|clue| clue.discovery_conditions.iter().any(|c| c.matches(source)))
            .map(|clue| clue.id)
            .collect()
    }

    /// Discover every clue unlocked by `source` and return the new ones.
    pub fn propagate(
        &self,
        progress: &mut PlayerProgress,
        source: &DiscoverySource,
    ) -> BTreeSet<ClueId> {
        let discovered: BTreeSet<ClueId> = self
            .candidates(progress, source)
            .into_iter()
            .filter(|&clue_id| {
                progress.apply(&Mutation::DiscoverClue { clue_id }) == Effect::Changed
            })
            .collect();

        if !discovered.is_empty() {
            tracing::info!(?source, clues = ?discovered, "clues discovered");
        }
        discovered
    }

    /// Discover gated areas of known locations whose specialization gate is
    /// now met. Ungated areas are discovered when their location is entered.
    pub fn unlock_areas(&self, progress: &mut PlayerProgress) -> BTreeSet<AreaId> {
        let unlockable: Vec<AreaId> = self
            .story
            .locations
            .iter()
            .filter(|l| progress.discovered_locations.contains(&l.id))
            .flat_map(|l| l.areas.iter())
            .filter(|a| !a.specialization_required.is_empty())
            .filter(|a| !progress.discovered_areas.contains(&a.id))
            .filter(|a| gating_check(progress, &a.specialization_required))
            .map(|a| a.id)
            .collect();

        let unlocked: BTreeSet<AreaId> = unlockable
            .into_iter()
            .filter(|&area_id| progress.apply(&Mutation::DiscoverArea { area_id }) == Effect::Changed)
            .collect();

        if !unlocked.is_empty() {
            tracing::info!(areas = ?unlocked, "areas unlocked by specialization");
        }
        unlocked
    }
}
