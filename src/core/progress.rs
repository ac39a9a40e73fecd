//! Per-session player progress and the closed set of mutations on it.
//!
//! `PlayerProgress` is the only mutable state in the engine. It changes
//! exclusively through [`PlayerProgress::apply`], which enforces the
//! progress invariants:
//!
//! - character and object levels never decrease
//! - inventory, clues, locations, areas and observations are sets
//! - an interaction key is credited at most once per session
//! - specialization level is recomputed from points on every credit
//!
//! Every mutation that changes something appends an [`ActionRecord`] to the
//! append-only history.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::content::{
    level_for, AreaId, CharacterId, ClueId, DetailId, LocationId, ObjectId, TriggerId,
};

/// Interaction types used in credit keys.
pub mod interaction {
    pub const CHARACTERS: &str = "characters";
    pub const CLUES: &str = "clues";
    pub const OBJECTS: &str = "objects";
    pub const AREAS: &str = "areas";
}

/// Authoritative progress for one game session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlayerProgress {
    pub session_id: String,
    pub player_id: String,
    pub story_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub inventory: BTreeSet<ObjectId>,
    #[serde(default)]
    pub object_levels: BTreeMap<ObjectId, u32>,
    #[serde(default)]
    pub character_levels: BTreeMap<CharacterId, u32>,
    #[serde(default)]
    pub discovered_clues: BTreeSet<ClueId>,
    #[serde(default)]
    pub discovered_locations: BTreeSet<LocationId>,
    #[serde(default)]
    pub discovered_areas: BTreeSet<AreaId>,
    /// Details the player has looked at, per area.
    #[serde(default)]
    pub last_seen_details: BTreeMap<AreaId, BTreeSet<DetailId>>,
    #[serde(default)]
    pub specialization_points: BTreeMap<String, u32>,
    #[serde(default)]
    pub specialization_levels: BTreeMap<String, u32>,
    /// Credited interaction keys: interaction type to interaction ids.
    #[serde(default)]
    pub completed_interactions: BTreeMap<String, BTreeSet<String>>,
    /// Open defensive challenges: character to the trigger that opened it.
    #[serde(default)]
    pub pending_challenges: BTreeMap<CharacterId, TriggerId>,
    #[serde(default)]
    pub scanned_codes: BTreeSet<String>,
    #[serde(default)]
    pub action_history: Vec<ActionRecord>,
}

impl PlayerProgress {
    /// Create empty progress for a new session.
    pub fn new(
        session_id: impl Into<String>,
        player_id: impl Into<String>,
        story_id: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            session_id: session_id.into(),
            player_id: player_id.into(),
            story_id: story_id.into(),
            created_at: now,
            updated_at: now,
            inventory: BTreeSet::new(),
            object_levels: BTreeMap::new(),
            character_levels: BTreeMap::new(),
            discovered_clues: BTreeSet::new(),
            discovered_locations: BTreeSet::new(),
            discovered_areas: BTreeSet::new(),
            last_seen_details: BTreeMap::new(),
            specialization_points: BTreeMap::new(),
            specialization_levels: BTreeMap::new(),
            completed_interactions: BTreeMap::new(),
            pending_challenges: BTreeMap::new(),
            scanned_codes: BTreeSet::new(),
            action_history: Vec::new(),
        }
    }

    pub fn character_level(&self, id: CharacterId) -> u32 {
        self.character_levels.get(&id).copied().unwrap_or(0)
    }

    pub fn object_level(&self, id: ObjectId) -> u32 {
        self.object_levels.get(&id).copied().unwrap_or(0)
    }

    pub fn has_object(&self, id: ObjectId) -> bool {
        self.inventory.contains(&id)
    }

    /// Whether `detail` was seen in `area`, or in any area when `area` is
    /// `None`.
    pub fn has_seen_detail(&self, area: Option<AreaId>, detail: DetailId) -> bool {
        match area {
            Some(area) => self
                .last_seen_details
                .get(&area)
                .is_some_and(|seen| seen.contains(&detail)),
            None => self
                .last_seen_details
                .values()
                .any(|seen| seen.contains(&detail)),
        }
    }

    pub fn specialization_level(&self, category: &str) -> u32 {
        self.specialization_levels
            .get(category)
            .copied()
            .unwrap_or(0)
    }

    pub fn specialization_points(&self, category: &str) -> u32 {
        self.specialization_points
            .get(category)
            .copied()
            .unwrap_or(0)
    }

    pub fn is_completed(&self, interaction_type: &str, interaction_id: &str) -> bool {
        self.completed_interactions
            .get(interaction_type)
            .is_some_and(|ids| ids.contains(interaction_id))
    }

    pub fn pending_challenge(&self, character: CharacterId) -> Option<TriggerId> {
        self.pending_challenges.get(&character).copied()
    }

    /// Append an audit entry that is not tied to a state change.
    pub fn record(&mut self, action_type: ActionType, details: Option<String>) {
        self.action_history
            .push(ActionRecord::new(action_type, details));
        self.updated_at = Utc::now();
    }

    /// Apply one mutation, enforcing the progress invariants.
    ///
    /// Mutations that would violate an invariant (lowering a level,
    /// re-adding to a set, re-crediting a key) are silent no-ops and return
    /// [`Effect::Unchanged`].
    pub fn apply(&mut self, mutation: &Mutation) -> Effect {
        let effect = match mutation {
            Mutation::AddToInventory { object_id } => changed(self.inventory.insert(*object_id)),
            Mutation::DiscoverClue { clue_id } => changed(self.discovered_clues.insert(*clue_id)),
            Mutation::SetCharacterLevel {
                character_id,
                level,
            } => {
                let current = self.character_level(*character_id);
                if *level > current {
                    self.character_levels.insert(*character_id, *level);
                    Effect::Changed
                } else {
                    Effect::Unchanged
                }
            }
            Mutation::RaiseObjectLevel { object_id, level } => {
                if self.has_object(*object_id) && *level > self.object_level(*object_id) {
                    self.object_levels.insert(*object_id, *level);
                    Effect::Changed
                } else {
                    Effect::Unchanged
                }
            }
            Mutation::CreditSpecialization {
                category,
                points,
                interaction_type,
                interaction_id,
                thresholds,
            } => {
                if self.is_completed(interaction_type, interaction_id) {
                    Effect::Unchanged
                } else {
                    self.completed_interactions
                        .entry(interaction_type.clone())
                        .or_default()
                        .insert(interaction_id.clone());
                    let total = self
                        .specialization_points
                        .entry(category.clone())
                        .or_insert(0);
                    *total = total.saturating_add(*points);
                    let new_level = level_for(thresholds, *total);
                    let old_level = self
                        .specialization_levels
                        .insert(category.clone(), new_level)
                        .unwrap_or(0);
                    Effect::Credited {
                        leveled_up: new_level > old_level,
                        new_level,
                    }
                }
            }
            Mutation::RecordObservation { area_id, detail_id } => changed(
                self.last_seen_details
                    .entry(*area_id)
                    .or_default()
                    .insert(*detail_id),
            ),
            Mutation::DiscoverLocation { location_id } => {
                changed(self.discovered_locations.insert(*location_id))
            }
            Mutation::DiscoverArea { area_id } => changed(self.discovered_areas.insert(*area_id)),
            Mutation::OpenChallenge {
                character_id,
                trigger_id,
            } => changed(
                self.pending_challenges.insert(*character_id, *trigger_id) != Some(*trigger_id),
            ),
            Mutation::CloseChallenge { character_id } => {
                changed(self.pending_challenges.remove(character_id).is_some())
            }
            Mutation::RecordScan { code } => changed(self.scanned_codes.insert(code.clone())),
        };

        if effect.is_changed() {
            self.action_history.push(ActionRecord::new(
                mutation.action_type(),
                Some(mutation.details()),
            ));
            self.updated_at = Utc::now();
        }

        effect
    }
}

fn changed(inserted: bool) -> Effect {
    if inserted {
        Effect::Changed
    } else {
        Effect::Unchanged
    }
}

/// The closed set of state changes the engine can make.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mutation", rename_all = "snake_case")]
pub enum Mutation {
    AddToInventory {
        object_id: ObjectId,
    },
    DiscoverClue {
        clue_id: ClueId,
    },
    SetCharacterLevel {
        character_id: CharacterId,
        level: u32,
    },
    /// Only applies to objects already in the inventory.
    RaiseObjectLevel {
        object_id: ObjectId,
        level: u32,
    },
    CreditSpecialization {
        category: String,
        points: u32,
        interaction_type: String,
        interaction_id: String,
        /// The category's ascending thresholds, used to recompute its level.
        thresholds: Vec<u32>,
    },
    RecordObservation {
        area_id: AreaId,
        detail_id: DetailId,
    },
    DiscoverLocation {
        location_id: LocationId,
    },
    DiscoverArea {
        area_id: AreaId,
    },
    OpenChallenge {
        character_id: CharacterId,
        trigger_id: TriggerId,
    },
    CloseChallenge {
        character_id: CharacterId,
    },
    RecordScan {
        code: String,
    },
}

impl Mutation {
    fn action_type(&self) -> ActionType {
        match self {
            Self::AddToInventory { .. } => ActionType::ObjectCollected,
            Self::DiscoverClue { .. } => ActionType::ClueDiscovered,
            Self::SetCharacterLevel { .. } => ActionType::CharacterEvolved,
            Self::RaiseObjectLevel { .. } => ActionType::ObjectExamined,
            Self::CreditSpecialization { .. } => ActionType::SpecializationCredited,
            Self::RecordObservation { .. } => ActionType::DetailObserved,
            Self::DiscoverLocation { .. } => ActionType::LocationDiscovered,
            Self::DiscoverArea { .. } => ActionType::AreaDiscovered,
            Self::OpenChallenge { .. } => ActionType::ChallengeOpened,
            Self::CloseChallenge { .. } => ActionType::ChallengeClosed,
            Self::RecordScan { .. } => ActionType::CodeScanned,
        }
    }

    fn details(&self) -> String {
        match self {
            Self::AddToInventory { object_id } => format!("object={}", object_id),
            Self::DiscoverClue { clue_id } => format!("clue={}", clue_id),
            Self::SetCharacterLevel {
                character_id,
                level,
            } => format!("character={} level={}", character_id, level),
            Self::RaiseObjectLevel { object_id, level } => {
                format!("object={} level={}", object_id, level)
            }
            Self::CreditSpecialization {
                category,
                points,
                interaction_type,
                interaction_id,
                ..
            } => format!(
                "category={} points={} key={}/{}",
                category, points, interaction_type, interaction_id
            ),
            Self::RecordObservation { area_id, detail_id } => {
                format!("area={} detail={}", area_id, detail_id)
            }
            Self::DiscoverLocation { location_id } => format!("location={}", location_id),
            Self::DiscoverArea { area_id } => format!("area={}", area_id),
            Self::OpenChallenge {
                character_id,
                trigger_id,
            } => format!("character={} trigger={}", character_id, trigger_id),
            Self::CloseChallenge { character_id } => format!("character={}", character_id),
            Self::RecordScan { code } => format!("code={}", code),
        }
    }
}

/// What a mutation did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    /// Nothing changed; the mutation was a no-op under the invariants.
    Unchanged,
    Changed,
    /// Points were added for a new interaction key.
    Credited { leveled_up: bool, new_level: u32 },
}

impl Effect {
    pub fn is_changed(&self) -> bool {
        !matches!(self, Self::Unchanged)
    }
}

/// One entry in the append-only action history.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ActionRecord {
    pub action_type: ActionType,
    pub timestamp: DateTime<Utc>,
    pub details: Option<String>,
}

impl ActionRecord {
    pub fn new(action_type: ActionType, details: Option<String>) -> Self {
        Self {
            action_type,
            timestamp: Utc::now(),
            details,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    SessionCreated,
    ObjectCollected,
    ObjectExamined,
    ClueDiscovered,
    CharacterEvolved,
    SpecializationCredited,
    DetailObserved,
    LocationDiscovered,
    AreaDiscovered,
    ChallengeOpened,
    ChallengeClosed,
    CodeScanned,
    /// A trigger matched and its requirements held.
    TriggerSucceeded,
    /// A trigger matched but a requirement or gate was unmet.
    TriggerFailed,
    AccessDenied,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn progress() -> PlayerProgress {
        PlayerProgress::new("s-1", "player", "manor")
    }

    fn credit(points: u32, id: &str) -> Mutation {
        Mutation::CreditSpecialization {
            category: "analysis".into(),
            points,
            interaction_type: interaction::CLUES.into(),
            interaction_id: id.into(),
            thresholds: vec![15, 40],
        }
    }

    #[test]
    fn test_new_progress_is_empty() {
        let p = progress();
        assert_eq!(p.session_id, "s-1");
        assert_eq!(p.character_level(1), 0);
        assert!(p.inventory.is_empty());
        assert!(p.action_history.is_empty());
    }

    #[test]
    fn test_inventory_is_a_set() {
        let mut p = progress();
        let m = Mutation::AddToInventory { object_id: 10 };
        assert_eq!(p.apply(&m), Effect::Changed);
        assert_eq!(p.apply(&m), Effect::Unchanged);
        assert_eq!(p.inventory.len(), 1);
        // Only the effective apply is audited
        assert_eq!(p.action_history.len(), 1);
        assert_eq!(p.action_history[0].action_type, ActionType::ObjectCollected);
    }

    #[test]
    fn test_lower_character_level_is_noop() {
        let mut p = progress();
        p.apply(&Mutation::SetCharacterLevel {
            character_id: 1,
            level: 2,
        });
        let effect = p.apply(&Mutation::SetCharacterLevel {
            character_id: 1,
            level: 1,
        });
        assert_eq!(effect, Effect::Unchanged);
        assert_eq!(p.character_level(1), 2);
    }

    #[test]
    fn test_object_level_requires_inventory() {
        let mut p = progress();
        let raise = Mutation::RaiseObjectLevel {
            object_id: 10,
            level: 1,
        };
        assert_eq!(p.apply(&raise), Effect::Unchanged);

        p.apply(&Mutation::AddToInventory { object_id: 10 });
        assert_eq!(p.apply(&raise), Effect::Changed);
        assert_eq!(p.object_level(10), 1);
    }

    #[test]
    fn test_credit_is_idempotent_per_key() {
        let mut p = progress();
        assert_eq!(
            p.apply(&credit(15, "100")),
            Effect::Credited {
                leveled_up: true,
                new_level: 1
            }
        );
        assert_eq!(p.apply(&credit(15, "100")), Effect::Unchanged);
        assert_eq!(p.specialization_points("analysis"), 15);
        assert!(p.is_completed(interaction::CLUES, "100"));
    }

    #[test]
    fn test_credit_without_level_change() {
        let mut p = progress();
        assert_eq!(
            p.apply(&credit(5, "a")),
            Effect::Credited {
                leveled_up: false,
                new_level: 0
            }
        );
        assert_eq!(
            p.apply(&credit(40, "b")),
            Effect::Credited {
                leveled_up: true,
                new_level: 2
            }
        );
    }

    #[test]
    fn test_observation_scoping() {
        let mut p = progress();
        p.apply(&Mutation::RecordObservation {
            area_id: 2,
            detail_id: 3,
        });
        assert!(p.has_seen_detail(Some(2), 3));
        assert!(p.has_seen_detail(None, 3));
        assert!(!p.has_seen_detail(Some(5), 3));
        assert!(!p.has_seen_detail(None, 4));
    }

    #[test]
    fn test_challenge_open_and_close() {
        let mut p = progress();
        let open = Mutation::OpenChallenge {
            character_id: 1,
            trigger_id: 7,
        };
        assert_eq!(p.apply(&open), Effect::Changed);
        assert_eq!(p.apply(&open), Effect::Unchanged);
        assert_eq!(p.pending_challenge(1), Some(7));

        let close = Mutation::CloseChallenge { character_id: 1 };
        assert_eq!(p.apply(&close), Effect::Changed);
        assert_eq!(p.apply(&close), Effect::Unchanged);
        assert_eq!(p.pending_challenge(1), None);
    }

    #[test]
    fn test_record_appends_history() {
        let mut p = progress();
        p.record(ActionType::TriggerFailed, Some("character=1".into()));
        assert_eq!(p.action_history.len(), 1);
        assert_eq!(p.action_history[0].details.as_deref(), Some("character=1"));
    }

    #[test]
    fn test_mutation_serializes_tagged() {
        let json = serde_json::to_string(&Mutation::DiscoverClue { clue_id: 4 }).unwrap();
        assert_eq!(json, r#"{"mutation":"discover_clue","clue_id":4}"#);
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        fn mutation_strategy() -> impl Strategy<Value = Mutation> {
            prop_oneof![
                (0u32..3, 0u32..5).prop_map(|(character_id, level)| {
                    Mutation::SetCharacterLevel {
                        character_id,
                        level,
                    }
                }),
                (0u32..3).prop_map(|object_id| Mutation::AddToInventory { object_id }),
                (0u32..3, 0u32..4)
                    .prop_map(|(object_id, level)| Mutation::RaiseObjectLevel { object_id, level }),
                (0u32..30, 0u32..6).prop_map(|(points, key)| Mutation::CreditSpecialization {
                    category: "analysis".into(),
                    points,
                    interaction_type: "clues".into(),
                    interaction_id: key.to_string(),
                    thresholds: vec![15, 40, 80],
                }),
                (0u32..5).prop_map(|clue_id| Mutation::DiscoverClue { clue_id }),
            ]
        }

        proptest! {
            #[test]
            fn prop_levels_never_decrease(mutations in prop::collection::vec(mutation_strategy(), 0..40)) {
                let mut p = PlayerProgress::new("s", "p", "story");
                for m in &mutations {
                    let before_chars = p.character_levels.clone();
                    let before_objects = p.object_levels.clone();
                    let before_spec = p.specialization_level("analysis");
                    let before_clues = p.discovered_clues.len();

                    p.apply(m);

                    for (id, level) in before_chars {
                        prop_assert!(p.character_level(id) >= level);
                    }
                    for (id, level) in before_objects {
                        prop_assert!(p.object_level(id) >= level);
                    }
                    prop_assert!(p.specialization_level("analysis") >= before_spec);
                    prop_assert!(p.discovered_clues.len() >= before_clues);
                }
            }

            #[test]
            fn prop_replaying_mutations_changes_nothing(mutations in prop::collection::vec(mutation_strategy(), 0..40)) {
                let mut p = PlayerProgress::new("s", "p", "story");
                for m in &mutations {
                    p.apply(m);
                }
                let points = p.specialization_points.clone();
                let levels = p.character_levels.clone();
                let clues = p.discovered_clues.clone();

                for m in &mutations {
                    p.apply(m);
                }
                prop_assert_eq!(points, p.specialization_points);
                prop_assert_eq!(levels, p.character_levels);
                prop_assert_eq!(clues, p.discovered_clues);
            }
        }
    }
}
