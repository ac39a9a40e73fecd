//! Decision records returned by engine operations.
//!
//! Records carry base texts from content, never phrased narrative. Phrasing
//! happens afterwards and cannot change a decision.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::content::{AreaId, CharacterId, ClueId, LocationId, ObjectId, TriggerId};
use crate::core::ledger::CreditOutcome;

/// What a conversational action amounted to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeKind {
    /// No trigger matched; ordinary conversation.
    PassThrough,
    /// A defensive level challenged the player; the next utterance answers.
    TriggerDefensive,
    TriggerSuccess,
    TriggerFail,
}

/// Points credited to one category during an action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryCredit {
    pub category: String,
    #[serde(flatten)]
    pub outcome: CreditOutcome,
}

/// Decision for one utterance to one character.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Decision {
    pub session_id: String,
    pub character_id: CharacterId,
    pub outcome: OutcomeKind,
    pub trigger_id: Option<TriggerId>,
    /// Content response for the outcome (defensive, success or fail text).
    pub text_hint: Option<String>,
    /// First unmet requirement's hint on `trigger_fail`.
    pub hint: Option<String>,
    pub newly_discovered_clues: BTreeSet<ClueId>,
    pub leveled_up: bool,
    /// Character level after the action.
    pub character_level: u32,
    pub credits: Vec<CategoryCredit>,
    pub unlocked_areas: BTreeSet<AreaId>,
}

impl Decision {
    pub(crate) fn pass_through(session_id: &str, character_id: CharacterId, level: u32) -> Self {
        Self {
            session_id: session_id.to_string(),
            character_id,
            outcome: OutcomeKind::PassThrough,
            trigger_id: None,
            text_hint: None,
            hint: None,
            newly_discovered_clues: BTreeSet::new(),
            leveled_up: false,
            character_level: level,
            credits: Vec::new(),
            unlocked_areas: BTreeSet::new(),
        }
    }
}

/// Effects of a non-conversational action (collecting, examining,
/// observing, entering, crediting).
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ActionReport {
    /// Whether the action itself changed anything.
    pub changed: bool,
    pub newly_discovered_clues: BTreeSet<ClueId>,
    pub credits: Vec<CategoryCredit>,
    pub unlocked_areas: BTreeSet<AreaId>,
    /// Knowledge level after examining an object.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub object_level: Option<u32>,
    /// Set when the action was refused; nothing else changed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub denial: Option<AccessDenial>,
}

impl ActionReport {
    pub(crate) fn denied(denial: AccessDenial) -> Self {
        Self {
            denial: Some(denial),
            ..Self::default()
        }
    }
}

/// A direct credit and the areas its level-up opened.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CreditReport {
    #[serde(flatten)]
    pub outcome: CreditOutcome,
    pub unlocked_areas: BTreeSet<AreaId>,
}

/// Why an access check failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum AccessDenial {
    LocationNotDiscovered { location_id: LocationId },
    MissingObjects { object_ids: Vec<ObjectId> },
    Specialization {
        category: String,
        required: u32,
        current: u32,
    },
}

/// Outcome of scanning an access point.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AccessDecision {
    pub code: String,
    pub granted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub denial: Option<AccessDenial>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub granted_location: Option<LocationId>,
}

/// Read-only overview of a session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressSummary {
    pub session_id: String,
    pub story_id: String,
    pub character_levels: BTreeMap<CharacterId, u32>,
    pub specialization_levels: BTreeMap<String, u32>,
    pub clues_found: usize,
    pub clues_total: usize,
    pub locations_found: usize,
    pub locations_total: usize,
    pub inventory: BTreeSet<ObjectId>,
    /// Mean of the location and clue discovery ratios, 0 to 100.
    pub completion_percent: f64,
    pub actions: usize,
}

/// Completion as the mean of two discovery ratios. Empty totals count as
/// complete.
pub fn completion_percent(
    clues_found: usize,
    clues_total: usize,
    locations_found: usize,
    locations_total: usize,
) -> f64 {
    fn ratio(found: usize, total: usize) -> f64 {
        if total == 0 {
            1.0
        } else {
            (found.min(total) as f64) / (total as f64)
        }
    }
    (ratio(clues_found, clues_total) + ratio(locations_found, locations_total)) * 50.0
}
