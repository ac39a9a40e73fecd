//! Requirement verification against a progress snapshot.
//!
//! Unmet requirements are data, not errors: the verdict carries the first
//! unmet requirement's hint so it can be surfaced to the player.

use serde::Serialize;

use crate::content::{EvidenceRequirement, Trigger};
use crate::core::ledger::first_unmet_gate;
use crate::core::progress::PlayerProgress;
use crate::util::contains_term;

/// Outcome of checking a trigger's conditions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum Verdict {
    Met,
    /// A specialization gate on the trigger is not met.
    Gated {
        category: String,
        required: u32,
        current: u32,
    },
    /// The evidence requirement at `index` is not met.
    Unmet { index: usize, hint: String },
}

impl Verdict {
    pub fn is_met(&self) -> bool {
        matches!(self, Self::Met)
    }

    /// Player-facing hint for a failed verdict.
    pub fn hint(&self) -> Option<String> {
        match self {
            Self::Met => None,
            Self::Gated {
                category, required, ..
            } => Some(format!(
                "You need more experience in {} (level {}).",
                category, required
            )),
            Self::Unmet { hint, .. } if hint.is_empty() => None,
            Self::Unmet { hint, .. } => Some(hint.clone()),
        }
    }
}

/// Read-only checks over one progress snapshot.
#[derive(Debug, Clone, Copy)]
pub struct Verifier<'a> {
    progress: &'a PlayerProgress,
}

impl<'a> Verifier<'a> {
    pub fn new(progress: &'a PlayerProgress) -> Self {
        Self { progress }
    }

    /// Check a single requirement. `utterance` must already be normalized.
    pub fn check(&self, requirement: &EvidenceRequirement, utterance: &str) -> bool {
        match requirement {
            EvidenceRequirement::Object { target_ids, .. } => {
                target_ids.iter().any(|id| self.progress.has_object(*id))
            }
            EvidenceRequirement::Knowledge {
                target_ids,
                keywords,
                ..
            } => {
                target_ids
                    .iter()
                    .any(|id| self.progress.object_level(*id) > 0)
                    || keywords.iter().any(|k| contains_term(utterance, k))
            }
            EvidenceRequirement::Observation {
                detail_ids,
                area_id,
                ..
            } => detail_ids
                .iter()
                .any(|id| self.progress.has_seen_detail(*area_id, *id)),
        }
    }

    /// Check requirements in order; all must pass.
    pub fn verify(&self, requirements: &[EvidenceRequirement], utterance: &str) -> Verdict {
        requirements
            .iter()
            .enumerate()
            .find(|(_, r)| !self.check(r, utterance))
            .map_or(Verdict::Met, |(index, r)| Verdict::Unmet {
                index,
                hint: r.hint_on_failure().to_string(),
            })
    }

    /// Check a trigger: its specialization gate first, then its evidence.
    pub fn verify_trigger(&self, trigger: &Trigger, utterance: &str) -> Verdict {
        if let Some((category, required, current)) =
            first_unmet_gate(self.progress, &trigger.specialization_required)
        {
            return Verdict::Gated {
                category: category.to_string(),
                required,
                current,
            };
        }
        self.verify(&trigger.requirements, utterance)
    }
}
