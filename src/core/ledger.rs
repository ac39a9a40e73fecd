//! Specialization ledger: idempotent point crediting and level gating.
//!
//! Points are credited against an `(interaction_type, interaction_id)` key
//! at most once per session. The level for a category is recomputed from
//! its total points on every credit.

use serde::Serialize;

use crate::content::{Reward, SpecializationGate, Story};
use crate::core::progress::{Effect, Mutation, PlayerProgress};
use crate::error::{CasebookError, Result};

/// Result of a credit request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CreditOutcome {
    pub leveled_up: bool,
    pub new_level: u32,
    /// Zero when the interaction key was already credited.
    pub points_added: u32,
}

/// Credits specialization points on a working copy of progress.
#[derive(Debug)]
pub struct Ledger<'a> {
    story: &'a Story,
    progress: &'a mut PlayerProgress,
}

impl<'a> Ledger<'a> {
    pub fn new(story: &'a Story, progress: &'a mut PlayerProgress) -> Self {
        Self { story, progress }
    }

    /// Credit `points` to `category` for an interaction.
    ///
    /// A key that was already credited adds nothing and reports the current
    /// level with `leveled_up = false`. Unknown categories are `NotFound`.
    pub fn credit(
        &mut self,
        category: &str,
        points: u32,
        interaction_type: &str,
        interaction_id: &str,
    ) -> Result<CreditOutcome> {
        let definition = self
            .story
            .category(category)
            .ok_or_else(|| CasebookError::not_found("category", category))?;

        let mutation = Mutation::CreditSpecialization {
            category: definition.id.clone(),
            points,
            interaction_type: interaction_type.to_string(),
            interaction_id: interaction_id.to_string(),
            thresholds: definition.level_thresholds.clone(),
        };

        let outcome = match self.progress.apply(&mutation) {
            Effect::Credited {
                leveled_up,
                new_level,
            } => {
                tracing::debug!(
                    category,
                    points,
                    key = %format!("{}/{}", interaction_type, interaction_id),
                    new_level,
                    "specialization credited"
                );
                if leveled_up {
                    tracing::info!(category, new_level, "specialization level up");
                }
                CreditOutcome {
                    leveled_up,
                    new_level,
                    points_added: points,
                }
            }
            Effect::Unchanged | Effect::Changed => CreditOutcome {
                leveled_up: false,
                new_level: self.progress.specialization_level(category),
                points_added: 0,
            },
        };

        Ok(outcome)
    }

    /// Credit a content-defined reward. Rewards naming an unknown category
    /// are skipped with a warning rather than failing the action.
    pub fn reward(
        &mut self,
        reward: &Reward,
        interaction_type: &str,
        interaction_id: &str,
    ) -> Option<CreditOutcome> {
        match self.credit(
            &reward.category,
            reward.points,
            interaction_type,
            interaction_id,
        ) {
            Ok(outcome) => Some(outcome),
            Err(err) => {
                tracing::warn!("skipping reward for {}/{}: {}", interaction_type, interaction_id, err);
                None
            }
        }
    }
}

/// Whether every category in `required` meets its minimum level.
pub fn gating_check(progress: &PlayerProgress, required: &SpecializationGate) -> bool {
    first_unmet_gate(progress, required).is_none()
}

/// The first category (in key order) below its minimum, as
/// `(category, required, current)`.
pub fn first_unmet_gate<'g>(
    progress: &PlayerProgress,
    required: &'g SpecializationGate,
) -> Option<(&'g str, u32, u32)> {
    required.iter().find_map(|(category, &min)| {
        let current = progress.specialization_level(category);
        (current < min).then_some((category.as_str(), min, current))
    })
}
