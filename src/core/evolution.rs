//! Character evolution: the per-character level state machine.
//!
//! States run from 0 to the character's highest declared level, which is
//! terminal. A successful trigger declared at the character's current level
//! advances exactly one level. Everything else (a trigger from a passed
//! level, or any trigger at the terminal level) is a standing response and
//! leaves the level unchanged.

use serde::Serialize;
use std::collections::BTreeSet;

use crate::content::{Character, ClueId, Story};
use crate::core::discovery::{DiscoverySource, Propagator};
use crate::core::progress::{Effect, Mutation, PlayerProgress};

/// Result of a successful trigger on the character's level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Transition {
    pub from: u32,
    pub to: u32,
    pub leveled_up: bool,
    /// Clues unlocked by the new level.
    pub discovered: BTreeSet<ClueId>,
}

impl Transition {
    fn standing(level: u32) -> Self {
        Self {
            from: level,
            to: level,
            leveled_up: false,
            discovered: BTreeSet::new(),
        }
    }
}

/// Applies level transitions on a working copy of progress.
#[derive(Debug, Clone, Copy)]
pub struct Evolution<'a> {
    story: &'a Story,
}

impl<'a> Evolution<'a> {
    pub fn new(story: &'a Story) -> Self {
        Self { story }
    }

    /// Whether a success on a trigger declared at `trigger_level` would
    /// advance a character currently at `current`.
    pub fn can_advance(character: &Character, current: u32, trigger_level: u32) -> bool {
        trigger_level == current && current < character.max_level()
    }

    /// Advance the character by one level if allowed, propagating clues for
    /// the new level. The level change and the clue discoveries land in the
    /// same working copy and are persisted together.
    pub fn advance(
        &self,
        progress: &mut PlayerProgress,
        character: &Character,
        trigger_level: u32,
    ) -> Transition {
        let current = progress.character_level(character.id);
        if !Self::can_advance(character, current, trigger_level) {
            tracing::debug!(
                character = character.id,
                level = current,
                trigger_level,
                "standing response, no transition"
            );
            return Transition::standing(current);
        }

        let to = current + 1;
        let effect = progress.apply(&Mutation::SetCharacterLevel {
            character_id: character.id,
            level: to,
        });
        if effect != Effect::Changed {
            return Transition::standing(current);
        }

        let discovered = Propagator::new(self.story).propagate(
            progress,
            &DiscoverySource::Character {
                character_id: character.id,
                level: to,
            },
        );

        tracing::info!(
            character = character.id,
            from = current,
            to,
            clues = discovered.len(),
            "character evolved"
        );

        Transition {
            from: current,
            to,
            leveled_up: true,
            discovered,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::{CharacterLevel, Clue, DiscoveryCondition};
    use crate::core::progress::ActionType;

    fn story() -> Story {
        Story {
            id: "manor".into(),
            characters: vec![Character {
                id: 1,
                name: "Butler".into(),
                levels: (0..3)
                    .map(|n| CharacterLevel {
                        level_number: n,
                        ..CharacterLevel::default()
                    })
                    .collect(),
                ..Character::default()
            }],
            clues: vec![Clue {
                id: 100,
                name: "Stained cuff".into(),
                discovery_conditions: vec![DiscoveryCondition::Character {
                    character_id: 1,
                    min_level: None,
                }],
                ..Clue::default()
            }],
            ..Story::default()
        }
    }

    #[test]
    fn test_advance_one_level_with_clues() {
        let story = story();
        let character = story.character(1).unwrap();
        let mut p = PlayerProgress::new("s", "p", "manor");

        let t = Evolution::new(&story).advance(&mut p, character, 0);

        assert!(t.leveled_up);
        assert_eq!((t.from, t.to), (0, 1));
        assert_eq!(t.discovered, BTreeSet::from([100]));
        assert_eq!(p.character_level(1), 1);
        assert!(p
            .action_history
            .iter()
            .any(|r| r.action_type == ActionType::CharacterEvolved));
    }

    #[test]
    fn test_passed_level_trigger_is_standing() {
        let story = story();
        let character = story.character(1).unwrap();
        let mut p = PlayerProgress::new("s", "p", "manor");
        p.apply(&Mutation::SetCharacterLevel {
            character_id: 1,
            level: 2,
        });

        let t = Evolution::new(&story).advance(&mut p, character, 0);
        assert!(!t.leveled_up);
        assert_eq!(p.character_level(1), 2);
    }

    #[test]
    fn test_terminal_level_is_standing() {
        let story = story();
        let character = story.character(1).unwrap();
        let mut p = PlayerProgress::new("s", "p", "manor");
        p.apply(&Mutation::SetCharacterLevel {
            character_id: 1,
            level: 2,
        });

        let t = Evolution::new(&story).advance(&mut p, character, 2);
        assert_eq!(t, Transition::standing(2));
        assert_eq!(p.character_level(1), 2);
    }

    #[test]
    fn test_never_more_than_one_step() {
        let story = story();
        let character = story.character(1).unwrap();
        let mut p = PlayerProgress::new("s", "p", "manor");
        let evolution = Evolution::new(&story);

        evolution.advance(&mut p, character, 0);
        // Replaying the level-0 success does nothing further
        evolution.advance(&mut p, character, 0);
        assert_eq!(p.character_level(1), 1);
    }
}
