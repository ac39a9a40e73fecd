//! Trigger resolution: which trigger, if any, an utterance activates.
//!
//! Only triggers declared at or below the character's current level are
//! eligible. The current level is scanned first, then passed levels from the
//! most recent down; within a level, triggers are tried in declaration
//! order. The first match wins.

use crate::content::{Character, CharacterLevel, Trigger};
use crate::util::contains_term;

/// A trigger matched by an utterance, with the level that declares it.
#[derive(Debug, Clone, Copy)]
pub struct TriggerMatch<'a> {
    pub level: &'a CharacterLevel,
    pub trigger: &'a Trigger,
}

/// Whether a normalized utterance activates `trigger`.
///
/// With `combination_required` every keyword and phrase must be present;
/// otherwise any one suffices. A trigger with no terms never matches.
pub fn matches(trigger: &Trigger, normalized: &str) -> bool {
    let mut terms = trigger.terms().filter(|t| !t.trim().is_empty()).peekable();
    if terms.peek().is_none() {
        return false;
    }
    if trigger.combination_required {
        terms.all(|t| contains_term(normalized, t))
    } else {
        terms.any(|t| contains_term(normalized, t))
    }
}

/// Find the trigger an utterance activates for a character at
/// `current_level`. `None` is a pass-through.
pub fn resolve<'a>(
    character: &'a Character,
    current_level: u32,
    normalized: &str,
) -> Option<TriggerMatch<'a>> {
    let mut eligible: Vec<&CharacterLevel> = character
        .levels
        .iter()
        .filter(|l| l.level_number <= current_level)
        .collect();
    eligible.sort_by(|a, b| b.level_number.cmp(&a.level_number));

    eligible.into_iter().find_map(|level| {
        level
            .triggers
            .iter()
            .find(|t| matches(t, normalized))
            .map(|trigger| TriggerMatch { level, trigger })
    })
}
