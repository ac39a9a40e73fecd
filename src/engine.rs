//! Session orchestration.
//!
//! Every player action runs the same cycle under the session's lock: load
//! one snapshot, work on a copy, decide, then persist the copy as one unit
//! if anything changed. A failed write leaves the stored snapshot as it
//! was. Narrative phrasing runs after the write and cannot alter state.

use std::collections::BTreeSet;
use std::sync::PoisonError;

use serde::Serialize;
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::Config;
use crate::content::{
    AreaId, Character, CharacterId, ClueId, DetailId, Location, LocationId, ObjectId, Reward,
    SpecializationGate, Story,
};
use crate::core::{
    completion_percent, first_unmet_gate, gating_check, interaction, resolve, AccessDecision,
    AccessDenial, ActionReport, ActionType, CategoryCredit, CreditReport, Decision,
    DiscoverySource, Evolution, Ledger, Mutation, OutcomeKind, PlayerProgress, ProgressSummary,
    Propagator, Verifier,
};
use crate::error::{CasebookError, Recover, Result};
use crate::narrative::{FallbackNarrator, NarrativeRequest, Narrator};
use crate::session::SessionRegistry;
use crate::storage::{FileProgressStore, ProgressStore};
use crate::util::normalize;

/// Configured narrative service with retries and local fallback.
pub type DefaultNarrator = FallbackNarrator<Box<dyn Narrator>>;

/// A decision together with its phrased text.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Response {
    #[serde(flatten)]
    pub decision: Decision,
    pub text: String,
}

/// The progression engine for one story.
pub struct Engine<S: ProgressStore, N: Narrator = DefaultNarrator> {
    story: Story,
    store: S,
    narrator: N,
    registry: SessionRegistry,
    archive_on_close: bool,
}

impl Engine<FileProgressStore> {
    /// Build an engine backed by session files and the configured narrator.
    pub fn from_config(story: Story, config: &Config) -> Result<Self> {
        let store = match config.sessions_dir() {
            Some(dir) => FileProgressStore::with_dir(dir)?,
            None => FileProgressStore::new()?,
        };
        let narrator = FallbackNarrator::from_config(&config.narrative);
        Ok(Engine::new(story, store, narrator).with_archive_on_close(config.storage.archive_on_close))
    }
}

impl<S: ProgressStore, N: Narrator> Engine<S, N> {
    pub fn new(story: Story, store: S, narrator: N) -> Self {
        Self {
            story,
            store,
            narrator,
            registry: SessionRegistry::new(),
            archive_on_close: true,
        }
    }

    /// Archive closed sessions (the default) or delete them.
    pub fn with_archive_on_close(mut self, archive: bool) -> Self {
        self.archive_on_close = archive;
        self
    }

    pub fn story(&self) -> &Story {
        &self.story
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    /// Start a session: the starting location and its ungated areas are
    /// discovered up front.
    pub fn create_session(&self, player_id: &str) -> Result<PlayerProgress> {
        let session_id = Uuid::new_v4().to_string();
        let mut progress = PlayerProgress::new(&session_id, player_id, &self.story.id);
        progress.record(
            ActionType::SessionCreated,
            Some(format!("player={} story={}", player_id, self.story.id)),
        );
        if let Some(location) = self
            .story
            .starting_location
            .and_then(|id| self.story.location(id))
        {
            discover_location(&mut progress, location);
        }

        self.locked(&session_id, || self.store.put(&progress))?;
        info!(session = %session_id, player = player_id, story = %self.story.id, "session created");
        Ok(progress)
    }

    /// Close a session, archiving or deleting its progress.
    pub fn close_session(&self, session_id: &str) -> Result<()> {
        self.locked(session_id, || {
            self.store.load(session_id)?;
            if self.archive_on_close {
                self.store.archive(session_id)
            } else {
                self.store.delete(session_id)
            }
        })?;
        self.registry.evict(session_id);
        info!(session = session_id, archived = self.archive_on_close, "session closed");
        Ok(())
    }

    /// Sessions for this story, most recently updated first.
    pub fn list_sessions(&self, limit: usize) -> Result<Vec<PlayerProgress>> {
        let mut sessions = self.store.list(usize::MAX)?;
        sessions.retain(|p| p.story_id == self.story.id);
        sessions.truncate(limit);
        Ok(sessions)
    }

    /// Current progress for a session.
    pub fn progress(&self, session_id: &str) -> Result<PlayerProgress> {
        self.with_session(session_id, |progress| Ok(progress.clone()))
    }

    /// Decide what an utterance to a character does.
    pub fn resolve_action(
        &self,
        session_id: &str,
        character_id: CharacterId,
        utterance: &str,
    ) -> Result<Decision> {
        let story = &self.story;
        let decision = self.with_session(session_id, |progress| {
            let character = story
                .character(character_id)
                .ok_or_else(|| CasebookError::not_found("character", character_id))?;
            Ok(converse(story, progress, character, utterance))
        })?;

        debug!(
            session = session_id,
            character = character_id,
            outcome = ?decision.outcome,
            trigger = ?decision.trigger_id,
            "action resolved"
        );
        Ok(decision)
    }

    /// Resolve an utterance and phrase the outcome.
    pub fn respond(
        &self,
        session_id: &str,
        character_id: CharacterId,
        utterance: &str,
    ) -> Result<Response> {
        let decision = self.resolve_action(session_id, character_id, utterance)?;
        let text = self.narrate(&decision);
        Ok(Response { decision, text })
    }

    /// Phrase a decision. Service failures fall back to the content text.
    pub fn narrate(&self, decision: &Decision) -> String {
        let request = self.narrative_request(decision);
        self.narrator.phrase(&request).recover_with(
            &format!("phrasing for session {}", decision.session_id),
            request.base_text.clone(),
        )
    }

    pub fn collect_object(&self, session_id: &str, object_id: ObjectId) -> Result<ActionReport> {
        let story = &self.story;
        self.with_session(session_id, |progress| {
            story
                .object(object_id)
                .ok_or_else(|| CasebookError::not_found("object", object_id))?;
            let changed = progress
                .apply(&Mutation::AddToInventory { object_id })
                .is_changed();
            Ok(ActionReport {
                changed,
                ..ActionReport::default()
            })
        })
    }

    /// Examine a collected object, raising its knowledge level by one up to
    /// the object's maximum.
    pub fn examine_object(&self, session_id: &str, object_id: ObjectId) -> Result<ActionReport> {
        let story = &self.story;
        self.with_session(session_id, |progress| {
            let object = story
                .object(object_id)
                .ok_or_else(|| CasebookError::not_found("object", object_id))?;
            if !progress.has_object(object_id) {
                return Ok(ActionReport::denied(AccessDenial::MissingObjects {
                    object_ids: vec![object_id],
                }));
            }

            let level = (progress.object_level(object_id) + 1).min(object.max_level);
            let changed = progress
                .apply(&Mutation::RaiseObjectLevel { object_id, level })
                .is_changed();
            let source = DiscoverySource::ObjectLevel {
                object_id,
                level: progress.object_level(object_id),
            };
            let discovered = Propagator::new(story).propagate(progress, &source);

            let mut credits = Vec::new();
            credit_reward(
                story,
                progress,
                object.reward.as_ref(),
                interaction::OBJECTS,
                &format!("{}:examine", object_id),
                &mut credits,
            );
            let unlocked_areas = settle(story, progress, &discovered, &mut credits);

            Ok(ActionReport {
                changed,
                newly_discovered_clues: discovered,
                credits,
                unlocked_areas,
                object_level: Some(progress.object_level(object_id)),
                denial: None,
            })
        })
    }

    /// Look at a detail in an area.
    pub fn observe_detail(
        &self,
        session_id: &str,
        area_id: AreaId,
        detail_id: DetailId,
    ) -> Result<ActionReport> {
        let story = &self.story;
        self.with_session(session_id, |progress| {
            let (location, area) = story
                .area(area_id)
                .ok_or_else(|| CasebookError::not_found("area", area_id))?;
            if !area.detail_ids.is_empty() && !area.detail_ids.contains(&detail_id) {
                return Err(CasebookError::not_found(
                    "detail",
                    format!("{}:{}", area_id, detail_id),
                ));
            }
            if !progress.discovered_areas.contains(&area_id) {
                if let Some(denial) = gate_denial(progress, &area.specialization_required) {
                    return Ok(ActionReport::denied(denial));
                }
            }

            let changed = progress
                .apply(&Mutation::RecordObservation { area_id, detail_id })
                .is_changed();
            let discovered = Propagator::new(story).propagate(
                progress,
                &DiscoverySource::Detail {
                    location_id: Some(location.id),
                    area_id,
                    detail_id,
                },
            );

            let mut credits = Vec::new();
            credit_reward(
                story,
                progress,
                area.reward.as_ref(),
                interaction::AREAS,
                &format!("{}:{}", area_id, detail_id),
                &mut credits,
            );
            let unlocked_areas = settle(story, progress, &discovered, &mut credits);

            Ok(ActionReport {
                changed,
                newly_discovered_clues: discovered,
                credits,
                unlocked_areas,
                ..ActionReport::default()
            })
        })
    }

    /// Enter a location, discovering it and its ungated areas.
    pub fn enter_location(&self, session_id: &str, location_id: LocationId) -> Result<ActionReport> {
        let story = &self.story;
        self.with_session(session_id, |progress| {
            let location = story
                .location(location_id)
                .ok_or_else(|| CasebookError::not_found("location", location_id))?;
            let changed = discover_location(progress, location);
            let unlocked_areas = Propagator::new(story).unlock_areas(progress);
            Ok(ActionReport {
                changed,
                unlocked_areas,
                ..ActionReport::default()
            })
        })
    }

    /// Enter an area of a discovered location. Gated areas are refused
    /// until their specialization gate is met.
    pub fn enter_area(&self, session_id: &str, area_id: AreaId) -> Result<ActionReport> {
        let story = &self.story;
        self.with_session(session_id, |progress| {
            let (location, area) = story
                .area(area_id)
                .ok_or_else(|| CasebookError::not_found("area", area_id))?;

            let denial = if progress.discovered_locations.contains(&location.id) {
                gate_denial(progress, &area.specialization_required)
            } else {
                Some(AccessDenial::LocationNotDiscovered {
                    location_id: location.id,
                })
            };
            if let Some(denial) = denial {
                progress.record(ActionType::AccessDenied, Some(format!("area={}", area_id)));
                return Ok(ActionReport::denied(denial));
            }

            let changed = progress
                .apply(&Mutation::DiscoverArea { area_id })
                .is_changed();
            Ok(ActionReport {
                changed,
                ..ActionReport::default()
            })
        })
    }

    /// Credit specialization points for an interaction, at most once per
    /// `(interaction_type, interaction_id)` key. A level-up unlocks any area
    /// whose gate is now met.
    pub fn credit(
        &self,
        session_id: &str,
        category: &str,
        points: u32,
        interaction_type: &str,
        interaction_id: &str,
    ) -> Result<CreditReport> {
        let story = &self.story;
        self.with_session(session_id, |progress| {
            let outcome =
                Ledger::new(story, progress).credit(category, points, interaction_type, interaction_id)?;
            let unlocked_areas = if outcome.leveled_up {
                Propagator::new(story).unlock_areas(progress)
            } else {
                BTreeSet::new()
            };
            Ok(CreditReport {
                outcome,
                unlocked_areas,
            })
        })
    }

    /// Whether the session meets every minimum in `required`.
    pub fn gating_check(&self, session_id: &str, required: &SpecializationGate) -> Result<bool> {
        self.with_session(session_id, |progress| Ok(gating_check(progress, required)))
    }

    /// Decide whether a scanned access code lets the player through.
    pub fn check_access(&self, session_id: &str, code: &str) -> Result<AccessDecision> {
        let story = &self.story;
        self.with_session(session_id, |progress| {
            let point = story
                .access_point(code)
                .ok_or_else(|| CasebookError::not_found("access point", code))?;

            let denial = point
                .required_location
                .filter(|id| !progress.discovered_locations.contains(id))
                .map(|location_id| AccessDenial::LocationNotDiscovered { location_id })
                .or_else(|| {
                    let missing: Vec<ObjectId> = point
                        .required_objects
                        .iter()
                        .copied()
                        .filter(|id| !progress.has_object(*id))
                        .collect();
                    (!missing.is_empty()).then_some(AccessDenial::MissingObjects {
                        object_ids: missing,
                    })
                })
                .or_else(|| gate_denial(progress, &point.specialization_required));

            if let Some(denial) = denial {
                progress.record(ActionType::AccessDenied, Some(format!("code={}", code)));
                debug!(session = %progress.session_id, code, ?denial, "access denied");
                return Ok(AccessDecision {
                    code: code.to_string(),
                    granted: false,
                    denial: Some(denial),
                    granted_location: None,
                });
            }

            progress.apply(&Mutation::RecordScan {
                code: code.to_string(),
            });
            if let Some(location) = point.grants_location.and_then(|id| story.location(id)) {
                discover_location(progress, location);
                Propagator::new(story).unlock_areas(progress);
            }

            Ok(AccessDecision {
                code: code.to_string(),
                granted: true,
                denial: None,
                granted_location: point.grants_location,
            })
        })
    }

    pub fn summary(&self, session_id: &str) -> Result<ProgressSummary> {
        let progress = self.progress(session_id)?;
        let clues_found = progress.discovered_clues.len();
        let clues_total = self.story.clues.len();
        let locations_found = progress.discovered_locations.len();
        let locations_total = self.story.locations.len();

        Ok(ProgressSummary {
            completion_percent: completion_percent(
                clues_found,
                clues_total,
                locations_found,
                locations_total,
            ),
            session_id: progress.session_id,
            story_id: progress.story_id,
            character_levels: progress.character_levels,
            specialization_levels: progress.specialization_levels,
            clues_found,
            clues_total,
            locations_found,
            locations_total,
            inventory: progress.inventory,
            actions: progress.action_history.len(),
        })
    }

    /// Run `action` on a working copy of the session's progress and persist
    /// the copy if it changed.
    fn with_session<T>(
        &self,
        session_id: &str,
        action: impl FnOnce(&mut PlayerProgress) -> Result<T>,
    ) -> Result<T> {
        self.locked(session_id, || {
            let snapshot = self.store.load(session_id)?;
            let mut working = snapshot.clone();
            let value = action(&mut working)?;
            if working != snapshot {
                self.store.put(&working)?;
            }
            Ok(value)
        })
    }

    /// Run `f` holding the session's lock.
    fn locked<T>(&self, session_id: &str, f: impl FnOnce() -> Result<T>) -> Result<T> {
        let handle = self.registry.handle(session_id);
        let result = {
            let _guard = handle.lock().unwrap_or_else(PoisonError::into_inner);
            f()
        };
        if matches!(result, Err(CasebookError::NotFound { kind: "session", .. })) {
            self.registry.release(session_id, handle);
        }
        result
    }

    fn narrative_request(&self, decision: &Decision) -> NarrativeRequest {
        let character = self.story.character(decision.character_id);
        let personality = character.map_or("", |c| c.personality.as_str());
        let stance = character
            .and_then(|c| c.level(decision.character_level))
            .map_or("", |l| l.narrative_stance.as_str());
        let context: Vec<&str> = [personality, stance]
            .into_iter()
            .filter(|s| !s.is_empty())
            .collect();

        let instruction = match decision.outcome {
            OutcomeKind::PassThrough => "converse",
            OutcomeKind::TriggerDefensive => "deflect",
            OutcomeKind::TriggerSuccess => "reveal",
            OutcomeKind::TriggerFail => "withhold",
        };

        NarrativeRequest {
            subject: character.map(|c| c.name.clone()).unwrap_or_default(),
            context: context.join(" "),
            base_text: decision.text_hint.clone().unwrap_or_default(),
            instruction: instruction.to_string(),
        }
    }
}

/// Decide an utterance to `character` on a working copy.
///
/// An open challenge is answered by the next utterance regardless of its
/// content. Otherwise the resolver picks the trigger; a trigger on the
/// current defensive level opens a challenge instead of verifying.
fn converse(
    story: &Story,
    progress: &mut PlayerProgress,
    character: &Character,
    utterance: &str,
) -> Decision {
    let normalized = normalize(utterance);
    let current = progress.character_level(character.id);
    let mut decision = Decision::pass_through(&progress.session_id, character.id, current);

    let pending = progress.pending_challenge(character.id).and_then(|trigger_id| {
        let found = character.trigger(trigger_id);
        if found.is_none() {
            tracing::warn!(
                character = character.id,
                trigger = trigger_id,
                "dropping challenge for unknown trigger"
            );
            progress.apply(&Mutation::CloseChallenge {
                character_id: character.id,
            });
        }
        found
    });

    let (level, trigger, answering) = match pending {
        Some((level, trigger)) => (level, trigger, true),
        None => match resolve(character, current, &normalized) {
            Some(matched) => (matched.level, matched.trigger, false),
            None => return decision,
        },
    };
    decision.trigger_id = Some(trigger.id);

    if !answering
        && level.is_defensive
        && Evolution::can_advance(character, current, level.level_number)
    {
        progress.apply(&Mutation::OpenChallenge {
            character_id: character.id,
            trigger_id: trigger.id,
        });
        decision.outcome = OutcomeKind::TriggerDefensive;
        decision.text_hint = non_empty(&trigger.defensive_response);
        return decision;
    }
    if answering {
        progress.apply(&Mutation::CloseChallenge {
            character_id: character.id,
        });
    }

    let verdict = Verifier::new(progress).verify_trigger(trigger, &normalized);
    let details = Some(format!("character={} trigger={}", character.id, trigger.id));
    if !verdict.is_met() {
        progress.record(ActionType::TriggerFailed, details);
        decision.outcome = OutcomeKind::TriggerFail;
        decision.text_hint = non_empty(&trigger.fail_response);
        decision.hint = verdict.hint();
        return decision;
    }

    let transition = Evolution::new(story).advance(progress, character, level.level_number);
    progress.record(ActionType::TriggerSucceeded, details);

    let mut credits = Vec::new();
    credit_reward(
        story,
        progress,
        trigger.reward.as_ref(),
        interaction::CHARACTERS,
        &format!("{}:{}", character.id, trigger.id),
        &mut credits,
    );
    decision.unlocked_areas = settle(story, progress, &transition.discovered, &mut credits);

    decision.outcome = OutcomeKind::TriggerSuccess;
    decision.text_hint = non_empty(&trigger.success_response);
    decision.leveled_up = transition.leveled_up;
    decision.character_level = progress.character_level(character.id);
    decision.newly_discovered_clues = transition.discovered;
    decision.credits = credits;
    decision
}

/// Discover a location and its ungated areas.
fn discover_location(progress: &mut PlayerProgress, location: &Location) -> bool {
    let mut changed = progress
        .apply(&Mutation::DiscoverLocation {
            location_id: location.id,
        })
        .is_changed();
    for area in location
        .areas
        .iter()
        .filter(|a| a.specialization_required.is_empty())
    {
        changed |= progress
            .apply(&Mutation::DiscoverArea { area_id: area.id })
            .is_changed();
    }
    changed
}

fn credit_reward(
    story: &Story,
    progress: &mut PlayerProgress,
    reward: Option<&Reward>,
    interaction_type: &str,
    interaction_id: &str,
    credits: &mut Vec<CategoryCredit>,
) {
    let Some(reward) = reward else {
        return;
    };
    if let Some(outcome) = Ledger::new(story, progress).reward(reward, interaction_type, interaction_id)
    {
        if outcome.points_added > 0 {
            credits.push(CategoryCredit {
                category: reward.category.clone(),
                outcome,
            });
        }
    }
}

/// Credit the rewards of newly discovered clues, then unlock any gated
/// areas the credits opened.
fn settle(
    story: &Story,
    progress: &mut PlayerProgress,
    clues: &BTreeSet<ClueId>,
    credits: &mut Vec<CategoryCredit>,
) -> BTreeSet<AreaId> {
    for clue in clues.iter().filter_map(|id| story.clue(*id)) {
        credit_reward(
            story,
            progress,
            clue.reward.as_ref(),
            interaction::CLUES,
            &clue.id.to_string(),
            credits,
        );
    }
    Propagator::new(story).unlock_areas(progress)
}

fn gate_denial(progress: &PlayerProgress, required: &SpecializationGate) -> Option<AccessDenial> {
    first_unmet_gate(progress, required).map(|(category, min, current)| {
        AccessDenial::Specialization {
            category: category.to_string(),
            required: min,
            current,
        }
    })
}

fn non_empty(text: &str) -> Option<String> {
    (!text.trim().is_empty()).then(|| text.to_string())
}
