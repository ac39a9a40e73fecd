//! Sessions command.
//!
//! Lists recent sessions for the loaded story, useful for finding session
//! IDs to pass to the other commands.

use serde::{Deserialize, Serialize};

use crate::cli::CommandOutput;
use crate::core::PlayerProgress;
use crate::engine::Engine;
use crate::narrative::Narrator;
use crate::storage::ProgressStore;

/// One session as listed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSummary {
    pub id: String,
    pub player_id: String,
    /// Last updated timestamp (RFC 3339).
    pub updated_at: String,
    pub clues: usize,
    pub actions: usize,
}

impl From<&PlayerProgress> for SessionSummary {
    fn from(progress: &PlayerProgress) -> Self {
        Self {
            id: progress.session_id.clone(),
            player_id: progress.player_id.clone(),
            updated_at: progress.updated_at.to_rfc3339(),
            clues: progress.discovered_clues.len(),
            actions: progress.action_history.len(),
        }
    }
}

/// The sessions command implementation.
pub struct SessionsCommand<'a, S: ProgressStore, N: Narrator> {
    engine: &'a Engine<S, N>,
}

impl<'a, S: ProgressStore, N: Narrator> SessionsCommand<'a, S, N> {
    pub fn new(engine: &'a Engine<S, N>) -> Self {
        Self { engine }
    }

    pub fn run(&self, limit: usize) -> CommandOutput<Vec<SessionSummary>> {
        match self.engine.list_sessions(limit) {
            Ok(sessions) => {
                CommandOutput::success(sessions.iter().map(SessionSummary::from).collect())
            }
            Err(e) => CommandOutput::failure(format!("Failed to list sessions: {}", e)),
        }
    }
}

impl CommandOutput<Vec<SessionSummary>> {
    /// Format as a human-readable table.
    pub fn format_text(&self) -> String {
        let sessions = match (&self.data, &self.error) {
            (Some(sessions), _) => sessions,
            (None, error) => {
                return format!(
                    "Sessions failed: {}",
                    error.as_deref().unwrap_or("unknown error")
                )
            }
        };
        if sessions.is_empty() {
            return "No sessions found.".to_string();
        }

        let mut lines = vec![format!("Sessions ({} found):", sessions.len()), String::new()];
        lines.push(format!(
            "{:<36}  {:<16}  {:<20}  {:>5}  {:>7}",
            "ID", "PLAYER", "UPDATED", "CLUES", "ACTIONS"
        ));
        lines.push("-".repeat(92));

        for session in sessions {
            // YYYY-MM-DDTHH:MM:SS
            let updated: String = session.updated_at.chars().take(19).collect();
            lines.push(format!(
                "{:<36}  {:<16}  {:<20}  {:>5}  {:>7}",
                session.id, session.player_id, updated, session.clues, session.actions
            ));
        }

        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::Story;
    use crate::narrative::EchoNarrator;
    use crate::storage::MemoryProgressStore;

    fn engine() -> Engine<MemoryProgressStore, EchoNarrator> {
        let story = Story {
            id: "manor".into(),
            ..Story::default()
        };
        Engine::new(story, MemoryProgressStore::new(), EchoNarrator)
    }

    #[test]
    fn test_sessions_empty() {
        let engine = engine();
        let output = SessionsCommand::new(&engine).run(10);

        assert!(output.success);
        assert_eq!(output.data.as_ref().map(Vec::len), Some(0));
        assert_eq!(output.format_text(), "No sessions found.");
    }

    #[test]
    fn test_sessions_respects_limit() {
        let engine = engine();
        for i in 0..5 {
            engine.create_session(&format!("player-{}", i)).unwrap();
        }

        let output = SessionsCommand::new(&engine).run(3);
        assert_eq!(output.data.unwrap().len(), 3);
    }

    #[test]
    fn test_sessions_other_story_hidden() {
        let engine = engine();
        engine
            .store()
            .put(&PlayerProgress::new("elsewhere", "p", "lighthouse"))
            .unwrap();
        let id = engine.create_session("p").unwrap().session_id;

        let output = SessionsCommand::new(&engine).run(10);
        let sessions = output.data.clone().unwrap();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].id, id);
        assert_eq!(sessions[0].actions, 1);

        let text = output.format_text();
        assert!(text.contains("Sessions (1 found)"));
        assert!(text.contains(&id));
    }
}
