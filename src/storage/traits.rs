//! Progress storage trait.

use std::sync::Arc;

use crate::core::{Effect, Mutation, PlayerProgress};
use crate::error::{CasebookError, Result};

/// Trait for progress storage backends.
///
/// Stores are not responsible for serializing concurrent actions on one
/// session; the engine's session registry does that.
pub trait ProgressStore: Send + Sync {
    /// Retrieve progress by session ID.
    ///
    /// Returns `Ok(None)` if the session doesn't exist.
    fn get(&self, session_id: &str) -> Result<Option<PlayerProgress>>;

    /// Save progress, replacing any previous version as one unit.
    fn put(&self, progress: &PlayerProgress) -> Result<()>;

    /// List sessions, most recently updated first, up to `limit`.
    fn list(&self, limit: usize) -> Result<Vec<PlayerProgress>>;

    /// Delete a session. Succeeds if the session doesn't exist.
    fn delete(&self, session_id: &str) -> Result<()>;

    /// Retire a closed session. Backends without an archive delete it.
    fn archive(&self, session_id: &str) -> Result<()> {
        self.delete(session_id)
    }

    /// Check if a session exists.
    fn exists(&self, session_id: &str) -> Result<bool> {
        Ok(self.get(session_id)?.is_some())
    }

    /// Retrieve progress, treating a missing session as `NotFound`.
    fn load(&self, session_id: &str) -> Result<PlayerProgress> {
        self.get(session_id)?
            .ok_or_else(|| CasebookError::not_found("session", session_id))
    }

    /// Apply a single mutation and persist the result.
    ///
    /// Nothing is written when the mutation is a no-op.
    fn apply(&self, session_id: &str, mutation: &Mutation) -> Result<(PlayerProgress, Effect)> {
        let mut progress = self.load(session_id)?;
        let effect = progress.apply(mutation);
        if effect.is_changed() {
            self.put(&progress)?;
        }
        Ok((progress, effect))
    }
}

/// Blanket implementation so `Arc<T>` can be shared between an engine and
/// tests or tools.
impl<T: ProgressStore + ?Sized> ProgressStore for Arc<T> {
    fn get(&self, session_id: &str) -> Result<Option<PlayerProgress>> {
        (**self).get(session_id)
    }

    fn put(&self, progress: &PlayerProgress) -> Result<()> {
        (**self).put(progress)
    }

    fn list(&self, limit: usize) -> Result<Vec<PlayerProgress>> {
        (**self).list(limit)
    }

    fn delete(&self, session_id: &str) -> Result<()> {
        (**self).delete(session_id)
    }

    fn archive(&self, session_id: &str) -> Result<()> {
        (**self).archive(session_id)
    }
}
