//! In-memory progress storage.
//!
//! Used by tests and by embedders that persist elsewhere. Archived sessions
//! are kept in a separate map so they stay inspectable.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use crate::core::PlayerProgress;
use crate::error::Result;
use crate::storage::ProgressStore;

/// Thread-safe in-memory store using `RwLock<HashMap>`.
#[derive(Debug, Default)]
pub struct MemoryProgressStore {
    sessions: RwLock<HashMap<String, PlayerProgress>>,
    archived: RwLock<HashMap<String, PlayerProgress>>,
}

impl MemoryProgressStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live sessions.
    pub fn len(&self) -> usize {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Retrieve an archived session.
    pub fn get_archived(&self, session_id: &str) -> Option<PlayerProgress> {
        self.archived
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(session_id)
            .cloned()
    }
}

impl ProgressStore for MemoryProgressStore {
    fn get(&self, session_id: &str) -> Result<Option<PlayerProgress>> {
        let sessions = self.sessions.read().unwrap_or_else(PoisonError::into_inner);
        Ok(sessions.get(session_id).cloned())
    }

    fn put(&self, progress: &PlayerProgress) -> Result<()> {
        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        sessions.insert(progress.session_id.clone(), progress.clone());
        Ok(())
    }

    fn list(&self, limit: usize) -> Result<Vec<PlayerProgress>> {
        let sessions = self.sessions.read().unwrap_or_else(PoisonError::into_inner);
        let mut result: Vec<PlayerProgress> = sessions.values().cloned().collect();
        result.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        result.truncate(limit);
        Ok(result)
    }

    fn delete(&self, session_id: &str) -> Result<()> {
        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        sessions.remove(session_id);
        Ok(())
    }

    fn archive(&self, session_id: &str) -> Result<()> {
        let removed = self
            .sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(session_id);
        if let Some(progress) = removed {
            self.archived
                .write()
                .unwrap_or_else(PoisonError::into_inner)
                .insert(session_id.to_string(), progress);
        }
        Ok(())
    }
}
