//! Registry of open sessions.
//!
//! Each open session owns one mutex. Holding it for the length of an action
//! serializes actions within a session while different sessions proceed in
//! parallel. The registry is an explicit value owned by the engine.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

/// Per-session lock table.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The lock for `session_id`, registering the session if needed.
    pub fn handle(&self, session_id: &str) -> Arc<Mutex<()>> {
        let mut sessions = self.sessions.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(sessions.entry(session_id.to_string()).or_default())
    }

    /// Forget a session. Returns whether it was registered.
    pub fn evict(&self, session_id: &str) -> bool {
        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(session_id)
            .is_some()
    }

    /// Give back a handle for a session that turned out not to exist. The
    /// entry is dropped only when no other caller holds it.
    pub fn release(&self, session_id: &str, handle: Arc<Mutex<()>>) {
        let mut sessions = self.sessions.lock().unwrap_or_else(PoisonError::into_inner);
        let unshared = sessions
            .get(session_id)
            .is_some_and(|entry| Arc::ptr_eq(entry, &handle) && Arc::strong_count(&handle) == 2);
        if unshared {
            sessions.remove(session_id);
        }
    }

    pub fn is_open(&self, session_id: &str) -> bool {
        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(session_id)
    }

    /// Registered session ids, sorted.
    pub fn open_sessions(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        ids.sort();
        ids
    }
}
