//! File-based progress storage.
//!
//! Each session is one versioned JSON document in the sessions directory
//! (`~/.casebook/sessions/` by default). Writes go to a temp file that is
//! synced and renamed over the target, so a failed write leaves the
//! previous version intact. Closed sessions move to `archive/`.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::config::sessions_dir;
use crate::core::PlayerProgress;
use crate::error::{CasebookError, Result};
use crate::storage::{codec, ProgressStore};

/// File-based progress store.
#[derive(Debug, Clone)]
pub struct FileProgressStore {
    sessions_dir: PathBuf,
}

impl FileProgressStore {
    /// Create a store in the default directory.
    pub fn new() -> Result<Self> {
        let dir = sessions_dir().ok_or_else(|| {
            CasebookError::config("Could not determine sessions directory (no home directory)")
        })?;
        Self::with_dir(dir)
    }

    /// Create a store in `sessions_dir`, creating it if needed.
    pub fn with_dir(sessions_dir: impl Into<PathBuf>) -> Result<Self> {
        let sessions_dir = sessions_dir.into();
        if !sessions_dir.exists() {
            fs::create_dir_all(&sessions_dir)
                .map_err(|e| CasebookError::persistence(&sessions_dir, e))?;
        }
        Ok(Self { sessions_dir })
    }

    pub fn dir(&self) -> &Path {
        &self.sessions_dir
    }

    fn session_path(&self, id: &str) -> PathBuf {
        self.sessions_dir.join(format!("{}.json", id))
    }

    fn temp_path(&self, id: &str) -> PathBuf {
        self.sessions_dir.join(format!(".{}.json.tmp", id))
    }

    fn archive_dir(&self) -> PathBuf {
        self.sessions_dir.join("archive")
    }

    /// Write progress atomically using temp file + rename.
    fn atomic_write(&self, progress: &PlayerProgress) -> Result<()> {
        let final_path = self.session_path(&progress.session_id);
        let temp_path = self.temp_path(&progress.session_id);

        let json = codec::encode(progress)?;

        {
            let mut file = fs::File::create(&temp_path)
                .map_err(|e| CasebookError::persistence(&temp_path, e))?;
            file.write_all(json.as_bytes())
                .map_err(|e| CasebookError::persistence(&temp_path, e))?;
            file.sync_all()
                .map_err(|e| CasebookError::persistence(&temp_path, e))?;
        }

        fs::rename(&temp_path, &final_path)
            .map_err(|e| CasebookError::persistence(&final_path, e))?;

        Ok(())
    }
}

/// Session ids become file names, so only a conservative alphabet is
/// accepted.
fn is_valid_session_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= 128
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

impl ProgressStore for FileProgressStore {
    fn get(&self, session_id: &str) -> Result<Option<PlayerProgress>> {
        if !is_valid_session_id(session_id) {
            return Ok(None);
        }
        let path = self.session_path(session_id);
        if !path.exists() {
            return Ok(None);
        }

        let content =
            fs::read_to_string(&path).map_err(|e| CasebookError::persistence(&path, e))?;
        Ok(Some(codec::decode(&content)?))
    }

    fn put(&self, progress: &PlayerProgress) -> Result<()> {
        if !is_valid_session_id(&progress.session_id) {
            return Err(CasebookError::persistence(
                self.session_path(&progress.session_id),
                io::Error::new(io::ErrorKind::InvalidInput, "invalid session id"),
            ));
        }
        self.atomic_write(progress)
    }

    fn list(&self, limit: usize) -> Result<Vec<PlayerProgress>> {
        if !self.sessions_dir.exists() {
            return Ok(Vec::new());
        }

        let entries = fs::read_dir(&self.sessions_dir)
            .map_err(|e| CasebookError::persistence(&self.sessions_dir, e))?;

        let mut sessions = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| CasebookError::persistence(&self.sessions_dir, e))?;
            let path = entry.path();

            if path.extension().map(|e| e != "json").unwrap_or(true) {
                continue;
            }
            if path
                .file_name()
                .map(|n| n.to_string_lossy().starts_with('.'))
                .unwrap_or(true)
            {
                continue;
            }

            match fs::read_to_string(&path)
                .map_err(|e| CasebookError::persistence(&path, e))
                .and_then(|content| codec::decode(&content))
            {
                Ok(progress) => sessions.push(progress),
                Err(err) => tracing::warn!("skipping unreadable session {}: {}", path.display(), err),
            }
        }

        sessions.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        sessions.truncate(limit);
        Ok(sessions)
    }

    fn delete(&self, session_id: &str) -> Result<()> {
        if !is_valid_session_id(session_id) {
            return Ok(());
        }
        let path = self.session_path(session_id);
        if path.exists() {
            fs::remove_file(&path).map_err(|e| CasebookError::persistence(&path, e))?;
        }

        let temp_path = self.temp_path(session_id);
        if temp_path.exists() {
            let _ = fs::remove_file(&temp_path);
        }

        Ok(())
    }

    fn archive(&self, session_id: &str) -> Result<()> {
        if !is_valid_session_id(session_id) {
            return Ok(());
        }
        let path = self.session_path(session_id);
        if !path.exists() {
            return Ok(());
        }

        let archive_dir = self.archive_dir();
        fs::create_dir_all(&archive_dir)
            .map_err(|e| CasebookError::persistence(&archive_dir, e))?;
        let target = archive_dir.join(format!("{}.json", session_id));
        fs::rename(&path, &target).map_err(|e| CasebookError::persistence(&target, e))?;

        tracing::debug!(session = session_id, "archived to {}", target.display());
        Ok(())
    }
}
