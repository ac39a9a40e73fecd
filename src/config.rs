//! Configuration loading for casebook.
//!
//! Configuration follows a precedence chain:
//! 1. Environment variables (highest priority)
//! 2. Project config (`.casebook/config.toml`)
//! 3. User config (`~/.casebook/config.toml`)
//! 4. Defaults (lowest priority)
//!
//! All configuration is optional. The engine runs with sensible defaults
//! when no config exists.

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{CasebookError, Result};

/// Main configuration struct for casebook.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Session persistence configuration.
    pub storage: StorageConfig,
    /// Narrative service configuration.
    pub narrative: NarrativeConfig,
}

/// Session persistence configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory for session files. `None` means `<casebook_home>/sessions`.
    pub sessions_dir: Option<PathBuf>,
    /// Move closed sessions into `archive/` instead of deleting them.
    pub archive_on_close: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            sessions_dir: None,
            archive_on_close: true,
        }
    }
}

/// Narrative service configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct NarrativeConfig {
    /// External command (program followed by arguments). Empty disables the
    /// service and base texts are used verbatim.
    pub command: Vec<String>,
    /// Total attempts per phrasing request.
    pub attempts: u32,
    /// Fixed delay between attempts, in milliseconds.
    pub retry_delay_ms: u64,
    /// Per-attempt timeout, in milliseconds.
    pub timeout_ms: u64,
    /// Canned lines used when both the service and the base text are empty.
    pub fallback_lines: Vec<String>,
}

/// Minimum valid attempts value.
pub const MIN_ATTEMPTS: u32 = 1;

/// Upper bound on attempts per phrasing request.
pub const MAX_ATTEMPTS: u32 = 10;

impl NarrativeConfig {
    /// Check if an attempts value is within `[MIN_ATTEMPTS, MAX_ATTEMPTS]`.
    pub fn is_valid_attempts(value: u32) -> bool {
        (MIN_ATTEMPTS..=MAX_ATTEMPTS).contains(&value)
    }

    /// Check if a timeout is usable (must be > 0).
    pub fn is_valid_timeout_ms(value: u64) -> bool {
        value > 0
    }

    /// Delay between attempts.
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    /// Per-attempt timeout.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for NarrativeConfig {
    fn default() -> Self {
        Self {
            command: Vec::new(),
            attempts: 3,
            retry_delay_ms: 500,
            timeout_ms: 10_000,
            fallback_lines: vec![
                "They look at you for a long moment and say nothing.".to_string(),
                "\"I have nothing more to add right now.\"".to_string(),
                "The silence stretches between you.".to_string(),
            ],
        }
    }
}

impl Config {
    /// Load configuration with the full precedence chain, using the current
    /// working directory for the project layer.
    pub fn load() -> Self {
        match env::current_dir() {
            Ok(cwd) => Self::load_from_cwd(&cwd),
            Err(_) => {
                let mut config = Config::default();
                if let Some(user_config) = Self::load_user_config() {
                    config = config.merge(user_config);
                }
                config.apply_env_overrides();
                config
            }
        }
    }

    /// Load configuration with a specific working directory.
    pub fn load_from_cwd(cwd: &Path) -> Self {
        let mut config = Config::default();

        if let Some(user_config) = Self::load_user_config() {
            config = config.merge(user_config);
        }

        if let Some(project_config) = Self::load_project_config(cwd) {
            config = config.merge(project_config);
        }

        config.apply_env_overrides();

        config
    }

    fn load_user_config() -> Option<Config> {
        let home = casebook_home()?;
        Self::load_from_file(&home.join("config.toml")).ok()
    }

    fn load_project_config(cwd: &Path) -> Option<Config> {
        let config_path = cwd.join(".casebook").join("config.toml");
        Self::load_from_file(&config_path).ok()
    }

    /// Load config from a specific file path.
    pub fn load_from_file(path: &Path) -> Result<Config> {
        let content =
            fs::read_to_string(path).map_err(|e| CasebookError::persistence(path, e))?;
        toml::from_str(&content).map_err(|e| CasebookError::config(e.to_string()))
    }

    /// Apply environment variable overrides. Invalid values are ignored with
    /// a warning.
    fn apply_env_overrides(&mut self) {
        // CASEBOOK_SESSIONS_DIR
        if let Ok(val) = env::var("CASEBOOK_SESSIONS_DIR") {
            if val.is_empty() {
                tracing::warn!("CASEBOOK_SESSIONS_DIR is empty, ignoring");
            } else {
                self.storage.sessions_dir = Some(PathBuf::from(val));
            }
        }

        // CASEBOOK_NARRATIVE_ATTEMPTS
        if let Ok(val) = env::var("CASEBOOK_NARRATIVE_ATTEMPTS") {
            match val.parse::<u32>() {
                Ok(n) if NarrativeConfig::is_valid_attempts(n) => self.narrative.attempts = n,
                _ => tracing::warn!(
                    "Invalid CASEBOOK_NARRATIVE_ATTEMPTS value '{}'. \
                     Expected {}..={}. Using '{}'.",
                    val,
                    MIN_ATTEMPTS,
                    MAX_ATTEMPTS,
                    self.narrative.attempts
                ),
            }
        }

        // CASEBOOK_NARRATIVE_RETRY_DELAY_MS
        if let Ok(val) = env::var("CASEBOOK_NARRATIVE_RETRY_DELAY_MS") {
            match val.parse::<u64>() {
                Ok(n) => self.narrative.retry_delay_ms = n,
                Err(_) => tracing::warn!(
                    "Invalid CASEBOOK_NARRATIVE_RETRY_DELAY_MS value '{}'. \
                     Expected a non-negative integer. Using '{}'.",
                    val,
                    self.narrative.retry_delay_ms
                ),
            }
        }

        // CASEBOOK_NARRATIVE_TIMEOUT_MS
        if let Ok(val) = env::var("CASEBOOK_NARRATIVE_TIMEOUT_MS") {
            match val.parse::<u64>() {
                Ok(n) if NarrativeConfig::is_valid_timeout_ms(n) => {
                    self.narrative.timeout_ms = n
                }
                _ => tracing::warn!(
                    "Invalid CASEBOOK_NARRATIVE_TIMEOUT_MS value '{}'. \
                     Expected a positive integer. Using '{}'.",
                    val,
                    self.narrative.timeout_ms
                ),
            }
        }
    }

    /// Merge another config into this one, field by field.
    ///
    /// Values in `other` that differ from the defaults win. A layer cannot
    /// reset a lower layer's customization back to the default value.
    fn merge(mut self, other: Config) -> Self {
        let default_storage = StorageConfig::default();
        if other.storage.sessions_dir.is_some() {
            self.storage.sessions_dir = other.storage.sessions_dir;
        }
        if other.storage.archive_on_close != default_storage.archive_on_close {
            self.storage.archive_on_close = other.storage.archive_on_close;
        }

        let default_narrative = NarrativeConfig::default();
        if other.narrative.command != default_narrative.command {
            self.narrative.command = other.narrative.command;
        }
        if other.narrative.attempts != default_narrative.attempts {
            self.narrative.attempts = other.narrative.attempts;
        }
        if other.narrative.retry_delay_ms != default_narrative.retry_delay_ms {
            self.narrative.retry_delay_ms = other.narrative.retry_delay_ms;
        }
        if other.narrative.timeout_ms != default_narrative.timeout_ms {
            self.narrative.timeout_ms = other.narrative.timeout_ms;
        }
        if other.narrative.fallback_lines != default_narrative.fallback_lines {
            self.narrative.fallback_lines = other.narrative.fallback_lines;
        }

        self
    }

    /// Resolve the sessions directory: explicit config first, then
    /// `<casebook_home>/sessions`.
    pub fn sessions_dir(&self) -> Option<PathBuf> {
        self.storage.sessions_dir.clone().or_else(sessions_dir)
    }
}

/// Get the casebook home directory.
///
/// Checks `CASEBOOK_HOME` first, then falls back to `~/.casebook`. An empty
/// `CASEBOOK_HOME` is ignored.
pub fn casebook_home() -> Option<PathBuf> {
    if let Ok(home) = env::var("CASEBOOK_HOME") {
        if home.is_empty() {
            tracing::warn!("CASEBOOK_HOME is empty, using default");
        } else {
            let path = PathBuf::from(&home);
            if path.is_absolute() {
                return Some(path);
            }
            if let Ok(canonical) = path.canonicalize() {
                return Some(canonical);
            }
            tracing::warn!("CASEBOOK_HOME is relative and doesn't exist, using as-is");
            return Some(path);
        }
    }

    if let Some(home) = dirs::home_dir() {
        return Some(home.join(".casebook"));
    }

    let fallback = env::temp_dir().join("casebook");
    tracing::warn!(
        "HOME not set, using fallback location: {}",
        fallback.display()
    );
    Some(fallback)
}

/// Get the default sessions directory, `<casebook_home>/sessions/`.
pub fn sessions_dir() -> Option<PathBuf> {
    casebook_home().map(|h| h.join("sessions"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use tempfile::TempDir;

    fn clear_env() {
        for key in [
            "CASEBOOK_SESSIONS_DIR",
            "CASEBOOK_NARRATIVE_ATTEMPTS",
            "CASEBOOK_NARRATIVE_RETRY_DELAY_MS",
            "CASEBOOK_NARRATIVE_TIMEOUT_MS",
        ] {
            env::remove_var(key);
        }
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert!(config.storage.sessions_dir.is_none());
        assert!(config.storage.archive_on_close);

        assert!(config.narrative.command.is_empty());
        assert_eq!(config.narrative.attempts, 3);
        assert_eq!(config.narrative.retry_delay(), Duration::from_millis(500));
        assert_eq!(config.narrative.timeout(), Duration::from_secs(10));
        assert!(!config.narrative.fallback_lines.is_empty());
    }

    #[test]
    fn test_load_from_file() {
        let dir = TempDir::new().unwrap();
        let config_path = dir.path().join("config.toml");

        let toml_content = r#"
[narrative]
command = ["ollama-phrase", "--model", "llama3"]
attempts = 5

[storage]
archive_on_close = false
"#;
        fs::write(&config_path, toml_content).unwrap();

        let config = Config::load_from_file(&config_path).unwrap();

        assert_eq!(
            config.narrative.command,
            vec!["ollama-phrase", "--model", "llama3"]
        );
        assert_eq!(config.narrative.attempts, 5);
        assert!(!config.storage.archive_on_close);
        // Unspecified fields keep defaults
        assert_eq!(config.narrative.retry_delay_ms, 500);
    }

    #[test]
    fn test_load_from_file_missing() {
        let result = Config::load_from_file(Path::new("/nonexistent/config.toml"));
        assert!(matches!(result, Err(CasebookError::Persistence { .. })));
    }

    #[test]
    fn test_load_from_file_invalid_toml() {
        let dir = TempDir::new().unwrap();
        let config_path = dir.path().join("config.toml");
        fs::write(&config_path, "not toml [[[").unwrap();

        let result = Config::load_from_file(&config_path);
        assert!(matches!(result, Err(CasebookError::Config { .. })));
    }

    #[test]
    #[serial]
    fn test_project_config_precedence() {
        clear_env();
        let dir = TempDir::new().unwrap();
        let project_dir = dir.path().join(".casebook");
        fs::create_dir_all(&project_dir).unwrap();
        fs::write(
            project_dir.join("config.toml"),
            "[narrative]\nretry_delay_ms = 50\n",
        )
        .unwrap();

        let config = Config::load_from_cwd(dir.path());

        assert_eq!(config.narrative.retry_delay_ms, 50);
    }

    #[test]
    #[serial]
    fn test_env_var_precedence() {
        clear_env();
        let dir = TempDir::new().unwrap();
        let project_dir = dir.path().join(".casebook");
        fs::create_dir_all(&project_dir).unwrap();
        fs::write(project_dir.join("config.toml"), "[narrative]\nattempts = 7\n").unwrap();

        env::set_var("CASEBOOK_NARRATIVE_ATTEMPTS", "2");
        let config = Config::load_from_cwd(dir.path());
        assert_eq!(config.narrative.attempts, 2);

        clear_env();
    }

    #[test]
    #[serial]
    fn test_env_var_overrides() {
        clear_env();
        env::set_var("CASEBOOK_SESSIONS_DIR", "/var/lib/casebook");
        env::set_var("CASEBOOK_NARRATIVE_ATTEMPTS", "4");
        env::set_var("CASEBOOK_NARRATIVE_RETRY_DELAY_MS", "0");
        env::set_var("CASEBOOK_NARRATIVE_TIMEOUT_MS", "2500");

        let mut config = Config::default();
        config.apply_env_overrides();

        assert_eq!(
            config.storage.sessions_dir,
            Some(PathBuf::from("/var/lib/casebook"))
        );
        assert_eq!(config.narrative.attempts, 4);
        assert_eq!(config.narrative.retry_delay_ms, 0);
        assert_eq!(config.narrative.timeout_ms, 2500);

        clear_env();
    }

    #[test]
    #[serial]
    fn test_env_var_invalid_values_ignored() {
        clear_env();
        env::set_var("CASEBOOK_NARRATIVE_ATTEMPTS", "0");
        env::set_var("CASEBOOK_NARRATIVE_TIMEOUT_MS", "0");
        env::set_var("CASEBOOK_NARRATIVE_RETRY_DELAY_MS", "soon");
        env::set_var("CASEBOOK_SESSIONS_DIR", "");

        let mut config = Config::default();
        config.apply_env_overrides();

        assert_eq!(config, Config::default());

        clear_env();
    }

    #[test]
    fn test_is_valid_attempts() {
        assert!(!NarrativeConfig::is_valid_attempts(0));
        assert!(NarrativeConfig::is_valid_attempts(1));
        assert!(NarrativeConfig::is_valid_attempts(MAX_ATTEMPTS));
        assert!(!NarrativeConfig::is_valid_attempts(MAX_ATTEMPTS + 1));
    }

    #[test]
    fn test_merge_field_by_field() {
        let user = Config {
            narrative: NarrativeConfig {
                attempts: 5,
                ..NarrativeConfig::default()
            },
            ..Config::default()
        };
        let project = Config {
            narrative: NarrativeConfig {
                command: vec!["phrase".to_string()],
                ..NarrativeConfig::default()
            },
            storage: StorageConfig {
                sessions_dir: Some(PathBuf::from("/tmp/cases")),
                archive_on_close: true,
            },
        };

        let merged = Config::default().merge(user).merge(project);

        assert_eq!(merged.narrative.attempts, 5);
        assert_eq!(merged.narrative.command, vec!["phrase"]);
        assert_eq!(
            merged.storage.sessions_dir,
            Some(PathBuf::from("/tmp/cases"))
        );
    }

    #[test]
    fn test_toml_roundtrip() {
        let config = Config {
            storage: StorageConfig {
                sessions_dir: Some(PathBuf::from("/data/sessions")),
                archive_on_close: false,
            },
            narrative: NarrativeConfig {
                command: vec!["narrate".to_string(), "--fast".to_string()],
                attempts: 2,
                retry_delay_ms: 100,
                timeout_ms: 3000,
                fallback_lines: vec!["...".to_string()],
            },
        };

        let toml_str = toml::to_string(&config).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(config, parsed);
    }

    #[test]
    #[serial]
    fn test_casebook_home_with_env() {
        let dir = TempDir::new().unwrap();
        env::set_var("CASEBOOK_HOME", dir.path().to_str().unwrap());

        assert_eq!(casebook_home().unwrap(), dir.path());
        assert_eq!(sessions_dir().unwrap(), dir.path().join("sessions"));

        env::remove_var("CASEBOOK_HOME");
    }

    #[test]
    #[serial]
    fn test_casebook_home_empty_env() {
        env::set_var("CASEBOOK_HOME", "");

        let home = casebook_home();
        assert!(home.is_some());
        assert!(home.unwrap().ends_with(".casebook") || dirs::home_dir().is_none());

        env::remove_var("CASEBOOK_HOME");
    }

    #[test]
    fn test_config_sessions_dir_prefers_explicit() {
        let config = Config {
            storage: StorageConfig {
                sessions_dir: Some(PathBuf::from("/explicit")),
                archive_on_close: true,
            },
            ..Config::default()
        };
        assert_eq!(config.sessions_dir(), Some(PathBuf::from("/explicit")));
    }
}
