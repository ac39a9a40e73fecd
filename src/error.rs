//! Error types for the progression engine.
//!
//! Only two kinds of failure escape an engine operation: something the
//! caller named does not exist, or the session could not be read or
//! written. Everything else a player can cause (unmet requirements, a
//! level that cannot advance) is reported as data on the decision. The
//! narrative collaborator is recovered locally through [`Recover`].

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// The main error type for casebook operations.
#[derive(Error, Debug)]
pub enum CasebookError {
    /// A referenced session, character, category or other entity is unknown.
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    /// I/O errors while reading or writing session files.
    #[error("persistence error at {path}: {source}")]
    Persistence {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// JSON encoding/decoding errors, including schema version mismatches.
    #[error("serialization error: {message}")]
    Serde { message: String },

    /// Configuration loading errors.
    #[error("config error: {message}")]
    Config { message: String },

    /// Story content that fails validation.
    #[error("content error: {message}")]
    Content { message: String },

    /// The narrative service did not produce text.
    #[error("narrative service unavailable: {message}")]
    Narrative { message: String },
}

/// A specialized Result type for casebook operations.
pub type Result<T> = std::result::Result<T, CasebookError>;

impl CasebookError {
    /// Create a not-found error for an entity kind and id.
    pub fn not_found(kind: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            kind,
            id: id.to_string(),
        }
    }

    /// Create a persistence error from an I/O error.
    pub fn persistence(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Persistence {
            path: path.into(),
            source,
        }
    }

    /// Create a serialization error.
    pub fn serde(message: impl Into<String>) -> Self {
        Self::Serde {
            message: message.into(),
        }
    }

    /// Create a config error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a content validation error.
    pub fn content(message: impl Into<String>) -> Self {
        Self::Content {
            message: message.into(),
        }
    }

    /// Create a narrative service error.
    pub fn narrative(message: impl Into<String>) -> Self {
        Self::Narrative {
            message: message.into(),
        }
    }

    /// True when the failure came from the storage layer rather than
    /// from the caller's input.
    pub fn is_persistence(&self) -> bool {
        matches!(self, Self::Persistence { .. } | Self::Serde { .. })
    }
}

impl From<io::Error> for CasebookError {
    fn from(err: io::Error) -> Self {
        Self::Persistence {
            path: PathBuf::new(),
            source: err,
        }
    }
}

impl From<serde_json::Error> for CasebookError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serde {
            message: err.to_string(),
        }
    }
}

/// Local recovery for collaborators whose failure must not change state.
pub trait Recover<T> {
    /// Log a warning and return the default value on error.
    fn recover_default(self, context: &str) -> T
    where
        T: Default;

    /// Log a warning and return `fallback` on error.
    fn recover_with(self, context: &str, fallback: T) -> T;
}

impl<T> Recover<T> for Result<T> {
    fn recover_default(self, context: &str) -> T
    where
        T: Default,
    {
        match self {
            Ok(value) => value,
            Err(err) => {
                tracing::warn!("{}: {} (recovered: using default)", context, err);
                T::default()
            }
        }
    }

    fn recover_with(self, context: &str, fallback: T) -> T {
        match self {
            Ok(value) => value,
            Err(err) => {
                tracing::warn!("{}: {} (recovered: using fallback)", context, err);
                fallback
            }
        }
    }
}
