//! Versioned JSON encoding for persisted progress.
//!
//! Progress is wrapped in an envelope carrying `schema_version`. Sets encode
//! as ordered lists and integer-keyed maps as objects with stringified keys,
//! both of which decode back to the same values.

use serde::{Deserialize, Serialize};

use crate::core::PlayerProgress;
use crate::error::{CasebookError, Result};

/// Schema version written by this build.
pub const PROGRESS_SCHEMA_VERSION: u32 = 1;

#[derive(Serialize)]
struct EnvelopeRef<'a> {
    schema_version: u32,
    progress: &'a PlayerProgress,
}

#[derive(Deserialize)]
struct VersionProbe {
    schema_version: u32,
}

#[derive(Deserialize)]
struct Envelope {
    progress: PlayerProgress,
}

/// Encode progress into a versioned JSON document.
pub fn encode(progress: &PlayerProgress) -> Result<String> {
    let envelope = EnvelopeRef {
        schema_version: PROGRESS_SCHEMA_VERSION,
        progress,
    };
    Ok(serde_json::to_string_pretty(&envelope)?)
}

/// Decode a versioned JSON document.
///
/// Documents from a newer schema are rejected rather than partially read.
pub fn decode(json: &str) -> Result<PlayerProgress> {
    let probe: VersionProbe = serde_json::from_str(json)?;
    match probe.schema_version {
        PROGRESS_SCHEMA_VERSION => Ok(serde_json::from_str::<Envelope>(json)?.progress),
        other => Err(CasebookError::serde(format!(
            "unsupported progress schema version {} (expected {})",
            other, PROGRESS_SCHEMA_VERSION
        ))),
    }
}
