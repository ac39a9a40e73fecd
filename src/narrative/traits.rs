//! Narrative service trait.
//!
//! The narrative service only phrases outcomes that the engine has already
//! decided and persisted. It never sees or changes progress.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::Result;

/// A phrasing request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NarrativeRequest {
    /// Who is speaking, e.g. the character's name.
    pub subject: String,
    /// Context for tone: personality and current stance.
    pub context: String,
    /// Content text to phrase. Also the first fallback.
    pub base_text: String,
    /// What the phrasing should accomplish, e.g. "deflect" or "reveal".
    pub instruction: String,
}

/// Trait for narrative services.
pub trait Narrator: Send + Sync {
    /// Phrase a request. Errors are recovered by the caller.
    fn phrase(&self, request: &NarrativeRequest) -> Result<String>;

    /// Service name for logging.
    fn name(&self) -> &'static str;
}

impl<T: Narrator + ?Sized> Narrator for Box<T> {
    fn phrase(&self, request: &NarrativeRequest) -> Result<String> {
        (**self).phrase(request)
    }

    fn name(&self) -> &'static str {
        (**self).name()
    }
}

impl<T: Narrator + ?Sized> Narrator for Arc<T> {
    fn phrase(&self, request: &NarrativeRequest) -> Result<String> {
        (**self).phrase(request)
    }

    fn name(&self) -> &'static str {
        (**self).name()
    }
}

/// Returns the base text unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct EchoNarrator;

impl Narrator for EchoNarrator {
    fn phrase(&self, request: &NarrativeRequest) -> Result<String> {
        Ok(request.base_text.clone())
    }

    fn name(&self) -> &'static str {
        "echo"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_echo_returns_base_text() {
        let request = NarrativeRequest {
            base_text: "I was in the garden.".into(),
            ..NarrativeRequest::default()
        };
        assert_eq!(EchoNarrator.phrase(&request).unwrap(), "I was in the garden.");
        assert_eq!(EchoNarrator.name(), "echo");
    }

    #[test]
    fn test_boxed_narrator_delegates() {
        let boxed: Box<dyn Narrator> = Box::new(EchoNarrator);
        let request = NarrativeRequest {
            base_text: "text".into(),
            ..NarrativeRequest::default()
        };
        assert_eq!(boxed.phrase(&request).unwrap(), "text");
    }
}
