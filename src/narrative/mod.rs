//! Narrative phrasing of decided outcomes.
//!
//! The engine consults a narrator only after an action's state is
//! persisted. Failures degrade to base texts or canned lines.

pub mod command;
pub mod fallback;
pub mod traits;

pub use command::CommandNarrator;
pub use fallback::FallbackNarrator;
pub use traits::{EchoNarrator, NarrativeRequest, Narrator};
