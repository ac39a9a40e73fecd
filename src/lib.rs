//! casebook - knowledge progression and gating for narrative investigations
//!
//! For every player action the engine decides whether a character changes
//! behavioral state, whether clues and areas unlock, and whether the player
//! has earned enough specialization to pass a gate. Progress is monotonic,
//! repeatable actions are credited once, and every decision is recorded.

pub mod cli;
pub mod config;
pub mod content;
pub mod core;
pub mod engine;
pub mod error;
pub mod narrative;
pub mod session;
pub mod storage;
pub mod util;

pub use config::Config;
pub use content::Story;
pub use core::{
    AccessDecision, ActionReport, CreditOutcome, CreditReport, Decision, OutcomeKind, PlayerProgress,
    ProgressSummary,
};
pub use engine::{DefaultNarrator, Engine, Response};
pub use error::{CasebookError, Recover, Result};
pub use narrative::{CommandNarrator, EchoNarrator, FallbackNarrator, Narrator};
pub use session::SessionRegistry;
pub use storage::{FileProgressStore, MemoryProgressStore, ProgressStore};
