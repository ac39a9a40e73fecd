//! Core progression logic.
//!
//! Each component works on a `PlayerProgress` value (a snapshot or a
//! working copy) and knows nothing about storage or sessions:
//!
//! - [`resolver`] finds the trigger an utterance activates
//! - [`verifier`] checks evidence requirements and specialization gates
//! - [`evolution`] advances character levels
//! - [`ledger`] credits specialization points exactly once per interaction
//! - [`discovery`] unlocks clues and gated areas

pub mod decision;
pub mod discovery;
pub mod evolution;
pub mod ledger;
pub mod progress;
pub mod resolver;
pub mod verifier;

pub use decision::{
    completion_percent, AccessDecision, AccessDenial, ActionReport, CategoryCredit, CreditReport,
    Decision, OutcomeKind, ProgressSummary,
};
pub use discovery::{DiscoverySource, Propagator};
pub use evolution::{Evolution, Transition};
pub use ledger::{first_unmet_gate, gating_check, CreditOutcome, Ledger};
pub use progress::{interaction, ActionRecord, ActionType, Effect, Mutation, PlayerProgress};
pub use resolver::{resolve, TriggerMatch};
pub use verifier::{Verdict, Verifier};
