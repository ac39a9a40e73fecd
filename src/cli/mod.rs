//! Command output helpers for the `casebook` shell.
//!
//! Every command prints a JSON envelope with a success flag, the operation's
//! result, or an error message. `sessions` can also print a table.

pub mod output;
pub mod sessions;

pub use output::CommandOutput;
pub use sessions::{SessionSummary, SessionsCommand};
