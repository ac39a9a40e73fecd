//! Progress storage.
//!
//! Persistent storage for per-session player progress, with file-based and
//! in-memory backends sharing one versioned JSON codec.

pub mod codec;
pub mod file;
pub mod memory;
pub mod traits;

pub use codec::PROGRESS_SCHEMA_VERSION;
pub use file::FileProgressStore;
pub use memory::MemoryProgressStore;
pub use traits::ProgressStore;
