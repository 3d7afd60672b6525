//! Domain models for fixcorpus.
//!
//! Canonical definitions for the core entities:
//! - `CommitPatch`: a commit's change set as served by the hosting API
//! - `FileChange`: one file entry of a change set
//! - `Hunk`: a qualifying change fragment, ready for persistence
//! - the error taxonomy of the collection pipeline

pub mod diff;
pub mod error;

// Re-export main types and errors
pub use diff::{CommitPatch, FileChange, Hunk};
pub use error::{CollectError, FetchError, Result, VcsError};
