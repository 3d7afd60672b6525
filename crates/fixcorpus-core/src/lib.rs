//! fixcorpus Core Library
//!
//! Re-exports core components for programmatic access to the collection
//! pipeline: commit fetching, hunk extraction, qualification, persistence
//! and batch consolidation.

pub mod collector;
pub mod domain;
pub mod extract;
pub mod fakes;
pub mod filter;
pub mod hosting;
pub mod layout;
pub mod ledger;
pub mod obs;
pub mod state;
pub mod telemetry;
pub mod vcs;

pub use collector::{
    Collector, CollectorConfig, HandleOutcome, PushTarget, DEFAULT_BATCH_SIZE,
    DEFAULT_MESSAGE_PREFIX,
};

pub use domain::{CollectError, CommitPatch, FetchError, FileChange, Hunk, Result, VcsError};

pub use extract::{hunks_by_file, parse_hunks, split_files, RawHunk};

pub use filter::{qualify, FilterConfig};

pub use hosting::{GithubConfig, GithubHosting, HostingClient};

pub use layout::{commit_dir_name, hunk_file_name, HunkNamer, COMMIT_DIFF_FILE};

pub use ledger::{ProcessedLedger, ProcessedRecord};

pub use obs::{
    commit_span, emit_batch_consolidated, emit_commit_collected, emit_commit_rejected,
    emit_commit_skipped, emit_consolidation_error, emit_ledger_error,
};

pub use state::CollectionState;

pub use telemetry::init_tracing;

pub use vcs::{GitWorkTree, VcsClient};

/// fixcorpus version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
