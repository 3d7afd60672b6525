//! Structured observability hooks for the collection lifecycle.
//!
//! This module provides:
//! - Commit-scoped tracing spans via [`commit_span`]
//! - Emission functions for the lifecycle events: skip, reject, collect,
//!   consolidate, and the two best-effort failure paths
//!
//! Events are emitted at `info!` level; best-effort failures at `warn!`.
//! Credentials never appear in any field.

use tracing::{info, warn};

/// Span covering one `handle` call, tagged with the commit coordinates.
///
/// Attached to the call's future with `tracing::Instrument` rather than
/// entered directly: an entered guard must not be held across an await
/// point, and it would pin the future to one thread.
pub fn commit_span(slug: &str, sha: &str) -> tracing::Span {
    tracing::info_span!("fixcorpus.commit", slug = %slug, sha = %sha)
}

/// Emit event: commit skipped because it was already processed.
pub fn emit_commit_skipped(slug: &str, sha: &str) {
    info!(event = "commit.skipped", slug = %slug, sha = %sha);
}

/// Emit event: commit fetched but rejected by the filter.
pub fn emit_commit_rejected(slug: &str, sha: &str, files: usize) {
    info!(event = "commit.rejected", slug = %slug, sha = %sha, files = files);
}

/// Emit event: commit collected with its hunk count and elapsed time.
pub fn emit_commit_collected(slug: &str, sha: &str, hunks: usize, duration_ms: u64) {
    info!(
        event = "commit.collected",
        slug = %slug,
        sha = %sha,
        hunks = hunks,
        duration_ms = duration_ms,
    );
}

/// Emit event: batch threshold reached and consolidation ran.
pub fn emit_batch_consolidated(batch_size: usize, pushed: bool) {
    info!(
        event = "batch.consolidated",
        batch_size = batch_size,
        pushed = pushed,
    );
}

/// Emit event: consolidation failed (warning level; collection continues).
pub fn emit_consolidation_error(error: &dyn std::fmt::Display) {
    warn!(event = "batch.consolidation_error", error = %error);
}

/// Emit event: ledger append failed (warning level; collection continues).
pub fn emit_ledger_error(sha: &str, error: &dyn std::fmt::Display) {
    warn!(event = "ledger.append_error", sha = %sha, error = %error);
}
