//! Collection orchestrator.
//!
//! [`Collector::handle`] takes one `(slug, sha)` pair through the whole
//! pipeline: dedup check, fetch, qualification, persistence, batch
//! accounting, and the threshold-triggered consolidation. Per-commit
//! persistence and batch side effects are gated separately; a consolidation
//! failure never takes `handle` down with it.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use tracing::Instrument;

use crate::domain::{CollectError, Hunk, Result};
use crate::filter::{self, FilterConfig};
use crate::hosting::HostingClient;
use crate::layout::{self, HunkNamer};
use crate::ledger::ProcessedLedger;
use crate::obs;
use crate::state::CollectionState;
use crate::vcs::VcsClient;

/// Commits per consolidation batch unless configured otherwise.
pub const DEFAULT_BATCH_SIZE: usize = 100;

/// Start of the consolidation commit message unless configured otherwise.
pub const DEFAULT_MESSAGE_PREFIX: &str = "Collected batch of";

/// Where a batch consolidation pushes, when configured.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushTarget {
    /// Remote name in the collection work tree.
    pub remote: String,

    /// Refspec handed to the push, shorthand allowed.
    pub refspec: String,
}

impl Default for PushTarget {
    fn default() -> Self {
        PushTarget {
            remote: "origin".to_string(),
            refspec: "master:master".to_string(),
        }
    }
}

/// Collector settings.
#[derive(Debug, Clone)]
pub struct CollectorConfig {
    /// Directory receiving one subdirectory per collected commit.
    pub collection_root: PathBuf,

    /// Structural qualification criteria.
    pub filter: FilterConfig,

    /// Collected commits per consolidation batch.
    pub batch_size: usize,

    /// Consolidation push destination. `None` keeps batches local: stage
    /// and commit still run at every threshold, nothing leaves the machine.
    pub push: Option<PushTarget>,

    /// Start of the consolidation commit message; batch size and timestamp
    /// follow.
    pub commit_message_prefix: String,
}

impl CollectorConfig {
    pub fn new(collection_root: impl Into<PathBuf>) -> Self {
        CollectorConfig {
            collection_root: collection_root.into(),
            filter: FilterConfig::default(),
            batch_size: DEFAULT_BATCH_SIZE,
            push: None,
            commit_message_prefix: DEFAULT_MESSAGE_PREFIX.to_string(),
        }
    }
}

/// What [`Collector::handle`] did with a commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandleOutcome {
    /// Seen before; nothing fetched, nothing written.
    AlreadyProcessed,

    /// Fetched and filtered out; marked processed, no artifacts.
    Rejected,

    /// Persisted under `dir` with `hunks` hunk files plus the archived diff.
    Collected { hunks: usize, dir: PathBuf },
}

impl HandleOutcome {
    pub fn is_collected(&self) -> bool {
        matches!(self, HandleOutcome::Collected { .. })
    }
}

/// Stateful collection loop over trait-backed collaborators.
pub struct Collector {
    config: CollectorConfig,
    hosting: Arc<dyn HostingClient>,
    vcs: Arc<dyn VcsClient>,
    state: CollectionState,
    ledger: Option<ProcessedLedger>,
}

impl Collector {
    /// Build a collector. When a ledger is given, its recorded shas seed the
    /// dedup set so a restart does not re-collect.
    pub fn new(
        config: CollectorConfig,
        hosting: Arc<dyn HostingClient>,
        vcs: Arc<dyn VcsClient>,
        ledger: Option<ProcessedLedger>,
    ) -> Self {
        let state = CollectionState::new();
        if let Some(ledger) = &ledger {
            state.seed(ledger.seeded().iter().cloned());
        }

        Collector {
            config,
            hosting,
            vcs,
            state,
            ledger,
        }
    }

    pub fn config(&self) -> &CollectorConfig {
        &self.config
    }

    pub fn state(&self) -> &CollectionState {
        &self.state
    }

    /// Process one commit end to end.
    ///
    /// At most once per sha: a processed commit is never fetched again, and
    /// a failed fetch leaves no mark, so the caller may retry it. A commit
    /// whose persistence began (at least one hunk file on disk) is marked
    /// even when a later step fails; its partial directory stays put.
    ///
    /// The returned future is `Send`: a shared `Arc<Collector>` can be
    /// handled from spawned tasks.
    pub async fn handle(&self, slug: &str, sha: &str) -> Result<HandleOutcome> {
        let span = obs::commit_span(slug, sha);
        self.run_handle(slug, sha).instrument(span).await
    }

    async fn run_handle(&self, slug: &str, sha: &str) -> Result<HandleOutcome> {
        if self.state.has_processed(sha) {
            obs::emit_commit_skipped(slug, sha);
            return Ok(HandleOutcome::AlreadyProcessed);
        }

        let started = Instant::now();
        let patch = self.hosting.get_commit(slug, sha).await?;
        let hunks = filter::qualify(&patch, &self.config.filter);

        if hunks.is_empty() {
            self.mark_processed(slug, sha);
            obs::emit_commit_rejected(slug, sha, patch.file_count());
            return Ok(HandleOutcome::Rejected);
        }

        let dir = self
            .config
            .collection_root
            .join(layout::commit_dir_name(slug, sha));
        if let Err(failure) = self.persist(slug, sha, &dir, &hunks).await {
            if failure.written > 0 {
                self.mark_processed(slug, sha);
            }
            return Err(failure.error);
        }

        let batch = self.state.increment_batch();
        if batch >= self.config.batch_size {
            self.consolidate(batch);
            self.state.reset_batch();
        }

        self.mark_processed(slug, sha);
        let duration_ms = started.elapsed().as_millis() as u64;
        obs::emit_commit_collected(slug, sha, hunks.len(), duration_ms);

        Ok(HandleOutcome::Collected {
            hunks: hunks.len(),
            dir,
        })
    }

    /// Write the qualifying hunks and the archived full diff into `dir`.
    ///
    /// Hunk files go down one at a time; the first failure stops the walk
    /// and reports how many made it, which decides whether the commit is
    /// marked processed.
    async fn persist(
        &self,
        slug: &str,
        sha: &str,
        dir: &Path,
        hunks: &[Hunk],
    ) -> std::result::Result<(), PersistFailure> {
        fs::create_dir_all(dir).map_err(|e| PersistFailure {
            written: 0,
            error: CollectError::persistence(dir, e),
        })?;

        let mut namer = HunkNamer::new();
        let mut written = 0usize;
        for hunk in hunks {
            let path = dir.join(namer.allocate(&hunk.file, hunk.line));
            fs::write(&path, &hunk.content).map_err(|e| PersistFailure {
                written,
                error: CollectError::persistence(&path, e),
            })?;
            written += 1;
        }

        let raw = self
            .hosting
            .fetch_raw_diff(slug, sha)
            .await
            .map_err(|e| PersistFailure {
                written,
                error: CollectError::Fetch(e),
            })?;
        let diff_path = dir.join(layout::COMMIT_DIFF_FILE);
        fs::write(&diff_path, raw).map_err(|e| PersistFailure {
            written,
            error: CollectError::persistence(&diff_path, e),
        })?;

        Ok(())
    }

    /// Record a commit as processed, appending to the ledger when one is
    /// configured. Ledger append is best-effort: a failure is logged and
    /// the in-memory mark stands.
    fn mark_processed(&self, slug: &str, sha: &str) {
        if !self.state.mark_processed(sha) {
            return;
        }
        if let Some(ledger) = &self.ledger {
            if let Err(e) = ledger.record(slug, sha) {
                obs::emit_ledger_error(sha, &e);
            }
        }
    }

    /// Stage and commit everything under the collection root; push only
    /// when a target is configured. Failures are logged and swallowed so a
    /// broken mirror cannot stall collection.
    fn consolidate(&self, batch: usize) {
        match self.run_consolidation(batch) {
            Ok(pushed) => obs::emit_batch_consolidated(batch, pushed),
            Err(e) => obs::emit_consolidation_error(&e),
        }
    }

    fn run_consolidation(&self, batch: usize) -> Result<bool> {
        self.vcs.stage_all()?;
        let message = format!(
            "{} {} commits at {}",
            self.config.commit_message_prefix,
            batch,
            chrono::Utc::now().format("%Y-%m-%d %H:%M:%S UTC")
        );
        self.vcs.commit(&message)?;

        match &self.config.push {
            Some(target) => {
                self.vcs.push(&target.remote, &target.refspec)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

struct PersistFailure {
    written: usize,
    error: CollectError,
}
