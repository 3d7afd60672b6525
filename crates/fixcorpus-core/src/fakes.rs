//! In-memory fakes for the collector's external seams (testing only)
//!
//! Provides `StaticHosting` and `RecordingVcs` that satisfy
//! [`crate::hosting::HostingClient`] and [`crate::vcs::VcsClient`] without
//! touching the network or a real repository. Both count their calls so
//! tests can assert at-most-once and batch-trigger behaviour.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::domain::{CommitPatch, FetchError, VcsError};
use crate::hosting::HostingClient;
use crate::vcs::VcsClient;

// ---------------------------------------------------------------------------
// StaticHosting
// ---------------------------------------------------------------------------

/// Hosting client serving canned commits from memory.
#[derive(Debug, Default)]
pub struct StaticHosting {
    commits: Mutex<HashMap<String, CommitPatch>>,
    raw_diffs: Mutex<HashMap<String, String>>,
    commit_fetches: Mutex<HashMap<String, usize>>,
    diff_fetches: Mutex<HashMap<String, usize>>,
    failing_commits: Mutex<HashSet<String>>,
    failing_diffs: Mutex<HashSet<String>>,
}

fn key(slug: &str, sha: &str) -> String {
    format!("{}@{}", slug, sha)
}

impl StaticHosting {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a commit and the raw diff its `.diff` endpoint serves.
    pub fn add_commit(&self, patch: CommitPatch, raw_diff: impl Into<String>) {
        let k = key(&patch.slug, &patch.sha);
        self.raw_diffs.lock().unwrap().insert(k.clone(), raw_diff.into());
        self.commits.lock().unwrap().insert(k, patch);
    }

    /// Make `get_commit` fail for this commit until restored.
    pub fn fail_commit(&self, slug: &str, sha: &str) {
        self.failing_commits.lock().unwrap().insert(key(slug, sha));
    }

    /// Let a previously failing `get_commit` succeed again.
    pub fn restore_commit(&self, slug: &str, sha: &str) {
        self.failing_commits.lock().unwrap().remove(&key(slug, sha));
    }

    /// Make `fetch_raw_diff` fail for this commit.
    pub fn fail_raw_diff(&self, slug: &str, sha: &str) {
        self.failing_diffs.lock().unwrap().insert(key(slug, sha));
    }

    /// How many times `get_commit` was called for this commit.
    pub fn commit_fetches(&self, slug: &str, sha: &str) -> usize {
        *self
            .commit_fetches
            .lock()
            .unwrap()
            .get(&key(slug, sha))
            .unwrap_or(&0)
    }

    /// How many times `fetch_raw_diff` was called for this commit.
    pub fn diff_fetches(&self, slug: &str, sha: &str) -> usize {
        *self
            .diff_fetches
            .lock()
            .unwrap()
            .get(&key(slug, sha))
            .unwrap_or(&0)
    }

    fn bump(counter: &Mutex<HashMap<String, usize>>, k: &str) {
        *counter.lock().unwrap().entry(k.to_string()).or_insert(0) += 1;
    }
}

#[async_trait]
impl HostingClient for StaticHosting {
    async fn get_commit(&self, slug: &str, sha: &str) -> Result<CommitPatch, FetchError> {
        let k = key(slug, sha);
        Self::bump(&self.commit_fetches, &k);

        if self.failing_commits.lock().unwrap().contains(&k) {
            return Err(FetchError::Status {
                status: 500,
                body: "induced failure".to_string(),
            });
        }
        self.commits
            .lock()
            .unwrap()
            .get(&k)
            .cloned()
            .ok_or_else(|| FetchError::NotFound {
                slug: slug.to_string(),
                sha: sha.to_string(),
            })
    }

    async fn fetch_raw_diff(&self, slug: &str, sha: &str) -> Result<String, FetchError> {
        let k = key(slug, sha);
        Self::bump(&self.diff_fetches, &k);

        if self.failing_diffs.lock().unwrap().contains(&k) {
            return Err(FetchError::Status {
                status: 500,
                body: "induced failure".to_string(),
            });
        }
        self.raw_diffs
            .lock()
            .unwrap()
            .get(&k)
            .cloned()
            .ok_or_else(|| FetchError::NotFound {
                slug: slug.to_string(),
                sha: sha.to_string(),
            })
    }
}

// ---------------------------------------------------------------------------
// RecordingVcs
// ---------------------------------------------------------------------------

/// One operation observed by [`RecordingVcs`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VcsOp {
    StageAll,
    Commit { message: String },
    Push { remote: String, refspec: String },
}

/// VCS client that records operations instead of touching a repository.
#[derive(Debug, Default)]
pub struct RecordingVcs {
    ops: Mutex<Vec<VcsOp>>,
    failing: Mutex<bool>,
}

impl RecordingVcs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything recorded so far, in call order.
    pub fn ops(&self) -> Vec<VcsOp> {
        self.ops.lock().unwrap().clone()
    }

    /// Number of consolidations started (counted by `stage_all` calls).
    pub fn consolidations(&self) -> usize {
        self.ops
            .lock()
            .unwrap()
            .iter()
            .filter(|op| matches!(op, VcsOp::StageAll))
            .count()
    }

    /// When set, every operation fails until cleared.
    pub fn set_failing(&self, failing: bool) {
        *self.failing.lock().unwrap() = failing;
    }

    fn record(&self, op: VcsOp) -> Result<(), VcsError> {
        if *self.failing.lock().unwrap() {
            return Err(VcsError::Git(git2::Error::from_str("induced failure")));
        }
        self.ops.lock().unwrap().push(op);
        Ok(())
    }
}

impl VcsClient for RecordingVcs {
    fn stage_all(&self) -> Result<(), VcsError> {
        self.record(VcsOp::StageAll)
    }

    fn commit(&self, message: &str) -> Result<(), VcsError> {
        self.record(VcsOp::Commit {
            message: message.to_string(),
        })
    }

    fn push(&self, remote: &str, refspec: &str) -> Result<(), VcsError> {
        self.record(VcsOp::Push {
            remote: remote.to_string(),
            refspec: refspec.to_string(),
        })
    }
}
