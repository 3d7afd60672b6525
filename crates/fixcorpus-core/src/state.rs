//! Collection-session state.
//!
//! One object owns both the processed-commit set and the batch counter, so
//! a collector shared across tasks cannot observe one without the other
//! moving underneath it. All mutation goes through atomic operations; there
//! is no way to read-then-write the set from outside.

use std::collections::HashSet;
use std::sync::Mutex;

/// Processed-commit set plus batch counter, guarded by a single lock.
#[derive(Debug, Default)]
pub struct CollectionState {
    inner: Mutex<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    done: HashSet<String>,
    current_batch: usize,
}

impl CollectionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populate the processed set, e.g. from a persisted ledger.
    pub fn seed<I>(&self, shas: I)
    where
        I: IntoIterator<Item = String>,
    {
        let mut inner = self.inner.lock().unwrap();
        inner.done.extend(shas);
    }

    /// Whether this commit was already processed in this session.
    pub fn has_processed(&self, sha: &str) -> bool {
        let inner = self.inner.lock().unwrap();
        inner.done.contains(sha)
    }

    /// Mark a commit processed. Check-and-set: returns `true` only for the
    /// caller that actually inserted it.
    pub fn mark_processed(&self, sha: &str) -> bool {
        let mut inner = self.inner.lock().unwrap();
        inner.done.insert(sha.to_string())
    }

    /// Count a collected commit toward the current batch, returning the new
    /// batch size.
    pub fn increment_batch(&self) -> usize {
        let mut inner = self.inner.lock().unwrap();
        inner.current_batch += 1;
        inner.current_batch
    }

    /// Reset the batch counter after a consolidation attempt.
    pub fn reset_batch(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.current_batch = 0;
    }

    /// Commits counted toward the current batch.
    pub fn batch_len(&self) -> usize {
        let inner = self.inner.lock().unwrap();
        inner.current_batch
    }

    /// Total commits processed in this session (seeded entries included).
    pub fn processed_count(&self) -> usize {
        let inner = self.inner.lock().unwrap();
        inner.done.len()
    }
}
