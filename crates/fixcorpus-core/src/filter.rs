//! Commit qualification.
//!
//! Decides whether a commit's change set meets the structural criteria for
//! collection and reduces it to the hunks worth persisting. Rejection is an
//! empty result, not an error; structured input never fails here.

use serde::{Deserialize, Serialize};

use crate::domain::{CommitPatch, Hunk};
use crate::extract::{self, RawHunk};

/// Structural criteria for qualifying commits.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FilterConfig {
    /// Reject commits that touch more than one file (binary files count).
    pub filter_multi_file: bool,

    /// Reject commits where any single file still carries more than one
    /// hunk after merging.
    pub filter_multi_hunk: bool,

    /// Hunks within this many lines of each other (post-change coordinates)
    /// merge into one logical hunk before the multi-hunk check.
    pub hunk_distance: usize,
}

impl Default for FilterConfig {
    /// Everything passes: no rejection, no merging.
    fn default() -> Self {
        Self {
            filter_multi_file: false,
            filter_multi_hunk: false,
            hunk_distance: 0,
        }
    }
}

/// Qualify a commit's change set against the configured criteria.
///
/// Order matters: the multi-file check sees the whole commit, the proximity
/// merge runs per file, and the multi-hunk check counts the merged hunks of
/// each file on its own; one over-full file rejects the entire commit.
/// Survivors come back flattened, file order first, hunk order within each
/// file second.
pub fn qualify(patch: &CommitPatch, config: &FilterConfig) -> Vec<Hunk> {
    if config.filter_multi_file && patch.file_count() > 1 {
        return Vec::new();
    }

    let mut qualified: Vec<Hunk> = Vec::new();
    for (path, raw) in extract::hunks_by_file(patch) {
        let merged = merge_nearby(&path, raw, config.hunk_distance);
        if config.filter_multi_hunk && merged.len() > 1 {
            return Vec::new();
        }
        qualified.extend(merged);
    }

    qualified
}

/// Merge hunks of one file whose post-change ranges come within `distance`
/// lines of each other.
///
/// This is a closure: merging two hunks widens the covered range, which can
/// pull a third into reach. A single sorted sweep with a running reach gives
/// exactly that fixed point.
fn merge_nearby(file: &str, mut hunks: Vec<RawHunk>, distance: usize) -> Vec<Hunk> {
    hunks.sort_by_key(|h| h.new_start);

    let mut merged: Vec<Hunk> = Vec::new();
    let mut members: Vec<RawHunk> = Vec::new();
    let mut reach = 0usize;

    for hunk in hunks {
        if !members.is_empty() {
            if hunk.new_start <= reach + distance {
                reach = reach.max(hunk.end());
                members.push(hunk);
                continue;
            }
            merged.push(collapse(file, std::mem::take(&mut members)));
        }
        reach = hunk.end();
        members.push(hunk);
    }
    if !members.is_empty() {
        merged.push(collapse(file, members));
    }

    merged
}

/// Collapse merge members into one logical hunk: smallest start wins the
/// line, bodies concatenate in file order.
fn collapse(file: &str, members: Vec<RawHunk>) -> Hunk {
    let line = members.first().map(|h| h.new_start).unwrap_or(0);
    let content = members
        .iter()
        .map(|h| h.body.as_str())
        .collect::<Vec<_>>()
        .join("\n");
    Hunk::new(file, line, content)
}
