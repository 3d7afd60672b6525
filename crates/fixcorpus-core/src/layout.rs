//! On-disk naming for collected commits.
//!
//! Everything under the collection root is flat two-level: one directory per
//! commit, one file per persisted hunk plus the archived full diff. Path
//! separators in slugs and file paths are flattened to `-` so every name is
//! a single component.

use std::collections::HashSet;

/// File name of the archived full commit diff inside a commit directory.
pub const COMMIT_DIFF_FILE: &str = "commit.diff";

/// Directory name for one collected commit: `<slug>-<sha>` with the slug's
/// `/` flattened.
pub fn commit_dir_name(slug: &str, sha: &str) -> String {
    format!("{}-{}", flatten(slug), sha)
}

/// Base file name for a hunk: `<path>-<line>` with the path's `/` flattened.
pub fn hunk_file_name(file: &str, line: usize) -> String {
    format!("{}-{}", flatten(file), line)
}

fn flatten(path: &str) -> String {
    path.replace('/', "-")
}

/// Allocates unique hunk file names within one commit directory.
///
/// Distinct hunks can flatten to the same base name (a file named `a-b.rs`
/// next to a directory `a/b.rs`, or two merged hunks starting on the same
/// line). The second taker gets a `-2` suffix, the third `-3`, and so on,
/// instead of overwriting the first.
#[derive(Debug, Default)]
pub struct HunkNamer {
    used: HashSet<String>,
}

impl HunkNamer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allocate(&mut self, file: &str, line: usize) -> String {
        let base = hunk_file_name(file, line);
        if self.used.insert(base.clone()) {
            return base;
        }
        let mut n = 2;
        loop {
            let candidate = format!("{}-{}", base, n);
            if self.used.insert(candidate.clone()) {
                return candidate;
            }
            n += 1;
        }
    }
}
