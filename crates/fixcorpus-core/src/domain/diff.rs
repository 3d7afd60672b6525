//! Commit change-set value types.

use serde::{Deserialize, Serialize};

/// A contiguous change fragment within one file of a commit.
///
/// Produced by extraction (or by the proximity merge in the filter, where a
/// merged hunk covers several raw fragments), persisted once, then dropped.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Hunk {
    /// Path of the changed file, relative to the repository root.
    pub file: String,

    /// Starting line of the fragment in the post-change file.
    pub line: usize,

    /// Raw diff text, including the `@@` header line(s) but not the
    /// surrounding `---`/`+++` file header.
    pub content: String,
}

impl Hunk {
    pub fn new(file: impl Into<String>, line: usize, content: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            line,
            content: content.into(),
        }
    }
}

/// One file entry of a commit's change set.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FileChange {
    /// Path of the file, relative to the repository root.
    pub path: String,

    /// Per-file unified-diff text as served by the hosting API.
    /// `None` for binary files, which carry no textual patch.
    pub patch: Option<String>,
}

/// The complete change set of one commit, as served by the hosting API.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CommitPatch {
    /// Repository slug, e.g. `octocat/hello-world`.
    pub slug: String,

    /// Full commit sha.
    pub sha: String,

    /// Changed files, in the order the hosting API lists them.
    pub files: Vec<FileChange>,
}

impl CommitPatch {
    pub fn new(slug: impl Into<String>, sha: impl Into<String>, files: Vec<FileChange>) -> Self {
        Self {
            slug: slug.into(),
            sha: sha.into(),
            files,
        }
    }

    /// Number of files the commit touches, binary files included.
    pub fn file_count(&self) -> usize {
        self.files.len()
    }
}
