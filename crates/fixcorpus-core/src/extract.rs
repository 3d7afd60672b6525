//! Unified-diff hunk extraction.
//!
//! Two input shapes are handled:
//! - per-file patch fragments as served by the hosting API (`@@`-headed, no
//!   file header lines), via [`parse_hunks`];
//! - full multi-file unified diffs as served by the raw-diff endpoint, via
//!   [`split_files`], which reduces them to the same per-file shape.

use crate::domain::{CommitPatch, FileChange};

const FILE_HEADER_PREFIX: &str = "diff --git ";
const OLD_FILE_PREFIX: &str = "--- ";
const NEW_FILE_PREFIX: &str = "+++ ";
const HUNK_HEADER_PREFIX: &str = "@@ ";
const BINARY_PREFIX: &str = "Binary files ";
const DEV_NULL: &str = "/dev/null";

/// One `@@`-headed fragment of a per-file patch, with its position in the
/// post-change file. The filter works on these; the starting line survives
/// into the persisted [`crate::domain::Hunk`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawHunk {
    /// First line the fragment covers in the post-change file.
    pub new_start: usize,

    /// Number of post-change lines the fragment covers.
    pub new_len: usize,

    /// Fragment text, header line included.
    pub body: String,
}

impl RawHunk {
    /// Line just past the fragment in the post-change file.
    pub fn end(&self) -> usize {
        self.new_start + self.new_len
    }
}

/// Parse the post-change range out of a `@@ -a,b +c,d @@` header.
///
/// The `,len` part is optional and defaults to 1, per the unified format.
/// Returns `None` for lines that are not hunk headers.
fn parse_hunk_header(line: &str) -> Option<(usize, usize)> {
    if !line.starts_with("@@") {
        return None;
    }
    for part in line.split_whitespace() {
        if let Some(range) = part.strip_prefix('+') {
            let mut pieces = range.splitn(2, ',');
            let start = pieces.next()?.parse::<usize>().ok()?;
            let len = match pieces.next() {
                Some(len) => len.parse::<usize>().ok()?,
                None => 1,
            };
            return Some((start, len));
        }
    }
    None
}

/// Split a per-file patch fragment into its hunks, in input order.
///
/// Lines before the first `@@` header are skipped; a line that is neither a
/// header nor diff content (`+`, `-`, space, `\` marker, blank) ends parsing.
/// Headers whose range does not parse are skipped with their content.
pub fn parse_hunks(patch: &str) -> Vec<RawHunk> {
    let mut hunks: Vec<RawHunk> = Vec::new();
    let mut in_hunk = false;

    for line in patch.lines() {
        if line.starts_with(HUNK_HEADER_PREFIX) || line == "@@" {
            match parse_hunk_header(line) {
                Some((new_start, new_len)) => {
                    hunks.push(RawHunk {
                        new_start,
                        new_len,
                        body: line.to_string(),
                    });
                    in_hunk = true;
                }
                None => in_hunk = false,
            }
        } else if line.starts_with('+')
            || line.starts_with('-')
            || line.starts_with(' ')
            || line.starts_with('\\')
            || line.is_empty()
        {
            if in_hunk {
                if let Some(hunk) = hunks.last_mut() {
                    hunk.body.push('\n');
                    hunk.body.push_str(line);
                }
            }
        } else {
            in_hunk = false;
        }
    }

    hunks
}

/// Split a full multi-file unified diff into per-file changes, in input
/// order, matching the shape the hosting API serves: binary files and pure
/// renames carry no patch text.
pub fn split_files(raw_diff: &str) -> Vec<FileChange> {
    let mut files: Vec<FileChange> = Vec::new();
    let mut current: Option<PendingFile> = None;

    for line in raw_diff.lines() {
        if let Some(header_path) = line.strip_prefix(FILE_HEADER_PREFIX) {
            if let Some(pending) = current.take() {
                files.push(pending.finish());
            }
            current = Some(PendingFile::new(header_b_path(header_path)));
            continue;
        }

        let Some(pending) = current.as_mut() else {
            continue;
        };

        if line.starts_with(BINARY_PREFIX) || line == "GIT binary patch" {
            pending.binary = true;
        } else if line.starts_with(HUNK_HEADER_PREFIX) {
            pending.push_patch_line(line);
            pending.in_hunk = true;
        } else if pending.in_hunk
            && (line.starts_with('+')
                || line.starts_with('-')
                || line.starts_with(' ')
                || line.starts_with('\\')
                || line.is_empty())
        {
            // Checked before the header arms: a content line may itself
            // start with `---` or `+++`, while real file headers only sit
            // in the preamble where no hunk is open.
            pending.push_patch_line(line);
        } else if let Some(path) = line.strip_prefix(NEW_FILE_PREFIX) {
            if let Some(stripped) = strip_side_prefix(path) {
                pending.new_path = Some(stripped.to_string());
            }
        } else if let Some(path) = line.strip_prefix(OLD_FILE_PREFIX) {
            if let Some(stripped) = strip_side_prefix(path) {
                pending.old_path = Some(stripped.to_string());
            }
        } else {
            // index lines, mode changes, rename markers
            pending.in_hunk = false;
        }
    }

    if let Some(pending) = current.take() {
        files.push(pending.finish());
    }

    files
}

/// Per-file raw hunks for every textual file of a commit, in commit order.
/// Files with no parseable hunks (binary, pure rename) are left out.
pub fn hunks_by_file(patch: &CommitPatch) -> Vec<(String, Vec<RawHunk>)> {
    patch
        .files
        .iter()
        .filter_map(|file| {
            let text = file.patch.as_deref()?;
            let hunks = parse_hunks(text);
            if hunks.is_empty() {
                None
            } else {
                Some((file.path.clone(), hunks))
            }
        })
        .collect()
}

struct PendingFile {
    header_path: String,
    old_path: Option<String>,
    new_path: Option<String>,
    patch: String,
    binary: bool,
    in_hunk: bool,
}

impl PendingFile {
    fn new(header_path: String) -> Self {
        Self {
            header_path,
            old_path: None,
            new_path: None,
            patch: String::new(),
            binary: false,
            in_hunk: false,
        }
    }

    fn push_patch_line(&mut self, line: &str) {
        if !self.patch.is_empty() {
            self.patch.push('\n');
        }
        self.patch.push_str(line);
    }

    fn finish(self) -> FileChange {
        // Post-change name wins; deletions keep the pre-change name.
        let path = match (self.new_path, self.old_path) {
            (Some(new), _) if new != DEV_NULL => new,
            (_, Some(old)) if old != DEV_NULL => old,
            _ => self.header_path,
        };
        let patch = if self.binary || self.patch.is_empty() {
            None
        } else {
            Some(self.patch)
        };
        FileChange { path, patch }
    }
}

/// Path of the `b/` side of a `diff --git a/X b/Y` header.
fn header_b_path(header: &str) -> String {
    match header.find(" b/") {
        Some(idx) => header[idx + 3..].to_string(),
        None => header.to_string(),
    }
}

/// Drop the `a/` or `b/` marker from a `---`/`+++` path; `/dev/null` and
/// timestamps after a tab pass through stripped.
fn strip_side_prefix(path: &str) -> Option<&str> {
    let path = path.split('\t').next().unwrap_or(path);
    if path == DEV_NULL {
        return Some(path);
    }
    path.strip_prefix("a/").or_else(|| path.strip_prefix("b/"))
}
