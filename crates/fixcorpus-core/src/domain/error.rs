//! Domain-level error taxonomy for fixcorpus.

/// Errors raised while fetching commit data from the hosting service.
///
/// A fetch failure leaves the commit unmarked in the collection state, so a
/// later retry of the same sha is always safe.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("commit not found: {slug}@{sha}")]
    NotFound { slug: String, sha: String },

    #[error("rate limited by hosting service (status {status})")]
    RateLimited { status: u16 },

    #[error("unexpected status {status} from hosting service: {body}")]
    Status { status: u16, body: String },

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("malformed commit payload: {0}")]
    Malformed(String),
}

/// Errors raised by the consolidation work tree.
#[derive(Debug, thiserror::Error)]
pub enum VcsError {
    #[error("no git work tree at {path}")]
    NotARepository { path: String },

    #[error("no remote named {remote} configured")]
    UnknownRemote { remote: String },

    #[error("git error: {0}")]
    Git(#[from] git2::Error),
}

/// Errors surfaced by the collection pipeline.
#[derive(Debug, thiserror::Error)]
pub enum CollectError {
    #[error("fetch failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("failed to persist {path}: {source}")]
    Persistence {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("vcs error: {0}")]
    Vcs(#[from] VcsError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl CollectError {
    pub(crate) fn persistence(path: impl Into<std::path::PathBuf>, source: std::io::Error) -> Self {
        CollectError::Persistence {
            path: path.into(),
            source,
        }
    }

    /// Whether retrying the same commit makes sense. A failed commit fetch
    /// leaves the sha unmarked, so a retry can succeed; a retry after
    /// partial persistence is absorbed by dedup.
    pub fn is_retryable(&self) -> bool {
        matches!(self, CollectError::Fetch(_))
    }
}

/// Result type for fixcorpus collection operations.
pub type Result<T> = std::result::Result<T, CollectError>;
