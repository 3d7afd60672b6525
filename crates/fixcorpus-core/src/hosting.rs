//! Remote code-hosting client.
//!
//! The collector only ever reads two things from the hosting service: the
//! structured change set of a commit and its full raw diff. Both sit behind
//! [`HostingClient`] so tests and alternative backends can swap the
//! implementation; [`GithubHosting`] is the real one, speaking the GitHub
//! REST API and the `.diff` web endpoint.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::domain::{CommitPatch, FetchError, FileChange};

/// Read-only view of a hosting service, scoped to what collection needs.
///
/// Implementations must be shareable behind an `Arc` and safe to call from
/// multiple tasks. A failed call leaves no state behind; retrying the same
/// commit is always safe.
#[async_trait]
pub trait HostingClient: Send + Sync {
    /// Structured change set of one commit: the touched files with their
    /// per-file patch text, binary files patchless.
    async fn get_commit(&self, slug: &str, sha: &str) -> Result<CommitPatch, FetchError>;

    /// The commit's full diff as served by the raw endpoint, unparsed.
    async fn fetch_raw_diff(&self, slug: &str, sha: &str) -> Result<String, FetchError>;
}

/// Connection settings for [`GithubHosting`].
#[derive(Debug, Clone)]
pub struct GithubConfig {
    /// REST API base, e.g. `https://api.github.com`.
    pub api_url: String,

    /// Web base serving `<slug>/commit/<sha>.diff`, e.g. `https://github.com`.
    pub web_url: String,

    /// API token. Optional; anonymous requests work at a lower rate limit.
    /// Injected once at construction and sent as a bearer header, never
    /// logged.
    pub token: Option<String>,
}

impl Default for GithubConfig {
    fn default() -> Self {
        GithubConfig {
            api_url: "https://api.github.com".to_string(),
            web_url: "https://github.com".to_string(),
            token: None,
        }
    }
}

impl GithubConfig {
    /// Create config for specific endpoints (tests point these at a mock
    /// server; enterprise installs at their own host).
    pub fn new(api_url: &str, web_url: &str) -> Self {
        GithubConfig {
            api_url: api_url.trim_end_matches('/').to_string(),
            web_url: web_url.trim_end_matches('/').to_string(),
            token: None,
        }
    }

    /// Set the API token.
    pub fn with_token(mut self, token: &str) -> Self {
        self.token = Some(token.to_string());
        self
    }
}

/// GitHub-backed [`HostingClient`].
pub struct GithubHosting {
    config: GithubConfig,
    http_client: reqwest::Client,
}

impl GithubHosting {
    /// Create a new client.
    pub fn new(config: GithubConfig) -> Self {
        let http_client = reqwest::Client::builder()
            .user_agent(concat!("fixcorpus/", env!("CARGO_PKG_VERSION")))
            .build()
            .expect("Failed to create HTTP client");

        GithubHosting {
            config,
            http_client,
        }
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.config.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    /// Map non-success statuses into the fetch taxonomy. GitHub reports rate
    /// exhaustion as 403 or 429.
    async fn ensure_success(
        &self,
        slug: &str,
        sha: &str,
        response: reqwest::Response,
    ) -> Result<reqwest::Response, FetchError> {
        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(FetchError::NotFound {
                slug: slug.to_string(),
                sha: sha.to_string(),
            });
        }
        if status == reqwest::StatusCode::FORBIDDEN
            || status == reqwest::StatusCode::TOO_MANY_REQUESTS
        {
            return Err(FetchError::RateLimited {
                status: status.as_u16(),
            });
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(FetchError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }
}

/// Wire shape of `GET /repos/{slug}/commits/{sha}`, reduced to the fields
/// collection reads.
#[derive(Debug, Deserialize)]
struct CommitResponse {
    sha: String,
    #[serde(default)]
    files: Vec<FileEntry>,
}

#[derive(Debug, Deserialize)]
struct FileEntry {
    filename: String,
    #[serde(default)]
    patch: Option<String>,
}

#[async_trait]
impl HostingClient for GithubHosting {
    async fn get_commit(&self, slug: &str, sha: &str) -> Result<CommitPatch, FetchError> {
        let url = format!("{}/repos/{}/commits/{}", self.config.api_url, slug, sha);
        debug!("Fetching commit {}@{}", slug, sha);

        let response = self
            .authorize(self.http_client.get(&url))
            .header("Accept", "application/vnd.github+json")
            .send()
            .await?;
        let response = self.ensure_success(slug, sha, response).await?;

        let payload: CommitResponse = response
            .json()
            .await
            .map_err(|e| FetchError::Malformed(e.to_string()))?;
        if payload.sha.is_empty() {
            return Err(FetchError::Malformed("commit payload missing sha".to_string()));
        }

        let files = payload
            .files
            .into_iter()
            .map(|f| FileChange {
                path: f.filename,
                patch: f.patch,
            })
            .collect();

        Ok(CommitPatch::new(slug, payload.sha, files))
    }

    async fn fetch_raw_diff(&self, slug: &str, sha: &str) -> Result<String, FetchError> {
        let url = format!("{}/{}/commit/{}.diff", self.config.web_url, slug, sha);
        debug!("Fetching raw diff {}@{}", slug, sha);

        let response = self.authorize(self.http_client.get(&url)).send().await?;
        let response = self.ensure_success(slug, sha, response).await?;
        response.text().await.map_err(FetchError::Transport)
    }
}
