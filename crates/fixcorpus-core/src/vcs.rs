//! Consolidation work tree.
//!
//! The collection root doubles as a git work tree so batches of collected
//! diffs can be staged, committed and pushed to a mirror. [`VcsClient`] is
//! the seam; [`GitWorkTree`] is the libgit2-backed implementation with the
//! push credential injected at construction.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::debug;

use crate::domain::VcsError;

/// Staging, committing and pushing inside the collection work tree.
///
/// Synchronous on purpose: libgit2 blocks, and consolidation runs once per
/// batch. Implementations must be shareable behind an `Arc`.
pub trait VcsClient: Send + Sync {
    /// Stage every change under the work tree root.
    fn stage_all(&self) -> Result<(), VcsError>;

    /// Commit the staged changes onto HEAD.
    fn commit(&self, message: &str) -> Result<(), VcsError>;

    /// Push to `remote` with the given refspec, e.g. `master:master`.
    fn push(&self, remote: &str, refspec: &str) -> Result<(), VcsError>;
}

/// libgit2-backed [`VcsClient`] over the collection root.
///
/// The optional push token is held for the session and presented as the
/// username of a userpass credential with an empty password, the scheme
/// GitHub accepts for token pushes. It is never logged.
pub struct GitWorkTree {
    repo: Mutex<git2::Repository>,
    root: PathBuf,
    token: Option<String>,
}

impl GitWorkTree {
    /// Open an existing work tree at `path`.
    pub fn open(path: impl AsRef<Path>, token: Option<String>) -> Result<Self, VcsError> {
        let path = path.as_ref();
        debug!("Opening collection work tree at: {}", path.display());

        let repo = git2::Repository::open(path).map_err(|e| {
            debug!("Failed to open work tree: {}", e);
            VcsError::NotARepository {
                path: path.display().to_string(),
            }
        })?;
        let root = repo
            .workdir()
            .map(|p| p.to_path_buf())
            .unwrap_or_else(|| path.to_path_buf());

        Ok(Self {
            repo: Mutex::new(repo),
            root,
            token,
        })
    }

    /// Create a fresh work tree at `path`, directories included.
    ///
    /// The initial branch matches the default push refspec.
    pub fn init(path: impl AsRef<Path>, token: Option<String>) -> Result<Self, VcsError> {
        let path = path.as_ref();
        debug!("Initializing collection work tree at: {}", path.display());

        let mut options = git2::RepositoryInitOptions::new();
        options.initial_head("master");
        let repo = git2::Repository::init_opts(path, &options)?;
        let root = repo
            .workdir()
            .map(|p| p.to_path_buf())
            .unwrap_or_else(|| path.to_path_buf());

        Ok(Self {
            repo: Mutex::new(repo),
            root,
            token,
        })
    }

    /// Root directory of the work tree.
    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl VcsClient for GitWorkTree {
    fn stage_all(&self) -> Result<(), VcsError> {
        debug!("Staging all changes");

        let repo = self.repo.lock().unwrap();
        let mut index = repo.index()?;
        index.add_all(["*"].iter(), git2::IndexAddOption::DEFAULT, None)?;
        index.write()?;

        Ok(())
    }

    fn commit(&self, message: &str) -> Result<(), VcsError> {
        debug!("Committing staged changes");

        let repo = self.repo.lock().unwrap();
        let signature = repo
            .signature()
            .or_else(|_| git2::Signature::now("fixcorpus", "fixcorpus@localhost"))?;

        let tree_id = {
            let mut index = repo.index()?;
            index.write_tree()?
        };
        let tree = repo.find_tree(tree_id)?;

        let parent_commit = repo.head().ok().and_then(|head| head.peel_to_commit().ok());
        let parents = match parent_commit {
            Some(parent) => vec![parent],
            None => vec![],
        };
        let parent_refs: Vec<&git2::Commit> = parents.iter().collect();

        repo.commit(
            Some("HEAD"),
            &signature,
            &signature,
            message,
            &tree,
            &parent_refs,
        )?;

        Ok(())
    }

    fn push(&self, remote: &str, refspec: &str) -> Result<(), VcsError> {
        debug!("Pushing {} to {}", refspec, remote);

        let repo = self.repo.lock().unwrap();
        let mut remote = repo
            .find_remote(remote)
            .map_err(|_| VcsError::UnknownRemote {
                remote: remote.to_string(),
            })?;

        let mut callbacks = git2::RemoteCallbacks::new();
        if let Some(token) = self.token.clone() {
            callbacks.credentials(move |_url, _username, _allowed| {
                git2::Cred::userpass_plaintext(&token, "")
            });
        }
        let mut options = git2::PushOptions::new();
        options.remote_callbacks(callbacks);

        remote.push(&[qualify_refspec(refspec).as_str()], Some(&mut options))?;

        Ok(())
    }
}

/// Expand `master:master` shorthand into fully qualified branch refs;
/// libgit2 does not guess the way the git CLI does. Specs already carrying
/// `refs/` pass through.
fn qualify_refspec(refspec: &str) -> String {
    let (force, spec) = match refspec.strip_prefix('+') {
        Some(rest) => ("+", rest),
        None => ("", refspec),
    };
    let (src, dst) = spec.split_once(':').unwrap_or((spec, spec));
    format!("{}{}:{}", force, qualify_ref(src), qualify_ref(dst))
}

fn qualify_ref(name: &str) -> String {
    if name.starts_with("refs/") {
        name.to_string()
    } else {
        format!("refs/heads/{}", name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_work_tree() -> (tempfile::TempDir, GitWorkTree) {
        let dir = tempfile::tempdir().unwrap();
        let tree = GitWorkTree::init(dir.path(), None).unwrap();
        {
            let repo = tree.repo.lock().unwrap();
            let mut config = repo.config().unwrap();
            config.set_str("user.name", "tester").unwrap();
            config.set_str("user.email", "tester@localhost").unwrap();
        }
        (dir, tree)
    }

    fn head_message(tree: &GitWorkTree) -> String {
        let repo = tree.repo.lock().unwrap();
        let head = repo.head().unwrap().peel_to_commit().unwrap();
        head.message().unwrap().to_string()
    }

    #[test]
    fn open_missing_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");
        match GitWorkTree::open(&missing, None) {
            Err(VcsError::NotARepository { path }) => assert!(path.contains("nope")),
            other => panic!("expected NotARepository, got {:?}", other.err()),
        }
    }

    #[test]
    fn init_then_open_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        GitWorkTree::init(dir.path(), None).unwrap();
        let reopened = GitWorkTree::open(dir.path(), None).unwrap();
        assert_eq!(
            reopened.root().canonicalize().unwrap(),
            dir.path().canonicalize().unwrap()
        );
    }

    #[test]
    fn stage_and_commit_records_files() {
        let (dir, tree) = make_work_tree();

        std::fs::write(dir.path().join("first.diff"), "@@ -1 +1 @@\n-a\n+b\n").unwrap();
        tree.stage_all().unwrap();
        tree.commit("collected batch of 1").unwrap();
        assert_eq!(head_message(&tree), "collected batch of 1");

        // Second commit gets the first as parent.
        std::fs::write(dir.path().join("second.diff"), "@@ -2 +2 @@\n-c\n+d\n").unwrap();
        tree.stage_all().unwrap();
        tree.commit("collected batch of 2").unwrap();

        let repo = tree.repo.lock().unwrap();
        let head = repo.head().unwrap().peel_to_commit().unwrap();
        assert_eq!(head.parent_count(), 1);
    }

    #[test]
    fn push_to_unknown_remote_is_reported() {
        let (dir, tree) = make_work_tree();
        std::fs::write(dir.path().join("x"), "x").unwrap();
        tree.stage_all().unwrap();
        tree.commit("x").unwrap();

        match tree.push("origin", "master:master") {
            Err(VcsError::UnknownRemote { remote }) => assert_eq!(remote, "origin"),
            other => panic!("expected UnknownRemote, got {:?}", other.err()),
        }
    }

    #[test]
    fn push_updates_local_bare_remote() {
        let (dir, tree) = make_work_tree();
        std::fs::write(dir.path().join("first.diff"), "content").unwrap();
        tree.stage_all().unwrap();
        tree.commit("first").unwrap();

        let remote_dir = tempfile::tempdir().unwrap();
        let bare = git2::Repository::init_bare(remote_dir.path()).unwrap();
        {
            let repo = tree.repo.lock().unwrap();
            repo.remote("origin", remote_dir.path().to_str().unwrap())
                .unwrap();
        }

        tree.push("origin", "master:master").unwrap();

        let pushed = bare.find_reference("refs/heads/master").unwrap();
        let repo = tree.repo.lock().unwrap();
        let local_head = repo.head().unwrap().target().unwrap();
        assert_eq!(pushed.target().unwrap(), local_head);
    }

    #[test]
    fn refspec_shorthand_is_qualified() {
        assert_eq!(
            qualify_refspec("master:master"),
            "refs/heads/master:refs/heads/master"
        );
        assert_eq!(qualify_refspec("main"), "refs/heads/main:refs/heads/main");
        assert_eq!(
            qualify_refspec("+feature:feature"),
            "+refs/heads/feature:refs/heads/feature"
        );
        assert_eq!(
            qualify_refspec("refs/heads/a:refs/heads/b"),
            "refs/heads/a:refs/heads/b"
        );
    }
}
