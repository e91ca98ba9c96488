//! HEAD lookup through libgit2

use std::path::{Path, PathBuf};

use git2::Repository;
use tracing::debug;

#[derive(Debug, thiserror::Error)]
pub enum GitError {
    #[error("no git repository at or above {path}: {source}")]
    NotARepository {
        path: PathBuf,
        #[source]
        source: git2::Error,
    },

    #[error("cannot resolve HEAD in {path}: {source}")]
    Head {
        path: PathBuf,
        #[source]
        source: git2::Error,
    },
}

/// Commit checked out at HEAD
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct GitHead {
    /// Full 40-character commit id
    pub revision: String,
    pub message: String,
}

impl GitHead {
    /// Leading eight characters of the revision
    pub fn short_revision(&self) -> &str {
        short(&self.revision)
    }
}

pub(crate) fn short(revision: &str) -> &str {
    revision.get(..8).unwrap_or(revision)
}

/// Read HEAD of the repository containing `repo_path`.
///
/// The repository is discovered by walking up from `repo_path`.
pub fn head(repo_path: &Path) -> Result<GitHead, GitError> {
    let repo = Repository::discover(repo_path).map_err(|source| GitError::NotARepository {
        path: repo_path.to_path_buf(),
        source,
    })?;

    let head_error = |source| GitError::Head {
        path: repo_path.to_path_buf(),
        source,
    };
    let commit = repo
        .head()
        .and_then(|reference| reference.peel_to_commit())
        .map_err(head_error)?;

    let revision = commit.id().to_string();
    let message = String::from_utf8_lossy(commit.message_bytes()).trim_end().to_string();

    debug!(revision = %revision, repo = %repo_path.display(), "resolved HEAD");
    Ok(GitHead { revision, message })
}
