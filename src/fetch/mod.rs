//! Repository fetching into per-request workspaces

use crate::domain::{FetchMetadata, RepositorySnapshot};
use crate::error::FetchError;
use async_trait::async_trait;
use std::path::{Component, Path};

#[cfg(any(test, feature = "test-export-mocks"))]
use mockall::automock;

pub mod git;
pub mod source;
pub mod workspace;

pub use git::GitFetcher;
pub use source::{GitRef, RepoSource};
pub use workspace::{CleanupOutcome, Workspace};

/// Materializes a repository at a local path.
///
/// Implementations write only under `dest`, which does not exist yet when
/// `fetch` is called.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait RepositoryFetcher: Send + Sync {
    async fn fetch(&self, source: &RepoSource, dest: &Path) -> Result<FetchMetadata, FetchError>;
}

/// Fetch `source` into `workspace` and describe the result as a snapshot.
pub async fn fetch_snapshot(
    fetcher: &dyn RepositoryFetcher,
    source: &RepoSource,
    workspace: &Workspace,
) -> Result<RepositorySnapshot, FetchError> {
    let dest = workspace.repo_dir(&source.name);
    if !is_direct_child(workspace.root(), &dest) {
        return Err(FetchError::InvalidUrl(format!(
            "{}: repository name {:?} is not a plain directory name",
            source.url, source.name
        )));
    }
    tracing::info!(url = %source.url, reference = ?source.reference, "fetching repository");

    let metadata = fetcher.fetch(source, &dest).await?;
    if !dest.is_dir() {
        return Err(FetchError::Git(format!(
            "fetch reported success but {} is missing",
            dest.display()
        )));
    }

    tracing::debug!(
        path = %dest.display(),
        head = ?metadata.head_commit,
        files = ?metadata.file_count,
        "repository fetched"
    );
    Ok(RepositorySnapshot { root: dest, name: source.name.clone(), metadata })
}

fn is_direct_child(root: &Path, dest: &Path) -> bool {
    let Ok(rest) = dest.strip_prefix(root) else {
        return false;
    };
    let mut components = rest.components();
    matches!((components.next(), components.next()), (Some(Component::Normal(_)), None))
}
