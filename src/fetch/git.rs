//! Git cloning with a time and size budget

use crate::config::FetchSettings;
use crate::domain::FetchMetadata;
use crate::error::FetchError;
use crate::fetch::{GitRef, RepoSource, RepositoryFetcher};
use async_trait::async_trait;
use git2::build::RepoBuilder;
use git2::{ErrorClass, ErrorCode, FetchOptions, ObjectType, RemoteCallbacks, Repository};
use std::cell::Cell;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Fetches repositories with libgit2 on the blocking pool.
#[derive(Debug, Clone)]
pub struct GitFetcher {
    timeout: Duration,
    max_bytes: u64,
}

impl GitFetcher {
    pub fn new(settings: &FetchSettings) -> Self {
        Self { timeout: settings.clone_timeout(), max_bytes: settings.max_clone_bytes }
    }
}

#[async_trait]
impl RepositoryFetcher for GitFetcher {
    async fn fetch(&self, source: &RepoSource, dest: &Path) -> Result<FetchMetadata, FetchError> {
        let cancel = Arc::new(AtomicBool::new(false));
        let job = CloneJob {
            url: source.url.clone(),
            reference: source.reference.clone(),
            dest: dest.to_path_buf(),
            max_bytes: self.max_bytes,
            cancel: Arc::clone(&cancel),
        };

        let _abort_on_drop = AbortOnDrop(Arc::clone(&cancel));
        let handle = tokio::task::spawn_blocking(move || job.run());
        join_within(handle, self.timeout, &cancel).await
    }
}

/// Raises the abort flag if the fetch future is dropped mid-clone.
struct AbortOnDrop(Arc<AtomicBool>);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

/// Await a clone task, raising `cancel` once `limit` passes. A timed-out task
/// is still awaited to completion so nothing writes under the destination
/// after this returns.
async fn join_within<T>(
    mut handle: JoinHandle<Result<T, FetchError>>,
    limit: Duration,
    cancel: &AtomicBool,
) -> Result<T, FetchError> {
    match tokio::time::timeout(limit, &mut handle).await {
        Ok(Ok(result)) => result,
        Ok(Err(join_err)) => Err(FetchError::Git(format!("clone task failed: {join_err}"))),
        Err(_) => {
            cancel.store(true, Ordering::SeqCst);
            tracing::warn!(timeout = ?limit, "clone timed out, waiting for it to abort");
            if let Err(join_err) = handle.await {
                tracing::debug!(error = %join_err, "aborted clone task failed");
            }
            Err(FetchError::Timeout(limit))
        }
    }
}

struct CloneJob {
    url: String,
    reference: Option<GitRef>,
    dest: PathBuf,
    max_bytes: u64,
    cancel: Arc<AtomicBool>,
}

impl CloneJob {
    fn run(self) -> Result<FetchMetadata, FetchError> {
        let repo = match &self.reference {
            // Arbitrary commits are not reachable from a shallow branch tip.
            Some(GitRef::Commit(sha)) => {
                let repo = self.clone_with(None, None)?;
                checkout_ref(&repo, sha).map_err(|e| self.classify(e, false, Some(sha.as_str())))?;
                repo
            }
            Some(GitRef::Branch(branch)) => self.shallow_then_full(Some(branch.as_str()))?,
            None => self.shallow_then_full(None)?,
        };
        Ok(metadata(&repo))
    }

    /// Shallow clone first; some transports and servers refuse depth, so fall
    /// back to a full clone into a clean directory.
    fn shallow_then_full(&self, branch: Option<&str>) -> Result<Repository, FetchError> {
        match self.clone_with(branch, Some(1)) {
            Ok(repo) => Ok(repo),
            Err(
                err @ (FetchError::TooLarge { .. }
                | FetchError::Auth { .. }
                | FetchError::RefNotFound { .. }),
            ) => Err(err),
            Err(err) => {
                if self.cancel.load(Ordering::SeqCst) {
                    return Err(err);
                }
                tracing::debug!(url = %self.url, error = %err, "shallow clone failed, retrying full clone");
                reset_dir(&self.dest)?;
                self.clone_with(branch, None)
            }
        }
    }

    fn clone_with(&self, branch: Option<&str>, depth: Option<i32>) -> Result<Repository, FetchError> {
        let exceeded = Cell::new(false);
        let mut callbacks = RemoteCallbacks::new();
        callbacks.transfer_progress(|progress| {
            if self.cancel.load(Ordering::SeqCst) {
                return false;
            }
            if progress.received_bytes() as u64 > self.max_bytes {
                exceeded.set(true);
                return false;
            }
            true
        });
        callbacks.sideband_progress(|_| !self.cancel.load(Ordering::SeqCst));

        let mut fo = FetchOptions::new();
        fo.remote_callbacks(callbacks);
        if let Some(depth) = depth {
            fo.depth(depth);
        }

        let mut builder = RepoBuilder::new();
        builder.fetch_options(fo);
        if let Some(branch) = branch {
            builder.branch(branch);
        }

        let result = builder.clone(&self.url, &self.dest);
        result.map_err(|e| self.classify(e, exceeded.get(), branch))
    }

    fn classify(&self, err: git2::Error, exceeded: bool, reference: Option<&str>) -> FetchError {
        if exceeded {
            return FetchError::TooLarge { limit: self.max_bytes };
        }
        if err.code() == ErrorCode::Auth {
            return FetchError::Auth { url: self.url.clone(), message: err.message().to_string() };
        }
        if let Some(reference) = reference {
            if err.code() == ErrorCode::NotFound
                || matches!(err.class(), ErrorClass::Reference | ErrorClass::Object)
            {
                return FetchError::RefNotFound {
                    url: self.url.clone(),
                    reference: reference.to_string(),
                };
            }
        }
        match err.class() {
            ErrorClass::Net | ErrorClass::Http | ErrorClass::Ssh | ErrorClass::Ssl => {
                FetchError::Unreachable { url: self.url.clone(), message: err.message().to_string() }
            }
            _ if err.code() == ErrorCode::NotFound => {
                FetchError::Unreachable { url: self.url.clone(), message: err.message().to_string() }
            }
            _ => FetchError::Git(err.message().to_string()),
        }
    }
}

fn checkout_ref(repo: &Repository, reference: &str) -> Result<(), git2::Error> {
    let object = repo.revparse_single(reference)?;
    repo.checkout_tree(&object, None)?;
    if object.kind() == Some(ObjectType::Commit) {
        repo.set_head_detached(object.id())?;
    }
    Ok(())
}

fn reset_dir(dest: &Path) -> Result<(), FetchError> {
    match std::fs::remove_dir_all(dest) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(source) => Err(FetchError::Storage { path: dest.to_path_buf(), source }),
    }
}

fn metadata(repo: &Repository) -> FetchMetadata {
    let head = repo.head().ok();
    let default_branch = head
        .as_ref()
        .filter(|h| h.is_branch())
        .and_then(|h| h.shorthand())
        .map(str::to_string);
    let head_commit =
        head.as_ref().and_then(|h| h.peel_to_commit().ok()).map(|c| c.id().to_string());
    let file_count = repo.index().ok().map(|index| index.len());
    FetchMetadata { default_branch, head_commit, file_count }
}
