//! Per-request temporary storage

use std::io;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// What a cleanup call actually did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CleanupOutcome {
    Removed,
    /// The directory was already gone (deleted externally or never populated).
    AlreadyGone,
    /// An earlier call already cleaned up.
    AlreadyCleaned,
}

/// Directory `<base>/<request id>` owned by a single run.
///
/// Dropping a workspace that was never cleaned removes it, so a cancelled
/// run does not leak its clone.
#[derive(Debug)]
pub struct Workspace {
    root: PathBuf,
    cleaned: bool,
}

impl Workspace {
    pub fn create(base: &Path, request_id: Uuid) -> io::Result<Self> {
        let root = base.join(request_id.to_string());
        std::fs::create_dir_all(&root)?;
        Ok(Self { root, cleaned: false })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Where the repository called `name` is materialized.
    pub fn repo_dir(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    pub fn is_cleaned(&self) -> bool {
        self.cleaned
    }

    /// Remove the workspace. Safe to call repeatedly; only the first call
    /// touches the filesystem.
    pub fn cleanup(&mut self) -> io::Result<CleanupOutcome> {
        if self.cleaned {
            return Ok(CleanupOutcome::AlreadyCleaned);
        }
        self.cleaned = true;
        match std::fs::remove_dir_all(&self.root) {
            Ok(()) => Ok(CleanupOutcome::Removed),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(CleanupOutcome::AlreadyGone),
            Err(e) => Err(e),
        }
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        if self.cleaned {
            return;
        }
        match self.cleanup() {
            Ok(outcome) => {
                tracing::debug!(path = %self.root.display(), ?outcome, "workspace removed on drop")
            }
            Err(e) => tracing::warn!(
                path = %self.root.display(),
                error = %e,
                "failed removing workspace on drop"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn cleanup_is_idempotent() {
        let base = TempDir::new().expect("tmp");
        let mut ws = Workspace::create(base.path(), Uuid::new_v4()).expect("workspace");
        std::fs::write(ws.root().join("file.txt"), "x").expect("write");

        assert_eq!(ws.cleanup().expect("first"), CleanupOutcome::Removed);
        assert!(!ws.root().exists());
        assert_eq!(ws.cleanup().expect("second"), CleanupOutcome::AlreadyCleaned);
    }

    #[test]
    fn cleanup_tolerates_external_deletion() {
        let base = TempDir::new().expect("tmp");
        let mut ws = Workspace::create(base.path(), Uuid::new_v4()).expect("workspace");
        std::fs::remove_dir_all(ws.root()).expect("external delete");

        assert_eq!(ws.cleanup().expect("cleanup"), CleanupOutcome::AlreadyGone);
    }

    #[test]
    fn drop_removes_uncleaned_workspace() {
        let base = TempDir::new().expect("tmp");
        let root = {
            let ws = Workspace::create(base.path(), Uuid::new_v4()).expect("workspace");
            std::fs::create_dir_all(ws.repo_dir("repo").join("src")).expect("mkdir");
            ws.root().to_path_buf()
        };
        assert!(!root.exists());
    }

    #[test]
    fn workspaces_do_not_collide() {
        let base = TempDir::new().expect("tmp");
        let a = Workspace::create(base.path(), Uuid::new_v4()).expect("a");
        let b = Workspace::create(base.path(), Uuid::new_v4()).expect("b");
        assert_ne!(a.root(), b.root());
    }
}
