//! Snapshot walker producing the structure summary

use crate::config::ScanSettings;
use crate::domain::{FileRecord, RepositorySnapshot, StructureSummary, Truncation};
use crate::error::AnalysisError;
use crate::scan::tree::render_tree;
use crate::utils::{is_binary_file, relative_slash_path};
use ignore::WalkBuilder;
use rayon::prelude::*;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Walks a snapshot and records every regular file, within the configured
/// file count, depth and byte limits.
pub struct StructureAnalyzer {
    settings: ScanSettings,
}

impl StructureAnalyzer {
    pub fn new(settings: ScanSettings) -> Self {
        Self { settings }
    }

    pub fn analyze(&self, snapshot: &RepositorySnapshot) -> Result<StructureSummary, AnalysisError> {
        self.analyze_dir(&snapshot.root, &snapshot.name)
    }

    /// Analyze any local directory, naming the tree root `name`.
    pub fn analyze_dir(&self, root: &Path, name: &str) -> Result<StructureSummary, AnalysisError> {
        if !root.is_dir() {
            return Err(AnalysisError::NotADirectory(root.to_path_buf()));
        }
        std::fs::read_dir(root).map_err(|e| AnalysisError::Walk {
            path: root.to_path_buf(),
            message: e.to_string(),
        })?;

        let (candidates, truncation) = self.walk(root);
        if candidates.is_empty() {
            return Err(AnalysisError::Empty(root.to_path_buf()));
        }

        let files: Vec<FileRecord> = candidates
            .into_par_iter()
            .map(|(path, rel, size)| FileRecord::new(rel, size, is_binary_file(&path)))
            .collect();

        for reason in &truncation {
            tracing::warn!(root = %root.display(), %reason, "structure analysis truncated");
        }

        let summary = StructureSummary::new(name, files, truncation);
        tracing::debug!(
            files = summary.stats.files,
            directories = summary.stats.directories,
            bytes = summary.stats.total_bytes,
            binary = summary.stats.binary_files,
            "structure analyzed"
        );
        let tree = render_tree(&summary, None);
        Ok(summary.with_tree(tree))
    }

    fn walk(&self, root: &Path) -> (Vec<(PathBuf, String, u64)>, Vec<Truncation>) {
        let ignored: HashSet<String> = self.settings.ignored_dirs.iter().cloned().collect();
        let max_depth = self.settings.max_depth;

        let mut builder = WalkBuilder::new(root);
        builder
            .git_ignore(false)
            .git_global(false)
            .git_exclude(false)
            .ignore(false)
            .parents(false)
            .hidden(false)
            .follow_links(false)
            .max_depth(Some(max_depth))
            .sort_by_file_name(|a, b| a.cmp(b))
            .filter_entry(move |entry| {
                let is_dir = entry.file_type().is_some_and(|t| t.is_dir());
                !(is_dir
                    && entry.depth() > 0
                    && entry.file_name().to_str().is_some_and(|name| ignored.contains(name)))
            });

        let mut files = Vec::new();
        let mut truncation = Vec::new();
        let mut total_bytes = 0u64;

        for result in builder.build() {
            let entry = match result {
                Ok(entry) => entry,
                Err(err) => {
                    tracing::debug!(error = %err, "skipping unreadable entry");
                    continue;
                }
            };
            let Some(file_type) = entry.file_type() else { continue };

            if file_type.is_dir() {
                if entry.depth() == max_depth
                    && !truncation.contains(&Truncation::MaxDepth { limit: max_depth })
                    && dir_has_entries(entry.path())
                {
                    truncation.push(Truncation::MaxDepth { limit: max_depth });
                }
                continue;
            }
            // Symlinks are never followed and never reported.
            if !file_type.is_file() {
                continue;
            }

            if files.len() >= self.settings.max_files {
                truncation.push(Truncation::MaxFiles { limit: self.settings.max_files });
                break;
            }

            let Some(rel) = relative_slash_path(root, entry.path()) else { continue };
            let size = match entry.metadata() {
                Ok(meta) => meta.len(),
                Err(err) => {
                    tracing::debug!(path = %rel, error = %err, "skipping file without metadata");
                    continue;
                }
            };
            if total_bytes.saturating_add(size) > self.settings.max_total_bytes {
                truncation.push(Truncation::MaxTotalBytes { limit: self.settings.max_total_bytes });
                break;
            }
            total_bytes += size;
            files.push((entry.into_path(), rel, size));
        }

        (files, truncation)
    }
}

fn dir_has_entries(path: &Path) -> bool {
    std::fs::read_dir(path).map(|mut entries| entries.next().is_some()).unwrap_or(false)
}
