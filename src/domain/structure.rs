//! Repository snapshot and the structure summary derived from it.

use serde::Serialize;
use std::collections::BTreeSet;
use std::path::PathBuf;

/// What the fetcher learned about the cloned repository.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FetchMetadata {
    pub default_branch: Option<String>,
    pub head_commit: Option<String>,
    pub file_count: Option<usize>,
}

/// Local copy of a repository, owned by exactly one run.
#[derive(Debug, Clone)]
pub struct RepositorySnapshot {
    pub root: PathBuf,
    pub name: String,
    pub metadata: FetchMetadata,
}

/// One file discovered in a snapshot. `path` is relative with `/` separators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileRecord {
    pub path: String,
    pub size: u64,
    pub is_binary: bool,
}

impl FileRecord {
    pub fn new(path: impl Into<String>, size: u64, is_binary: bool) -> Self {
        Self { path: path.into(), size, is_binary }
    }

    /// Parent directory, `""` for files at the root.
    pub fn directory(&self) -> &str {
        self.path.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("")
    }

    pub fn file_name(&self) -> &str {
        self.path.rsplit_once('/').map(|(_, name)| name).unwrap_or(&self.path)
    }
}

/// Why the analyzer stopped before seeing the whole snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum Truncation {
    MaxFiles { limit: usize },
    MaxDepth { limit: usize },
    MaxTotalBytes { limit: u64 },
}

impl std::fmt::Display for Truncation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Truncation::MaxFiles { limit } => write!(f, "file limit of {limit} reached"),
            Truncation::MaxDepth { limit } => {
                write!(f, "directories deeper than {limit} levels were not scanned")
            }
            Truncation::MaxTotalBytes { limit } => write!(f, "total size limit of {limit} bytes reached"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StructureStats {
    pub files: usize,
    pub directories: usize,
    pub total_bytes: u64,
    pub binary_files: usize,
}

/// Files of a snapshot ordered by directory, then name.
#[derive(Debug, Clone, Serialize)]
pub struct StructureSummary {
    pub root_name: String,
    pub files: Vec<FileRecord>,
    pub stats: StructureStats,
    pub truncation: Vec<Truncation>,
    /// Full rendered tree; empty until the analyzer attaches it.
    #[serde(skip)]
    pub tree: String,
}

impl StructureSummary {
    pub fn new(
        root_name: impl Into<String>,
        mut files: Vec<FileRecord>,
        truncation: Vec<Truncation>,
    ) -> Self {
        files.sort_by(|a, b| {
            a.directory().cmp(b.directory()).then_with(|| a.file_name().cmp(b.file_name()))
        });

        let mut directories = BTreeSet::new();
        for file in &files {
            let mut dir = file.directory();
            while !dir.is_empty() && directories.insert(dir.to_string()) {
                dir = dir.rsplit_once('/').map(|(parent, _)| parent).unwrap_or("");
            }
        }

        let stats = StructureStats {
            files: files.len(),
            directories: directories.len(),
            total_bytes: files.iter().map(|f| f.size).sum(),
            binary_files: files.iter().filter(|f| f.is_binary).count(),
        };

        Self { root_name: root_name.into(), files, stats, truncation, tree: String::new() }
    }

    pub fn with_tree(mut self, tree: String) -> Self {
        self.tree = tree;
        self
    }

    pub fn is_truncated(&self) -> bool {
        !self.truncation.is_empty()
    }

    /// Number of files at or below `dir` (`""` is the root).
    pub fn files_under(&self, dir: &str) -> usize {
        if dir.is_empty() {
            return self.files.len();
        }
        let prefix = format!("{dir}/");
        self.files.iter().filter(|f| f.path.starts_with(&prefix)).count()
    }
}
