//! Terminal artifacts of the extraction and diagram branches.

use serde::Serialize;

/// Why a file was left out of the extracted content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    ExcludedByPattern,
    NotIncluded,
    Binary,
    TooLarge,
    OutputBudget,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkipReason::ExcludedByPattern => "excluded_by_pattern",
            SkipReason::NotIncluded => "not_included",
            SkipReason::Binary => "binary",
            SkipReason::TooLarge => "too_large",
            SkipReason::OutputBudget => "output_budget",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IncludedFile {
    pub path: String,
    pub size: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExcludedFile {
    pub path: String,
    pub reason: SkipReason,
}

/// A file that passed the filter but could not be read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileError {
    pub path: String,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExtractionTotals {
    pub files_included: usize,
    pub files_excluded: usize,
    pub files_failed: usize,
    pub bytes_included: u64,
    pub estimated_tokens: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExtractionResult {
    pub content: String,
    pub included: Vec<IncludedFile>,
    pub excluded: Vec<ExcludedFile>,
    pub errors: Vec<FileError>,
    pub totals: ExtractionTotals,
    /// First 16 hex chars of the SHA-256 of `content`.
    pub digest: String,
}

impl ExtractionResult {
    pub fn excluded_reason(&self, path: &str) -> Option<SkipReason> {
        self.excluded.iter().find(|e| e.path == path).map(|e| e.reason)
    }

    pub fn is_included(&self, path: &str) -> bool {
        self.included.iter().any(|f| f.path == path)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagramSource {
    Llm,
    Template,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiagramResult {
    /// Mermaid source.
    pub diagram: String,
    pub explanation: Option<String>,
    pub nodes: usize,
    pub edges: usize,
    pub source: DiagramSource,
}
