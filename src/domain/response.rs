//! Outbound response, stage trace and warning types.

use super::filter::FilterSpec;
use super::results::{DiagramResult, ExcludedFile, ExtractionTotals, FileError, IncludedFile};
use serde::Serialize;
use uuid::Uuid;

/// Named step of the analysis state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Fetch,
    Analyze,
    Route,
    GenerateFilters,
    GenerateDiagram,
    ExtractContent,
    Cleanup,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Fetch => "fetch",
            Stage::Analyze => "analyze",
            Stage::Route => "route",
            Stage::GenerateFilters => "generate_filters",
            Stage::GenerateDiagram => "generate_diagram",
            Stage::ExtractContent => "extract_content",
            Stage::Cleanup => "cleanup",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StageOutcome {
    Completed,
    Skipped,
    Degraded,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageRecord {
    pub stage: Stage,
    pub outcome: StageOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// A non-fatal problem attached to the final response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Warning {
    pub stage: Stage,
    pub message: String,
}

impl Warning {
    pub fn new(stage: Stage, message: impl Into<String>) -> Self {
        Self { stage, message: message.into() }
    }
}

impl std::fmt::Display for Warning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.stage, self.message)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidRequest,
    FetchError,
    AnalysisError,
    FilterGenerationError,
    ExtractionError,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorDetail {
    pub kind: ErrorKind,
    pub stage: Option<Stage>,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseStatus {
    /// Full output, no warnings.
    Success,
    /// Usable output with warnings.
    Partial,
    /// Hard failure, no usable output.
    Failed,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalysisResponse {
    pub request_id: Uuid,
    pub status: ResponseStatus,
    pub repository: Option<String>,
    pub summary: Option<String>,
    pub tree: Option<String>,
    pub content: Option<String>,
    pub stats: Option<ExtractionTotals>,
    pub included: Vec<IncludedFile>,
    pub excluded: Vec<ExcludedFile>,
    pub file_errors: Vec<FileError>,
    pub filter: Option<FilterSpec>,
    pub warnings: Vec<Warning>,
    pub diagram: Option<DiagramResult>,
    pub error: Option<ErrorDetail>,
    pub stages: Vec<StageRecord>,
}

impl AnalysisResponse {
    pub fn is_failed(&self) -> bool {
        self.status == ResponseStatus::Failed
    }

    /// Number of trace entries recorded for `stage`.
    pub fn stage_count(&self, stage: Stage) -> usize {
        self.stages.iter().filter(|r| r.stage == stage).count()
    }

    pub fn stage_outcome(&self, stage: Stage) -> Option<StageOutcome> {
        self.stages.iter().find(|r| r.stage == stage).map(|r| r.outcome)
    }

    pub fn warnings_for(&self, stage: Stage) -> impl Iterator<Item = &Warning> {
        self.warnings.iter().filter(move |w| w.stage == stage)
    }
}
