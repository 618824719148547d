//! Mutable per-request record threaded through the stages

use crate::domain::{
    AnalysisRequest, AnalysisResponse, DiagramResult, ExtractionResult, FilterSpec,
    RepositorySnapshot, ResponseStatus, Stage, StageOutcome, StageRecord, StructureSummary,
    Warning,
};
use crate::error::WorkflowError;
use crate::render::summary_text;
use std::sync::Arc;
use uuid::Uuid;

/// Trace entries and warnings produced by one branch of the fork.
///
/// Branches run concurrently and never touch [`WorkflowState`] directly;
/// their logs are merged after the join.
#[derive(Debug, Default)]
pub struct BranchLog {
    pub stages: Vec<StageRecord>,
    pub warnings: Vec<Warning>,
}

impl BranchLog {
    pub fn record(&mut self, stage: Stage, outcome: StageOutcome, detail: Option<String>) {
        tracing::debug!(%stage, ?outcome, detail = detail.as_deref().unwrap_or(""), "stage finished");
        self.stages.push(StageRecord { stage, outcome, detail });
    }

    pub fn warn(&mut self, stage: Stage, message: impl Into<String>) {
        let warning = Warning::new(stage, message);
        tracing::warn!(%stage, message = %warning.message, "stage degraded");
        self.warnings.push(warning);
    }
}

pub struct WorkflowState {
    pub request_id: Uuid,
    pub request: AnalysisRequest,
    pub repository: Option<String>,
    pub snapshot: Option<RepositorySnapshot>,
    pub summary: Option<Arc<StructureSummary>>,
    pub filter: Option<FilterSpec>,
    pub extraction: Option<ExtractionResult>,
    pub diagram: Option<DiagramResult>,
    pub error: Option<WorkflowError>,
    log: BranchLog,
}

impl WorkflowState {
    pub fn new(request_id: Uuid, request: AnalysisRequest) -> Self {
        Self {
            request_id,
            request,
            repository: None,
            snapshot: None,
            summary: None,
            filter: None,
            extraction: None,
            diagram: None,
            error: None,
            log: BranchLog::default(),
        }
    }

    pub fn record(&mut self, stage: Stage, outcome: StageOutcome, detail: Option<String>) {
        self.log.record(stage, outcome, detail);
    }

    pub fn warn(&mut self, stage: Stage, message: impl Into<String>) {
        self.log.warn(stage, message);
    }

    pub fn merge(&mut self, branch: BranchLog) {
        self.log.stages.extend(branch.stages);
        self.log.warnings.extend(branch.warnings);
    }

    /// Record a terminal error. The failing stage, when there is one, gets a
    /// `failed` trace entry.
    pub fn fail(&mut self, error: WorkflowError) {
        tracing::error!(error = %error, "analysis failed");
        if let Some(stage) = error.stage() {
            self.record(stage, StageOutcome::Failed, Some(error.to_string()));
        }
        self.error = Some(error);
    }

    pub fn into_response(self) -> AnalysisResponse {
        let status = if self.error.is_some() {
            ResponseStatus::Failed
        } else if !self.log.warnings.is_empty() {
            ResponseStatus::Partial
        } else {
            ResponseStatus::Success
        };

        let header = match (&self.repository, &self.summary, &self.extraction) {
            (Some(name), Some(summary), Some(extraction)) => Some(summary_text(
                name,
                summary.stats.files,
                self.filter.as_ref(),
                extraction.totals.estimated_tokens,
            )),
            _ => None,
        };
        let tree = self.summary.as_ref().map(|s| s.tree.clone()).filter(|t| !t.is_empty());

        let (content, stats, included, excluded, file_errors) = match self.extraction {
            Some(extraction) => (
                Some(extraction.content),
                Some(extraction.totals),
                extraction.included,
                extraction.excluded,
                extraction.errors,
            ),
            None => (None, None, Vec::new(), Vec::new(), Vec::new()),
        };

        AnalysisResponse {
            request_id: self.request_id,
            status,
            repository: self.repository,
            summary: header,
            tree,
            content,
            stats,
            included,
            excluded,
            file_errors,
            filter: self.filter,
            warnings: self.log.warnings,
            diagram: self.diagram,
            error: self.error.as_ref().map(WorkflowError::detail),
            stages: self.log.stages,
        }
    }
}
