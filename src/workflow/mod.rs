//! The analysis state machine
//!
//! ```text
//! fetch -> analyze -> route -> { generate_filters -> extract_content }
//!                              || { generate_diagram }
//!       -> cleanup -> response
//! ```
//!
//! Every request owns a workspace directory named after its request id.
//! `cleanup` runs exactly once on every path out of [`Orchestrator::run`];
//! if the run future is dropped first, the workspace guard removes the
//! directory instead.

use crate::config::Settings;
use crate::diagram::DiagramGenerator;
use crate::domain::{
    AnalysisRequest, AnalysisResponse, DiagramResult, ExtractionResult, FilterOrigin, FilterSpec,
    SkipReason, Stage, StageOutcome, StructureSummary,
};
use crate::error::{AnalysisError, FetchError, FilterGenerationError, LlmError, WorkflowError};
use crate::extract::ContentExtractor;
use crate::fetch::{fetch_snapshot, CleanupOutcome, GitFetcher, RepoSource, RepositoryFetcher, Workspace};
use crate::filter::{explicit_filter, FilterGenerator};
use crate::llm::{LanguageModel, OpenAiClient};
use crate::scan::StructureAnalyzer;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::Instrument;
use uuid::Uuid;

pub mod state;

pub use state::{BranchLog, WorkflowState};

/// How the filter for a run is obtained, decided by the `route` stage.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterPlan {
    Explicit(FilterSpec),
    Query { query: String, required: bool },
    MatchAll,
}

impl FilterPlan {
    pub fn has_query(&self) -> bool {
        matches!(self, FilterPlan::Query { .. })
    }
}

/// Validated request, ready for the stages.
struct Prepared {
    source: RepoSource,
    explicit: Option<FilterSpec>,
    max_file_size: u64,
}

pub struct Orchestrator {
    settings: Arc<Settings>,
    fetcher: Arc<dyn RepositoryFetcher>,
    model: Option<Arc<dyn LanguageModel>>,
}

impl Orchestrator {
    pub fn new(
        settings: Arc<Settings>,
        fetcher: Arc<dyn RepositoryFetcher>,
        model: Option<Arc<dyn LanguageModel>>,
    ) -> Self {
        Self { settings, fetcher, model }
    }

    /// Production wiring: libgit2 fetcher, OpenAI-compatible model when
    /// credentials are configured.
    pub fn from_settings(settings: Arc<Settings>) -> Self {
        let fetcher: Arc<dyn RepositoryFetcher> = Arc::new(GitFetcher::new(&settings.fetch));
        let model: Option<Arc<dyn LanguageModel>> = match OpenAiClient::from_settings(&settings.llm) {
            Ok(client) => Some(Arc::new(client)),
            Err(e) => {
                tracing::debug!(error = %e, "language model unavailable");
                None
            }
        };
        Self::new(settings, fetcher, model)
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Run one request to completion. Never panics on stage failures; every
    /// outcome is described by the returned response.
    pub async fn run(&self, request: AnalysisRequest) -> AnalysisResponse {
        let request_id = Uuid::new_v4();
        let span = tracing::info_span!("analysis", %request_id, url = %request.url);
        self.run_with_id(request_id, request).instrument(span).await
    }

    async fn run_with_id(&self, request_id: Uuid, request: AnalysisRequest) -> AnalysisResponse {
        let mut state = WorkflowState::new(request_id, request);
        let mut workspace = None;

        if let Err(error) = self.run_stages(&mut state, &mut workspace).await {
            state.fail(error);
        }
        self.cleanup(&mut state, workspace);

        let response = state.into_response();
        tracing::info!(status = ?response.status, warnings = response.warnings.len(), "analysis finished");
        response
    }

    async fn run_stages(
        &self,
        state: &mut WorkflowState,
        workspace: &mut Option<Workspace>,
    ) -> Result<(), WorkflowError> {
        let prepared = self.prepare(&state.request)?;
        state.repository = Some(prepared.source.name.clone());

        // fetch
        let created = Workspace::create(&self.settings.tmp_base_path, state.request_id).map_err(
            |source| FetchError::Storage {
                path: self.settings.tmp_base_path.join(state.request_id.to_string()),
                source,
            },
        )?;
        let workspace = workspace.insert(created);
        let snapshot = fetch_snapshot(self.fetcher.as_ref(), &prepared.source, workspace).await?;
        state.record(
            Stage::Fetch,
            StageOutcome::Completed,
            snapshot.metadata.head_commit.as_ref().map(|c| format!("head {c}")),
        );
        let root = snapshot.root.clone();
        state.snapshot = Some(snapshot);

        // analyze
        let summary = Arc::new(self.analyze(&root, prepared.source.name.clone()).await?);
        for reason in &summary.truncation {
            state.warn(Stage::Analyze, format!("structure truncated: {reason}"));
        }
        state.record(
            Stage::Analyze,
            StageOutcome::Completed,
            Some(format!("{} files, {} directories", summary.stats.files, summary.stats.directories)),
        );
        state.summary = Some(Arc::clone(&summary));

        // route
        let plan = self.route(state, prepared.explicit);
        let diagram_enabled = state.request.diagram;
        state.record(
            Stage::Route,
            StageOutcome::Completed,
            Some(format!("has_query={}, diagram={diagram_enabled}", plan.has_query())),
        );

        // fork: filters -> extraction || diagram
        let ((filter_log, extracted), (diagram_log, diagram)) = tokio::join!(
            self.filter_and_extract(&summary, &root, plan, prepared.max_file_size),
            self.diagram_branch(&summary, diagram_enabled),
        );
        state.merge(filter_log);
        state.merge(diagram_log);

        // A failed filter branch fails the run; the diagram is not reported alone.
        let (filter, extraction) = extracted?;
        state.diagram = diagram;
        state.filter = Some(filter);
        state.extraction = Some(extraction);
        Ok(())
    }

    fn prepare(&self, request: &AnalysisRequest) -> Result<Prepared, WorkflowError> {
        if request.url.trim().is_empty() {
            return Err(WorkflowError::InvalidRequest("repository URL is required".to_string()));
        }
        let source = RepoSource::parse(&request.url, request.reference.as_deref())
            .map_err(|e| WorkflowError::InvalidRequest(e.to_string()))?;

        let max_file_size = request.max_file_size.unwrap_or(self.settings.default_max_file_size);
        if max_file_size == 0 {
            return Err(WorkflowError::InvalidRequest(
                "max_file_size must be greater than zero".to_string(),
            ));
        }
        if request.require_query && request.query().is_none() {
            return Err(WorkflowError::InvalidRequest(
                "require_query is set but no query was given".to_string(),
            ));
        }

        let explicit = if request.has_explicit_patterns() {
            let (include, exclude) = request.explicit_patterns();
            let spec = explicit_filter(&include, &exclude, max_file_size).map_err(|rejected| {
                let listed: Vec<String> = rejected.iter().map(ToString::to_string).collect();
                WorkflowError::InvalidRequest(format!("unsafe patterns: {}", listed.join(", ")))
            })?;
            Some(spec)
        } else {
            None
        };

        Ok(Prepared { source, explicit, max_file_size })
    }

    async fn analyze(&self, root: &Path, name: String) -> Result<StructureSummary, AnalysisError> {
        let analyzer = StructureAnalyzer::new(self.settings.scan.clone());
        let root: PathBuf = root.to_path_buf();
        match tokio::task::spawn_blocking(move || analyzer.analyze_dir(&root, &name)).await {
            Ok(result) => result,
            Err(join_err) => std::panic::resume_unwind(join_err.into_panic()),
        }
    }

    fn route(&self, state: &mut WorkflowState, explicit: Option<FilterSpec>) -> FilterPlan {
        let query = state.request.query().map(str::to_string);
        match (explicit, query) {
            (Some(spec), query) => {
                if query.is_some() {
                    state.warn(Stage::Route, "query ignored because explicit patterns were given");
                }
                FilterPlan::Explicit(spec)
            }
            (None, Some(query)) => FilterPlan::Query { query, required: state.request.require_query },
            (None, None) => FilterPlan::MatchAll,
        }
    }

    async fn filter_and_extract(
        &self,
        summary: &Arc<StructureSummary>,
        root: &Path,
        plan: FilterPlan,
        max_file_size: u64,
    ) -> (BranchLog, Result<(FilterSpec, ExtractionResult), WorkflowError>) {
        let mut log = BranchLog::default();

        let filter = match plan {
            FilterPlan::Explicit(spec) => {
                log.record(Stage::GenerateFilters, StageOutcome::Skipped, Some("explicit patterns".into()));
                spec
            }
            FilterPlan::MatchAll => {
                log.record(Stage::GenerateFilters, StageOutcome::Skipped, Some("no query".into()));
                FilterSpec::match_all(max_file_size, FilterOrigin::MatchAll)
            }
            FilterPlan::Query { query, required } => {
                match self.generate_filter(summary, &query, max_file_size, &mut log).await {
                    Ok(spec) => spec,
                    Err(e) if required => return (log, Err(WorkflowError::FilterGeneration(e))),
                    Err(e) => {
                        log.record(Stage::GenerateFilters, StageOutcome::Degraded, Some(e.to_string()));
                        log.warn(
                            Stage::GenerateFilters,
                            format!("filter generation failed, using all files instead: {e}"),
                        );
                        FilterSpec::match_all(max_file_size, FilterOrigin::Fallback)
                    }
                }
            }
        };

        let extractor = ContentExtractor::new(self.settings.max_output_bytes);
        let task_summary = Arc::clone(summary);
        let task_root = root.to_path_buf();
        let task_filter = filter.clone();
        let extraction = match tokio::task::spawn_blocking(move || {
            extractor.extract(&task_root, &task_summary, &task_filter)
        })
        .await
        {
            Ok(Ok(extraction)) => extraction,
            Ok(Err(e)) => return (log, Err(WorkflowError::Extraction(e))),
            Err(join_err) => std::panic::resume_unwind(join_err.into_panic()),
        };

        log.record(
            Stage::ExtractContent,
            StageOutcome::Completed,
            Some(format!(
                "{} included, {} excluded",
                extraction.totals.files_included, extraction.totals.files_excluded
            )),
        );
        if !extraction.errors.is_empty() {
            log.warn(
                Stage::ExtractContent,
                format!("{} file(s) could not be read", extraction.errors.len()),
            );
        }
        let over_budget =
            extraction.excluded.iter().filter(|e| e.reason == SkipReason::OutputBudget).count();
        if over_budget > 0 {
            log.warn(
                Stage::ExtractContent,
                format!(
                    "output limit of {} bytes reached, {over_budget} file(s) left out",
                    self.settings.max_output_bytes
                ),
            );
        }

        (log, Ok((filter, extraction)))
    }

    async fn generate_filter(
        &self,
        summary: &StructureSummary,
        query: &str,
        max_file_size: u64,
        log: &mut BranchLog,
    ) -> Result<FilterSpec, FilterGenerationError> {
        let model = self.model.clone().ok_or_else(|| {
            LlmError::NotConfigured("no language model available for query".to_string())
        })?;
        let generator = FilterGenerator::new(model, &self.settings.llm);
        let generated = generator.generate(summary, query, max_file_size).await?;

        log.record(
            Stage::GenerateFilters,
            StageOutcome::Completed,
            Some(format!(
                "{} include, {} exclude",
                generated.spec.include().len(),
                generated.spec.exclude().len()
            )),
        );
        for rejected in &generated.rejected {
            log.warn(Stage::GenerateFilters, format!("dropped generated pattern {rejected}"));
        }
        Ok(generated.spec)
    }

    async fn diagram_branch(
        &self,
        summary: &StructureSummary,
        enabled: bool,
    ) -> (BranchLog, Option<DiagramResult>) {
        let mut log = BranchLog::default();
        if !enabled {
            log.record(Stage::GenerateDiagram, StageOutcome::Skipped, Some("not requested".into()));
            return (log, None);
        }

        let generator = DiagramGenerator::new(&self.settings, self.model.clone());
        match generator.generate(summary).await {
            Ok(diagram) => {
                log.record(
                    Stage::GenerateDiagram,
                    StageOutcome::Completed,
                    Some(format!("{} nodes, {} edges", diagram.nodes, diagram.edges)),
                );
                (log, Some(diagram))
            }
            Err(e) => {
                log.record(Stage::GenerateDiagram, StageOutcome::Failed, Some(e.to_string()));
                log.warn(Stage::GenerateDiagram, format!("diagram omitted: {e}"));
                (log, None)
            }
        }
    }

    fn cleanup(&self, state: &mut WorkflowState, workspace: Option<Workspace>) {
        let Some(mut workspace) = workspace else {
            state.record(Stage::Cleanup, StageOutcome::Skipped, Some("nothing to clean".into()));
            return;
        };
        match workspace.cleanup() {
            Ok(CleanupOutcome::Removed) => {
                state.record(Stage::Cleanup, StageOutcome::Completed, Some("workspace removed".into()))
            }
            Ok(outcome) => state.record(
                Stage::Cleanup,
                StageOutcome::Completed,
                Some(format!("nothing to remove ({outcome:?})")),
            ),
            Err(e) => {
                state.record(Stage::Cleanup, StageOutcome::Failed, Some(e.to_string()));
                state.warn(
                    Stage::Cleanup,
                    format!("failed removing workspace {}: {e}", workspace.root().display()),
                );
            }
        }
    }
}
