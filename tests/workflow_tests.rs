//! End-to-end runs of the orchestrator against fixture repositories

use async_trait::async_trait;
use repo_prompt::config::{DiagramMode, Settings};
use repo_prompt::domain::{
    AnalysisRequest, AnalysisResponse, ErrorKind, FetchMetadata, FilterOrigin, ResponseStatus,
    SkipReason, Stage, StageOutcome,
};
use repo_prompt::error::{FetchError, LlmError};
use repo_prompt::fetch::{GitFetcher, RepoSource, RepositoryFetcher};
use repo_prompt::llm::{LanguageModel, MockLanguageModel};
use repo_prompt::Orchestrator;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

const URL: &str = "https://github.com/acme/demo";

/// Writes a fixed set of files into the destination, optionally failing
/// afterwards to simulate a clone that died half way.
struct FixtureFetcher {
    files: Vec<(String, Vec<u8>)>,
    fail_after_write: bool,
    calls: AtomicUsize,
}

impl FixtureFetcher {
    fn new(files: &[(&str, &[u8])]) -> Self {
        Self {
            files: files.iter().map(|(p, b)| (p.to_string(), b.to_vec())).collect(),
            fail_after_write: false,
            calls: AtomicUsize::new(0),
        }
    }

    fn failing(files: &[(&str, &[u8])]) -> Self {
        Self { fail_after_write: true, ..Self::new(files) }
    }
}

#[async_trait]
impl RepositoryFetcher for FixtureFetcher {
    async fn fetch(&self, source: &RepoSource, dest: &Path) -> Result<FetchMetadata, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        fs::create_dir_all(dest).map_err(|e| FetchError::Git(e.to_string()))?;
        for (rel, bytes) in &self.files {
            let path = dest.join(rel);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).map_err(|e| FetchError::Git(e.to_string()))?;
            }
            fs::write(&path, bytes).map_err(|e| FetchError::Git(e.to_string()))?;
        }
        if self.fail_after_write {
            return Err(FetchError::Unreachable {
                url: source.url.clone(),
                message: "connection reset".to_string(),
            });
        }
        Ok(FetchMetadata {
            default_branch: Some("main".to_string()),
            head_commit: Some("0123456789abcdef0123456789abcdef01234567".to_string()),
            file_count: Some(self.files.len()),
        })
    }
}

/// Answers after `delay`, long enough to trip the configured timeout.
struct SlowModel {
    delay: Duration,
}

#[async_trait]
impl LanguageModel for SlowModel {
    async fn complete(&self, _system: &str, _user: &str) -> Result<String, LlmError> {
        tokio::time::sleep(self.delay).await;
        Ok(r#"{"include": ["**"], "exclude": []}"#.to_string())
    }
}

struct Harness {
    _tmp: TempDir,
    tmp_base: PathBuf,
    settings: Settings,
}

impl Harness {
    fn new() -> Self {
        let tmp = TempDir::new().expect("tmp");
        let tmp_base = tmp.path().join("workspaces");
        let mut settings = Settings::default();
        settings.tmp_base_path = tmp_base.clone();
        settings.llm.timeout_ms = 200;
        settings.llm.max_attempts = 2;
        Self { _tmp: tmp, tmp_base, settings }
    }

    fn orchestrator(
        &self,
        fetcher: Arc<dyn RepositoryFetcher>,
        model: Option<Arc<dyn LanguageModel>>,
    ) -> Orchestrator {
        Orchestrator::new(Arc::new(self.settings.clone()), fetcher, model)
    }

    /// Workspace directories still present under the base path.
    fn leftover_workspaces(&self) -> usize {
        fs::read_dir(&self.tmp_base).map(|entries| entries.count()).unwrap_or(0)
    }

    fn assert_cleaned(&self, response: &AnalysisResponse) {
        assert_eq!(response.stage_count(Stage::Cleanup), 1, "cleanup must run exactly once");
        assert!(!self.tmp_base.join(response.request_id.to_string()).exists());
        assert_eq!(self.leftover_workspaces(), 0);
    }
}

fn service_repo() -> FixtureFetcher {
    FixtureFetcher::new(&[
        ("auth/login.py", b"def login(user):\n    return True\n"),
        ("billing/invoice.py", b"def invoice():\n    pass\n"),
        ("README.md", b"# demo service\n"),
    ])
}

fn model_answering(answer: &'static str) -> MockLanguageModel {
    let mut model = MockLanguageModel::new();
    model.expect_complete().returning(move |_, _| Ok(answer.to_string()));
    model
}

fn stages(response: &AnalysisResponse) -> Vec<Stage> {
    response.stages.iter().map(|r| r.stage).collect()
}

#[tokio::test]
async fn no_filter_excludes_binary_files() {
    let harness = Harness::new();
    let mut png = vec![0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a, 0x00];
    png.resize(500 * 1024, 0x42);
    let main_py = vec![b'#'; 1024];
    let fetcher = FixtureFetcher::new(&[("src/main.py", &main_py), ("assets/logo.png", &png)]);

    let response = harness
        .orchestrator(Arc::new(fetcher), None)
        .run(AnalysisRequest::new(URL))
        .await;

    assert_eq!(response.status, ResponseStatus::Success, "{:?}", response.warnings);
    assert!(response.included.iter().any(|f| f.path == "src/main.py"));
    let logo = response.excluded.iter().find(|e| e.path == "assets/logo.png").expect("logo");
    assert_eq!(logo.reason, SkipReason::Binary);
    assert_eq!(response.filter.as_ref().map(|f| f.origin()), Some(FilterOrigin::MatchAll));
    assert!(response.summary.as_deref().unwrap_or("").contains("Repository: demo"));
    assert!(response.diagram.is_none());
    assert_eq!(
        stages(&response),
        vec![
            Stage::Fetch,
            Stage::Analyze,
            Stage::Route,
            Stage::GenerateFilters,
            Stage::ExtractContent,
            Stage::GenerateDiagram,
            Stage::Cleanup,
        ]
    );
    harness.assert_cleaned(&response);
}

#[tokio::test]
async fn query_generates_include_patterns() {
    let harness = Harness::new();
    let model = model_answering(
        r#"{"include": ["auth/**"], "exclude": [], "explanation": "Authentication lives in auth/."}"#,
    );

    let response = harness
        .orchestrator(Arc::new(service_repo()), Some(Arc::new(model)))
        .run(AnalysisRequest::new(URL).with_query("only authentication code"))
        .await;

    assert_eq!(response.status, ResponseStatus::Success, "{:?}", response.warnings);
    let included: Vec<&str> = response.included.iter().map(|f| f.path.as_str()).collect();
    assert_eq!(included, vec!["auth/login.py"]);
    let filter = response.filter.as_ref().expect("filter");
    assert_eq!(filter.origin(), FilterOrigin::Generated);
    assert_eq!(response.stage_outcome(Stage::GenerateFilters), Some(StageOutcome::Completed));
    let summary = response.summary.as_deref().expect("summary");
    assert!(summary.contains("Patterns generated from query"));
    assert!(summary.contains("auth/**"));
    harness.assert_cleaned(&response);
}

#[tokio::test]
async fn generator_timeout_falls_back_to_all_files() {
    let mut harness = Harness::new();
    harness.settings.llm.timeout_ms = 50;
    harness.settings.llm.max_attempts = 1;
    let model = SlowModel { delay: Duration::from_secs(5) };

    let response = harness
        .orchestrator(Arc::new(service_repo()), Some(Arc::new(model)))
        .run(AnalysisRequest::new(URL).with_query("only authentication code"))
        .await;

    assert_eq!(response.status, ResponseStatus::Partial);
    assert_eq!(response.included.len(), 3);
    assert_eq!(response.filter.as_ref().map(|f| f.origin()), Some(FilterOrigin::Fallback));
    assert_eq!(response.stage_outcome(Stage::GenerateFilters), Some(StageOutcome::Degraded));
    let warnings: Vec<_> = response.warnings_for(Stage::GenerateFilters).collect();
    assert_eq!(warnings.len(), 1);
    assert!(warnings[0].message.contains("timed out"));
    harness.assert_cleaned(&response);
}

#[tokio::test]
async fn diagram_failure_keeps_extraction() {
    let harness = Harness::new();
    let mut model = MockLanguageModel::new();
    model
        .expect_complete()
        .times(1)
        .returning(|_, _| Err(LlmError::Status { status: 400, body: "bad request".into() }));

    let response = harness
        .orchestrator(Arc::new(service_repo()), Some(Arc::new(model)))
        .run(AnalysisRequest::new(URL).with_diagram(true))
        .await;

    assert_eq!(response.status, ResponseStatus::Partial);
    assert!(response.diagram.is_none());
    assert_eq!(response.warnings.len(), 1);
    assert_eq!(response.warnings[0].stage, Stage::GenerateDiagram);
    assert_eq!(response.included.len(), 3);
    assert!(response.content.as_deref().unwrap_or("").contains("File: auth/login.py"));
    assert!(response.error.is_none());
    harness.assert_cleaned(&response);
}

#[tokio::test]
async fn template_diagram_runs_without_model() {
    let mut harness = Harness::new();
    harness.settings.diagram.mode = DiagramMode::Template;

    let response = harness
        .orchestrator(Arc::new(service_repo()), None)
        .run(AnalysisRequest::new(URL).with_diagram(true))
        .await;

    assert_eq!(response.status, ResponseStatus::Success, "{:?}", response.warnings);
    let diagram = response.diagram.as_ref().expect("diagram");
    assert!(diagram.diagram.starts_with("graph TD"));
    assert_eq!(diagram.nodes, 3);
    harness.assert_cleaned(&response);
}

#[tokio::test]
async fn required_query_failure_is_fatal() {
    let harness = Harness::new();
    let mut model = MockLanguageModel::new();
    model
        .expect_complete()
        .times(1)
        .returning(|_, _| Err(LlmError::Status { status: 401, body: "unauthorized".into() }));

    let response = harness
        .orchestrator(Arc::new(service_repo()), Some(Arc::new(model)))
        .run(AnalysisRequest::new(URL).with_required_query("only authentication code"))
        .await;

    assert_eq!(response.status, ResponseStatus::Failed);
    let error = response.error.as_ref().expect("error");
    assert_eq!(error.kind, ErrorKind::FilterGenerationError);
    assert_eq!(error.stage, Some(Stage::GenerateFilters));
    assert!(response.content.is_none());
    assert_eq!(response.stage_outcome(Stage::GenerateFilters), Some(StageOutcome::Failed));
    harness.assert_cleaned(&response);
}

#[tokio::test]
async fn required_query_without_model_is_fatal() {
    let harness = Harness::new();

    let response = harness
        .orchestrator(Arc::new(service_repo()), None)
        .run(AnalysisRequest::new(URL).with_required_query("auth"))
        .await;

    assert_eq!(response.error.map(|e| e.kind), Some(ErrorKind::FilterGenerationError));
    assert_eq!(harness.leftover_workspaces(), 0);
}

#[tokio::test]
async fn fetch_failure_removes_partial_clone() {
    let harness = Harness::new();
    let fetcher = Arc::new(FixtureFetcher::failing(&[("half/written.txt", b"partial")]));

    let response = harness
        .orchestrator(fetcher.clone(), None)
        .run(AnalysisRequest::new(URL))
        .await;

    assert_eq!(response.status, ResponseStatus::Failed);
    let error = response.error.as_ref().expect("error");
    assert_eq!(error.kind, ErrorKind::FetchError);
    assert_eq!(error.stage, Some(Stage::Fetch));
    assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
    assert_eq!(stages(&response), vec![Stage::Fetch, Stage::Cleanup]);
    harness.assert_cleaned(&response);
}

#[tokio::test]
async fn empty_repository_is_an_analysis_error() {
    let harness = Harness::new();

    let response = harness
        .orchestrator(Arc::new(FixtureFetcher::new(&[])), None)
        .run(AnalysisRequest::new(URL))
        .await;

    assert_eq!(response.error.as_ref().map(|e| e.kind), Some(ErrorKind::AnalysisError));
    assert_eq!(response.stage_outcome(Stage::Analyze), Some(StageOutcome::Failed));
    harness.assert_cleaned(&response);
}

#[tokio::test]
async fn invalid_requests_never_touch_storage() {
    let harness = Harness::new();
    let fetcher = Arc::new(service_repo());
    let orchestrator = harness.orchestrator(fetcher.clone(), None);

    let requests = vec![
        AnalysisRequest::new("   "),
        AnalysisRequest::new("ftp://example.com/a/b"),
        AnalysisRequest::new(URL).with_max_file_size(0),
        AnalysisRequest::new(URL).with_include(["/etc/*"]),
        AnalysisRequest::new(URL).with_exclude(["../x"]),
    ];
    for request in requests {
        let response = orchestrator.run(request).await;
        assert_eq!(response.status, ResponseStatus::Failed);
        assert_eq!(response.error.as_ref().map(|e| e.kind), Some(ErrorKind::InvalidRequest));
        assert_eq!(response.stage_outcome(Stage::Cleanup), Some(StageOutcome::Skipped));
        assert_eq!(response.stage_count(Stage::Cleanup), 1);
    }
    assert_eq!(fetcher.calls.load(Ordering::SeqCst), 0);
    assert!(!harness.tmp_base.exists());
}

#[tokio::test]
async fn explicit_patterns_override_query() {
    let harness = Harness::new();
    let mut model = MockLanguageModel::new();
    model.expect_complete().never();

    let request = AnalysisRequest::new(URL)
        .with_query("only billing code")
        .with_include(["*.py"])
        .with_exclude(["billing/"]);
    let response = harness
        .orchestrator(Arc::new(service_repo()), Some(Arc::new(model)))
        .run(request)
        .await;

    assert_eq!(response.status, ResponseStatus::Partial);
    assert_eq!(response.warnings_for(Stage::Route).count(), 1);
    assert_eq!(response.stage_outcome(Stage::GenerateFilters), Some(StageOutcome::Skipped));
    let filter = response.filter.as_ref().expect("filter");
    assert_eq!(filter.origin(), FilterOrigin::Explicit);
    assert_eq!(filter.exclude(), ["billing/**".to_string()]);
    let included: Vec<&str> = response.included.iter().map(|f| f.path.as_str()).collect();
    assert_eq!(included, vec!["auth/login.py"]);
    harness.assert_cleaned(&response);
}

#[tokio::test]
async fn max_files_truncation_is_reported() {
    let mut harness = Harness::new();
    harness.settings.scan.max_files = 2;

    let response = harness
        .orchestrator(Arc::new(service_repo()), None)
        .run(AnalysisRequest::new(URL))
        .await;

    assert_eq!(response.status, ResponseStatus::Partial);
    let warnings: Vec<_> = response.warnings_for(Stage::Analyze).collect();
    assert_eq!(warnings.len(), 1);
    assert!(warnings[0].message.contains("file limit of 2"));
    assert_eq!(response.included.len(), 2);
    harness.assert_cleaned(&response);
}

#[tokio::test]
async fn size_override_applies_to_run() {
    let harness = Harness::new();
    let fetcher = FixtureFetcher::new(&[("exact.txt", &[b'a'; 64]), ("over.txt", &[b'a'; 65])]);

    let response = harness
        .orchestrator(Arc::new(fetcher), None)
        .run(AnalysisRequest::new(URL).with_max_file_size(64))
        .await;

    assert!(response.included.iter().any(|f| f.path == "exact.txt"));
    let over = response.excluded.iter().find(|e| e.path == "over.txt").expect("over");
    assert_eq!(over.reason, SkipReason::TooLarge);
}

#[tokio::test]
async fn repeated_runs_produce_identical_content() {
    let harness = Harness::new();
    let orchestrator = harness.orchestrator(Arc::new(service_repo()), None);
    let request = AnalysisRequest::new(URL).with_include(["*.py", "*.md"]);

    let first = orchestrator.run(request.clone()).await;
    let second = orchestrator.run(request).await;

    assert_ne!(first.request_id, second.request_id);
    assert!(first.content.is_some());
    assert_eq!(first.content, second.content);
    assert_eq!(harness.leftover_workspaces(), 0);
}

#[tokio::test]
async fn dropping_the_run_removes_the_workspace() {
    let mut harness = Harness::new();
    harness.settings.llm.timeout_ms = 60_000;
    let model = SlowModel { delay: Duration::from_secs(30) };
    let orchestrator = harness.orchestrator(Arc::new(service_repo()), Some(Arc::new(model)));

    let outcome = tokio::time::timeout(
        Duration::from_millis(300),
        orchestrator.run(AnalysisRequest::new(URL).with_query("auth")),
    )
    .await;

    assert!(outcome.is_err(), "run should still be waiting on the model");
    assert!(harness.tmp_base.exists(), "workspace base was created before the model call");
    assert_eq!(harness.leftover_workspaces(), 0);
}

#[tokio::test]
async fn parent_directory_url_leaves_other_workspaces_alone() {
    let harness = Harness::new();
    let neighbour = harness.tmp_base.join("other-request");
    fs::create_dir_all(&neighbour).expect("mkdir");
    fs::write(neighbour.join("snapshot.txt"), "in use").expect("write");
    let fetcher = Arc::new(GitFetcher::new(&harness.settings.fetch));

    let response = harness
        .orchestrator(fetcher, None)
        .run(AnalysisRequest::new("file:///nonexistent/.."))
        .await;

    assert_eq!(response.status, ResponseStatus::Failed);
    assert_eq!(response.error.as_ref().map(|e| e.kind), Some(ErrorKind::FetchError));
    assert_eq!(response.stage_count(Stage::Cleanup), 1);
    assert!(!harness.tmp_base.join(response.request_id.to_string()).exists());
    assert_eq!(fs::read_to_string(neighbour.join("snapshot.txt")).expect("neighbour"), "in use");
    assert_eq!(harness.leftover_workspaces(), 1);
}

#[tokio::test]
async fn required_query_failure_drops_the_diagram() {
    let mut harness = Harness::new();
    harness.settings.diagram.mode = DiagramMode::Template;
    let mut model = MockLanguageModel::new();
    model
        .expect_complete()
        .returning(|_, _| Err(LlmError::Status { status: 401, body: "unauthorized".into() }));

    let response = harness
        .orchestrator(Arc::new(service_repo()), Some(Arc::new(model)))
        .run(
            AnalysisRequest::new(URL)
                .with_required_query("only authentication code")
                .with_diagram(true),
        )
        .await;

    assert_eq!(response.status, ResponseStatus::Failed);
    assert_eq!(response.error.as_ref().map(|e| e.kind), Some(ErrorKind::FilterGenerationError));
    assert!(response.diagram.is_none());
    assert!(response.content.is_none());
    harness.assert_cleaned(&response);
}
