//! Architecture diagram generation (Mermaid)

use crate::config::{DiagramMode, Settings};
use crate::domain::{DiagramResult, DiagramSource, StructureSummary};
use crate::error::{DiagramError, LlmError};
use crate::llm::{complete_with_retry, parse_json_object, LanguageModel, RetryPolicy};
use crate::scan::render_tree_within;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use std::collections::{BTreeMap, HashSet};
use std::fmt::Write as _;
use std::sync::Arc;

const SYSTEM_PROMPT: &str = r#"You draw system design diagrams of software repositories with Mermaid.

From the directory structure, identify the main components (applications,
services, libraries, configuration, build and deployment) and how they relate.
Draw a vertical flowchart (`graph TD`) with short, clear labels and an edge
for each important dependency or data flow.

Respond with a single JSON object and nothing else:
{"diagram": "<Mermaid source>", "explanation": "<two or three sentences>"}"#;

static EDGE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"<?(?:-->|---|-\.->|-\.-|==>|===|--o|--x)").expect("valid edge regex")
});
static NODE_ID_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([A-Za-z0-9_][A-Za-z0-9_]*)").expect("valid node id regex"));
static EDGE_LABEL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\|[^|]*\|").expect("valid edge label regex"));

const HEADERS: &[&str] =
    &["graph", "flowchart", "sequenceDiagram", "classDiagram", "stateDiagram", "erDiagram"];
const STATEMENTS: &[&str] =
    &["subgraph", "end", "style", "classDef", "class", "click", "linkStyle", "direction"];

#[derive(Deserialize)]
struct DiagramAnswer {
    diagram: String,
    #[serde(default)]
    explanation: String,
}

pub struct DiagramGenerator {
    mode: DiagramMode,
    template_depth: usize,
    model: Option<Arc<dyn LanguageModel>>,
    policy: RetryPolicy,
    prompt_budget: usize,
}

impl DiagramGenerator {
    pub fn new(settings: &Settings, model: Option<Arc<dyn LanguageModel>>) -> Self {
        Self {
            mode: settings.diagram.mode,
            template_depth: settings.diagram.template_depth.max(1),
            model,
            policy: RetryPolicy::from_settings(&settings.llm),
            prompt_budget: settings.llm.prompt_budget_chars,
        }
    }

    pub async fn generate(&self, summary: &StructureSummary) -> Result<DiagramResult, DiagramError> {
        if summary.files.is_empty() {
            return Err(DiagramError::EmptyStructure);
        }
        match self.mode {
            DiagramMode::Template => Ok(template_diagram(summary, self.template_depth)),
            DiagramMode::Llm => self.generate_with_model(summary).await,
        }
    }

    async fn generate_with_model(
        &self,
        summary: &StructureSummary,
    ) -> Result<DiagramResult, DiagramError> {
        let model = self
            .model
            .as_ref()
            .ok_or_else(|| LlmError::NotConfigured("no language model available".to_string()))?;

        let prompt = format!(
            "Repository: {}\n\nDirectory structure:\n```\n{}\n```\n",
            summary.root_name,
            render_tree_within(summary, self.prompt_budget)
        );
        let result =
            complete_with_retry(model.as_ref(), self.policy, SYSTEM_PROMPT, &prompt, parse_answer)
                .await?;
        tracing::info!(nodes = result.nodes, edges = result.edges, "diagram generated");
        Ok(result)
    }
}

fn parse_answer(text: &str) -> Result<DiagramResult, String> {
    let answer: DiagramAnswer = parse_json_object(text)?;
    let diagram = strip_fence(&answer.diagram).trim().to_string();

    let header = diagram.lines().map(str::trim).find(|l| !l.is_empty()).unwrap_or("");
    if !HEADERS.iter().any(|h| header.starts_with(h)) {
        return Err("diagram is not Mermaid source".to_string());
    }
    let (nodes, edges) = count_graph(&diagram);
    if nodes == 0 {
        return Err("diagram has no nodes".to_string());
    }

    let explanation = Some(answer.explanation.trim().to_string()).filter(|e| !e.is_empty());
    Ok(DiagramResult { diagram, explanation, nodes, edges, source: DiagramSource::Llm })
}

fn strip_fence(diagram: &str) -> &str {
    let trimmed = diagram.trim();
    match trimmed.strip_prefix("```") {
        Some(rest) => {
            let body = rest.split_once('\n').map(|(_, body)| body).unwrap_or("");
            body.trim_end().strip_suffix("```").unwrap_or(body)
        }
        None => trimmed,
    }
}

/// Count distinct node ids and edges in Mermaid flowchart source.
pub fn count_graph(diagram: &str) -> (usize, usize) {
    let mut nodes = HashSet::new();
    let mut edges = 0;

    for line in diagram.lines().map(str::trim) {
        if line.is_empty() || line.starts_with("%%") {
            continue;
        }
        let first_word = line.split_whitespace().next().unwrap_or("");
        if HEADERS.contains(&first_word) || STATEMENTS.contains(&first_word) {
            continue;
        }

        edges += EDGE_RE.find_iter(line).count();
        for segment in EDGE_RE.split(line) {
            let segment = segment.trim();
            let segment = EDGE_LABEL_RE.find(segment).map_or(segment, |m| segment[m.end()..].trim());
            for part in segment.split('&') {
                if let Some(id) = NODE_ID_RE.captures(part.trim()).and_then(|c| c.get(1)) {
                    nodes.insert(id.as_str().to_string());
                }
            }
        }
    }

    (nodes.len(), edges)
}

/// Deterministic diagram: the root, then directories down to `depth`
/// levels, each labelled with its file count.
pub fn template_diagram(summary: &StructureSummary, depth: usize) -> DiagramResult {
    let mut dirs: BTreeMap<String, usize> = BTreeMap::new();
    for file in &summary.files {
        let segments: Vec<&str> = file.directory().split('/').filter(|s| !s.is_empty()).collect();
        for level in 1..=segments.len().min(depth) {
            *dirs.entry(segments[..level].join("/")).or_insert(0) += 1;
        }
    }

    let mut ids: BTreeMap<&str, String> = BTreeMap::new();
    let mut out = String::from("graph TD\n");
    let _ = writeln!(out, "    n0[\"{}\"]", label(&summary.root_name, summary.files.len()));

    let mut edges = 0;
    for (idx, (dir, count)) in dirs.iter().enumerate() {
        let id = format!("n{}", idx + 1);
        let name = dir.rsplit_once('/').map_or(dir.as_str(), |(_, name)| name);
        let parent = dir
            .rsplit_once('/')
            .and_then(|(parent, _)| ids.get(parent).cloned())
            .unwrap_or_else(|| "n0".to_string());
        let _ = writeln!(out, "    {id}[\"{}\"]", label(&format!("{name}/"), *count));
        let _ = writeln!(out, "    {parent} --> {id}");
        edges += 1;
        ids.insert(dir.as_str(), id);
    }

    DiagramResult {
        diagram: out.trim_end().to_string(),
        explanation: Some(format!(
            "Directory layout of {} down to {depth} level(s), with file counts.",
            summary.root_name
        )),
        nodes: dirs.len() + 1,
        edges,
        source: DiagramSource::Template,
    }
}

fn label(name: &str, files: usize) -> String {
    let noun = if files == 1 { "file" } else { "files" };
    format!("{} ({files} {noun})", name.replace('"', "#quot;"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::FileRecord;
    use crate::llm::MockLanguageModel;

    fn summary() -> StructureSummary {
        StructureSummary::new(
            "demo",
            vec![
                FileRecord::new("README.md", 1, false),
                FileRecord::new("src/main.rs", 1, false),
                FileRecord::new("src/api/routes.rs", 1, false),
                FileRecord::new("src/api/v1/users.rs", 1, false),
                FileRecord::new("docs/guide.md", 1, false),
            ],
            Vec::new(),
        )
    }

    fn settings(mode: DiagramMode) -> Settings {
        let mut settings = Settings::default();
        settings.diagram.mode = mode;
        settings
    }

    #[test]
    fn template_links_directories() {
        let result = template_diagram(&summary(), 2);
        let expected = "\
graph TD
    n0[\"demo (5 files)\"]
    n1[\"docs/ (1 file)\"]
    n0 --> n1
    n2[\"src/ (3 files)\"]
    n0 --> n2
    n3[\"api/ (2 files)\"]
    n2 --> n3";
        assert_eq!(result.diagram, expected);
        assert_eq!((result.nodes, result.edges), (4, 3));
        assert_eq!(count_graph(&result.diagram), (4, 3));
        assert_eq!(result.source, DiagramSource::Template);
    }

    #[test]
    fn counts_labelled_edges_and_shapes() {
        let mermaid = "graph TD\n  %% comment\n  A[Client] -->|HTTP| B(API)\n  B --> C{DB} & D\n  subgraph core\n  C -.-> A\n  end\n  click A \"https://example.com\"";
        assert_eq!(count_graph(mermaid), (4, 3));
    }

    #[tokio::test]
    async fn llm_answer_is_parsed() {
        let mut model = MockLanguageModel::new();
        model.expect_complete().times(1).returning(|_, _| {
            Ok(r#"{"diagram": "```mermaid\ngraph TD\n  A[CLI] --> B[Core]\n```", "explanation": "Two parts."}"#.into())
        });
        let generator = DiagramGenerator::new(&settings(DiagramMode::Llm), Some(Arc::new(model)));

        let result = generator.generate(&summary()).await.unwrap();
        assert_eq!(result.diagram, "graph TD\n  A[CLI] --> B[Core]");
        assert_eq!((result.nodes, result.edges), (2, 1));
        assert_eq!(result.explanation.as_deref(), Some("Two parts."));
        assert_eq!(result.source, DiagramSource::Llm);
    }

    #[tokio::test]
    async fn non_mermaid_answer_fails() {
        let mut model = MockLanguageModel::new();
        model
            .expect_complete()
            .times(2)
            .returning(|_, _| Ok(r#"{"diagram": "a picture of boxes"}"#.into()));
        let generator = DiagramGenerator::new(&settings(DiagramMode::Llm), Some(Arc::new(model)));

        let err = generator.generate(&summary()).await.unwrap_err();
        assert!(matches!(err, DiagramError::Llm(LlmError::Malformed(_))));
    }

    #[tokio::test]
    async fn missing_model_fails_in_llm_mode() {
        let generator = DiagramGenerator::new(&settings(DiagramMode::Llm), None);
        let err = generator.generate(&summary()).await.unwrap_err();
        assert!(matches!(err, DiagramError::Llm(LlmError::NotConfigured(_))));
    }

    #[tokio::test]
    async fn template_mode_needs_no_model() {
        let generator = DiagramGenerator::new(&settings(DiagramMode::Template), None);
        let result = generator.generate(&summary()).await.unwrap();
        assert_eq!(result.source, DiagramSource::Template);
    }
}
