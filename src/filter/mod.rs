//! Query-to-filter generation and pattern validation
//!
//! The generator shows the model a bounded rendering of the repository tree
//! and asks for include/exclude globs. Whatever comes back is sanitized
//! before it can reach the extractor.

use crate::config::LlmSettings;
use crate::domain::{FilterOrigin, FilterSpec, PatternType, StructureSummary};
use crate::error::FilterGenerationError;
use crate::llm::{complete_with_retry, parse_json_object, LanguageModel, RetryPolicy};
use crate::scan::render_tree_within;
use crate::utils::format_with_commas;
use serde::Deserialize;
use std::sync::Arc;

pub mod validate;

pub use validate::{normalize_pattern, sanitize_patterns, RejectedPattern, SanitizedPatterns};

const SYSTEM_PROMPT: &str = r#"You select files from a Git repository for a reader with a specific question.

Given the repository tree and the reader's request, answer with glob patterns
relative to the repository root:
- "include": files the reader needs; leave empty to start from every file
- "exclude": files to drop; exclusion always wins over inclusion

Pattern rules:
- `*` matches any characters including `/`; `dir/**` selects a whole directory
- a pattern without `/` (such as `*.py`) also matches file names at any depth
- never use absolute paths, `~`, or `..`
- do not prefix patterns with the repository name

Prefer the fewest patterns that cover the request. When the tree does not
make the location obvious, prefer broader patterns so relevant code is not
missed.

Respond with a single JSON object and nothing else:
{"include": ["..."], "exclude": ["..."], "explanation": "one sentence"}"#;

/// The two answer shapes the generator accepts.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum FilterAnswer {
    Typed {
        pattern_type: PatternType,
        patterns: Vec<String>,
        #[serde(default)]
        explanation: String,
    },
    Lists {
        #[serde(default)]
        include: Vec<String>,
        #[serde(default)]
        exclude: Vec<String>,
        #[serde(default)]
        explanation: String,
    },
}

/// A generated filter plus whatever the sanitizer dropped from the answer.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedFilter {
    pub spec: FilterSpec,
    pub rejected: Vec<RejectedPattern>,
}

pub struct FilterGenerator {
    model: Arc<dyn LanguageModel>,
    policy: RetryPolicy,
    prompt_budget: usize,
}

impl FilterGenerator {
    pub fn new(model: Arc<dyn LanguageModel>, settings: &LlmSettings) -> Self {
        Self {
            model,
            policy: RetryPolicy::from_settings(settings),
            prompt_budget: settings.prompt_budget_chars,
        }
    }

    /// Turn `query` into a filter for the given structure.
    pub async fn generate(
        &self,
        summary: &StructureSummary,
        query: &str,
        max_file_size: u64,
    ) -> Result<GeneratedFilter, FilterGenerationError> {
        let prompt = user_prompt(summary, query, self.prompt_budget);
        tracing::debug!(query, prompt_chars = prompt.len(), "generating filter patterns");

        let generated = complete_with_retry(
            self.model.as_ref(),
            self.policy,
            SYSTEM_PROMPT,
            &prompt,
            |text| parse_answer(text, max_file_size),
        )
        .await?;

        tracing::info!(
            include = ?generated.spec.include(),
            exclude = ?generated.spec.exclude(),
            rejected = generated.rejected.len(),
            "generated filter patterns"
        );
        Ok(generated)
    }
}

fn user_prompt(summary: &StructureSummary, query: &str, budget: usize) -> String {
    let tree = render_tree_within(summary, budget);
    format!(
        "Repository: {name}\nFiles: {files} in {dirs} directories\n\nDirectory structure:\n```\n{tree}\n```\n\nRequest:\n{query}\n",
        name = summary.root_name,
        files = format_with_commas(summary.stats.files as u64),
        dirs = format_with_commas(summary.stats.directories as u64),
        query = query.trim(),
    )
}

/// Parse and sanitize a model answer. Answers that leave no usable pattern
/// are rejected so the retry loop can ask again.
fn parse_answer(text: &str, max_file_size: u64) -> Result<GeneratedFilter, String> {
    let (include, exclude, explanation) = match parse_json_object::<FilterAnswer>(text)? {
        FilterAnswer::Typed { pattern_type: PatternType::Include, patterns, explanation } => {
            (patterns, Vec::new(), explanation)
        }
        FilterAnswer::Typed { pattern_type: PatternType::Exclude, patterns, explanation } => {
            (Vec::new(), patterns, explanation)
        }
        FilterAnswer::Lists { include, exclude, explanation } => (include, exclude, explanation),
    };

    let include = sanitize_patterns(&include);
    let exclude = sanitize_patterns(&exclude);
    if include.accepted.is_empty() && exclude.accepted.is_empty() {
        return Err("answer contained no usable patterns".to_string());
    }

    let mut rejected = include.rejected;
    rejected.extend(exclude.rejected);
    let spec = FilterSpec::new(include.accepted, exclude.accepted, max_file_size, FilterOrigin::Generated)
        .with_explanation(explanation);
    Ok(GeneratedFilter { spec, rejected })
}

/// Validate patterns supplied with the request.
///
/// Unlike generated patterns, a single unsafe explicit pattern rejects the
/// whole request.
pub fn explicit_filter(
    include: &[String],
    exclude: &[String],
    max_file_size: u64,
) -> Result<FilterSpec, Vec<RejectedPattern>> {
    let include = sanitize_patterns(include);
    let exclude = sanitize_patterns(exclude);
    let mut rejected = include.rejected;
    rejected.extend(exclude.rejected);
    if !rejected.is_empty() {
        return Err(rejected);
    }
    Ok(FilterSpec::new(include.accepted, exclude.accepted, max_file_size, FilterOrigin::Explicit))
}
