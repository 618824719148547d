//! Output rendering: file blocks, summary text, plain-text report

use crate::domain::{AnalysisResponse, FilterOrigin, FilterSpec};
use crate::utils::format_token_count;

/// Width of the `=` rules around each file header.
pub const SEPARATOR_WIDTH: usize = 48;

/// One file in the prompt bundle:
///
/// ```text
/// ================================================
/// File: src/main.rs
/// ================================================
/// <content>
///
/// ```
pub fn file_block(path: &str, content: &str) -> String {
    let rule = "=".repeat(SEPARATOR_WIDTH);
    format!("{rule}\nFile: {path}\n{rule}\n{content}\n\n")
}

/// Short human-readable header for the bundle.
pub fn summary_text(
    repository: &str,
    files_analyzed: usize,
    filter: Option<&FilterSpec>,
    estimated_tokens: usize,
) -> String {
    let mut lines =
        vec![format!("Repository: {repository}"), format!("Files analyzed: {files_analyzed}")];

    if let Some(filter) = filter {
        match filter.origin() {
            FilterOrigin::Explicit | FilterOrigin::Generated => {
                if filter.origin() == FilterOrigin::Generated {
                    lines.push("Patterns generated from query".to_string());
                }
                push_patterns(&mut lines, "Include patterns:", filter.include());
                push_patterns(&mut lines, "Exclude patterns:", filter.exclude());
            }
            FilterOrigin::Fallback => {
                lines.push("Query could not be applied; all files considered".to_string())
            }
            FilterOrigin::MatchAll => {}
        }
    }

    lines.push(format!("Estimated tokens: {}", format_token_count(estimated_tokens)));
    lines.join("\n")
}

fn push_patterns(lines: &mut Vec<String>, heading: &str, patterns: &[String]) {
    if patterns.is_empty() {
        return;
    }
    lines.push(heading.to_string());
    lines.extend(patterns.iter().map(|p| format!("  - {p}")));
}

/// Plain-text rendering of a response: summary, tree, diagram, content.
pub fn response_text(response: &AnalysisResponse) -> String {
    let mut out = String::new();
    if let Some(summary) = &response.summary {
        out.push_str(summary);
        out.push_str("\n\n");
    }
    if let Some(tree) = &response.tree {
        out.push_str("Directory structure:\n");
        out.push_str(tree);
        out.push_str("\n\n");
    }
    if let Some(diagram) = &response.diagram {
        out.push_str("```mermaid\n");
        out.push_str(diagram.diagram.trim_end());
        out.push_str("\n```\n\n");
    }
    if let Some(content) = &response.content {
        out.push_str(content);
    }
    for warning in &response.warnings {
        out.push_str(&format!("warning: {warning}\n"));
    }
    if let Some(error) = &response.error {
        out.push_str(&format!("error: {}\n", error.message));
    }
    out
}
