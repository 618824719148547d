//! Analyze command implementation

use anyhow::{Context, Result};
use clap::{Args, ValueEnum};
use std::path::PathBuf;
use std::sync::Arc;

use super::utils::{load_settings, parse_csv};
use repo_prompt::domain::{AnalysisRequest, PatternType};
use repo_prompt::render::response_text;
use repo_prompt::Orchestrator;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Full response as pretty-printed JSON
    #[default]
    Json,
    /// Summary, tree, diagram and file contents as plain text
    Text,
}

#[derive(Args)]
pub struct AnalyzeArgs {
    /// Repository URL (GitHub tree/blob URLs are accepted)
    #[arg(value_name = "URL")]
    pub url: String,

    /// Natural-language description of the files to keep
    #[arg(short, long, value_name = "TEXT")]
    pub query: Option<String>,

    /// Fail instead of falling back to all files when the query cannot be applied
    #[arg(long, requires = "query")]
    pub require_query: bool,

    /// Include only paths matching these globs (comma-separated)
    #[arg(short = 'i', long, value_name = "GLOBS")]
    pub include: Option<String>,

    /// Exclude paths matching these globs (comma-separated)
    #[arg(short = 'e', long, value_name = "GLOBS")]
    pub exclude: Option<String>,

    /// Comma-separated globs interpreted according to --pattern-type
    #[arg(short = 'p', long, value_name = "GLOBS")]
    pub pattern: Option<String>,

    /// How --pattern is applied: include or exclude
    #[arg(long, value_name = "TYPE", default_value = "exclude")]
    pub pattern_type: PatternType,

    /// Also produce a Mermaid architecture diagram
    #[arg(short, long)]
    pub diagram: bool,

    /// Skip files larger than this (bytes)
    #[arg(long, value_name = "BYTES")]
    pub max_file_size: Option<u64>,

    /// Branch, tag or commit to check out
    #[arg(long = "ref", value_name = "REF")]
    pub reference: Option<String>,

    /// Path to config file (repo-prompt.toml or .repo-prompt.yml)
    #[arg(short = 'c', long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Json)]
    pub format: OutputFormat,

    /// Write the output to this file instead of stdout
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,
}

impl AnalyzeArgs {
    fn to_request(&self) -> AnalysisRequest {
        AnalysisRequest {
            url: self.url.clone(),
            reference: self.reference.clone(),
            query: self.query.clone(),
            require_query: self.require_query,
            include: parse_csv(&self.include),
            exclude: parse_csv(&self.exclude),
            pattern: self.pattern.clone(),
            pattern_type: self.pattern_type,
            diagram: self.diagram,
            max_file_size: self.max_file_size,
        }
    }
}

pub fn run(args: AnalyzeArgs) -> Result<()> {
    let settings = Arc::new(load_settings(args.config.as_deref())?);
    tracing::debug!(?settings, "settings loaded");

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed starting async runtime")?;

    let orchestrator = Orchestrator::from_settings(settings);
    let response = runtime.block_on(orchestrator.run(args.to_request()));

    let rendered = match args.format {
        OutputFormat::Json => {
            serde_json::to_string_pretty(&response).context("Failed serializing response")?
        }
        OutputFormat::Text => response_text(&response),
    };

    match &args.output {
        Some(path) => {
            std::fs::write(path, rendered.as_bytes())
                .with_context(|| format!("Failed writing output to {}", path.display()))?;
            eprintln!("Wrote {}", path.display());
        }
        None => println!("{rendered}"),
    }

    if response.is_failed() {
        let message = response.error.as_ref().map(|e| e.message.as_str()).unwrap_or("unknown error");
        anyhow::bail!("Analysis failed: {}", message);
    }
    Ok(())
}
