//! Info command implementation

use anyhow::Result;
use clap::Args;
use std::path::PathBuf;

use super::utils::load_settings;
use repo_prompt::scan::{render_tree, StructureAnalyzer};
use repo_prompt::utils::format_with_commas;

#[derive(Args)]
pub struct InfoArgs {
    /// Local directory path to analyze
    #[arg(value_name = "PATH")]
    pub path: PathBuf,

    /// Path to config file (repo-prompt.toml or .repo-prompt.yml)
    #[arg(short = 'c', long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Stop after this many files
    #[arg(long, value_name = "N")]
    pub max_files: Option<usize>,

    /// Tree depth to print
    #[arg(long, value_name = "DEPTH", default_value_t = 4)]
    pub tree_depth: usize,
}

pub fn run(args: InfoArgs) -> Result<()> {
    let root = args.path.canonicalize()?;
    if !root.is_dir() {
        anyhow::bail!("Path is not a directory: {}", root.display());
    }

    let mut settings = load_settings(args.config.as_deref())?;
    if let Some(max_files) = args.max_files {
        settings.scan.max_files = max_files;
    }

    // Repository name is just the directory name
    let repo_name = root.file_name().and_then(|n| n.to_str()).unwrap_or("repository");
    let summary = StructureAnalyzer::new(settings.scan).analyze_dir(&root, repo_name)?;

    println!("Repository: {}", repo_name);
    println!("Statistics:");
    println!("  Files: {}", format_with_commas(summary.stats.files as u64));
    println!("  Directories: {}", format_with_commas(summary.stats.directories as u64));
    println!("  Binary files: {}", format_with_commas(summary.stats.binary_files as u64));
    println!("  Total bytes: {}", format_with_commas(summary.stats.total_bytes));
    for reason in &summary.truncation {
        println!("  Truncated: {reason}");
    }

    println!("\n{}", render_tree(&summary, Some(args.tree_depth)));
    Ok(())
}
