//! repo-prompt: turn a remote repository into a prompt-ready text bundle
//!
//! Clones a repository, narrows it down with explicit globs or a
//! natural-language query, and prints the extracted content as JSON or text.

use anyhow::Result;

mod cli;

fn main() -> Result<()> {
    // A missing .env is fine; variables may come from the environment.
    let _ = dotenvy::dotenv();
    cli::run()
}
