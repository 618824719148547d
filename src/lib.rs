//! repo-prompt: turn a remote repository into a prompt-ready text bundle
//!
//! A request clones a repository into a per-request workspace, analyzes its
//! structure, resolves a file filter (explicit globs, globs generated from a
//! natural-language query, or no filter at all), extracts the matching file
//! contents and optionally produces a Mermaid architecture diagram. The
//! [`workflow::Orchestrator`] sequences these stages and always removes the
//! workspace before returning.

pub mod config;
pub mod diagram;
pub mod domain;
pub mod error;
pub mod extract;
pub mod fetch;
pub mod filter;
pub mod llm;
pub mod render;
pub mod scan;
pub mod utils;
pub mod workflow;

pub use config::Settings;
pub use domain::{AnalysisRequest, AnalysisResponse, ResponseStatus};
pub use workflow::Orchestrator;
