//! Error taxonomy for every stage of an analysis run.

use crate::domain::{ErrorDetail, ErrorKind, Stage};
use std::io;
use std::path::PathBuf;
use std::time::Duration;

/// Cloning the repository failed.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("Invalid repository URL '{0}'")]
    InvalidUrl(String),

    #[error("Repository not found or not accessible at {url}: {message}")]
    Unreachable { url: String, message: String },

    #[error("Authentication rejected for {url}: {message}")]
    Auth { url: String, message: String },

    #[error("Reference '{reference}' not found in {url}")]
    RefNotFound { url: String, reference: String },

    #[error("Clone exceeded the size budget of {limit} bytes")]
    TooLarge { limit: u64 },

    #[error("Clone timed out after {0:?}")]
    Timeout(Duration),

    #[error("Failed preparing local storage at {}: {source}", path.display())]
    Storage {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Git operation failed: {0}")]
    Git(String),
}

/// The snapshot could not be turned into a structure summary.
#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    #[error("Snapshot root is not a directory: {}", .0.display())]
    NotADirectory(PathBuf),

    #[error("No files found in {}", .0.display())]
    Empty(PathBuf),

    #[error("Failed walking {}: {message}", path.display())]
    Walk { path: PathBuf, message: String },
}

/// A language-model call failed after its retry budget.
#[derive(Debug, Clone, thiserror::Error)]
pub enum LlmError {
    #[error("Language model is not configured: {0}")]
    NotConfigured(String),

    #[error("Language model call timed out after {0:?}")]
    Timeout(Duration),

    #[error("Language model transport error: {0}")]
    Transport(String),

    #[error("Language model returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Language model returned an empty response")]
    Empty,

    #[error("Language model returned an unusable response: {0}")]
    Malformed(String),
}

impl LlmError {
    /// Whether another attempt could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            LlmError::NotConfigured(_) => false,
            LlmError::Status { status, .. } => *status == 429 || *status >= 500,
            LlmError::Timeout(_) | LlmError::Transport(_) | LlmError::Empty | LlmError::Malformed(_) => {
                true
            }
        }
    }
}

impl From<reqwest::Error> for LlmError {
    fn from(err: reqwest::Error) -> Self {
        LlmError::Transport(err.to_string())
    }
}

/// The natural-language query could not be turned into filters.
#[derive(Debug, thiserror::Error)]
pub enum FilterGenerationError {
    #[error(transparent)]
    Llm(#[from] LlmError),
}

/// Extraction could not start. Per-file read failures are not errors; they
/// are reported in [`crate::domain::ExtractionResult::errors`].
#[derive(Debug, thiserror::Error)]
pub enum ExtractionError {
    #[error("Invalid filter pattern: {0}")]
    InvalidFilter(#[from] globset::Error),
}

/// Diagram generation failed. Never fatal to a run.
#[derive(Debug, thiserror::Error)]
pub enum DiagramError {
    #[error(transparent)]
    Llm(#[from] LlmError),

    #[error("Repository structure is empty")]
    EmptyStructure,
}

/// A failure that ends a run without usable output.
#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Analysis(#[from] AnalysisError),

    #[error("Filter generation failed for a required query: {0}")]
    FilterGeneration(#[from] FilterGenerationError),

    #[error(transparent)]
    Extraction(#[from] ExtractionError),
}

impl WorkflowError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            WorkflowError::InvalidRequest(_) => ErrorKind::InvalidRequest,
            WorkflowError::Fetch(_) => ErrorKind::FetchError,
            WorkflowError::Analysis(_) => ErrorKind::AnalysisError,
            WorkflowError::FilterGeneration(_) => ErrorKind::FilterGenerationError,
            WorkflowError::Extraction(_) => ErrorKind::ExtractionError,
        }
    }

    pub fn stage(&self) -> Option<Stage> {
        match self {
            WorkflowError::InvalidRequest(_) => None,
            WorkflowError::Fetch(_) => Some(Stage::Fetch),
            WorkflowError::Analysis(_) => Some(Stage::Analyze),
            WorkflowError::FilterGeneration(_) => Some(Stage::GenerateFilters),
            WorkflowError::Extraction(_) => Some(Stage::ExtractContent),
        }
    }

    pub fn detail(&self) -> ErrorDetail {
        ErrorDetail { kind: self.kind(), stage: self.stage(), message: self.to_string() }
    }
}
