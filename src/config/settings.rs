//! Settings schema and defaults.

use crate::domain::DEFAULT_MAX_FILE_SIZE;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Parent of every per-request workspace directory.
    pub tmp_base_path: PathBuf,
    /// Per-file cap used when a request carries no override.
    pub default_max_file_size: u64,
    /// Cap on the total bytes of file content placed in one response.
    pub max_output_bytes: u64,
    pub fetch: FetchSettings,
    pub scan: ScanSettings,
    pub llm: LlmSettings,
    pub diagram: DiagramSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            tmp_base_path: std::env::temp_dir().join("repo-prompt"),
            default_max_file_size: DEFAULT_MAX_FILE_SIZE,
            max_output_bytes: 10 * 1024 * 1024,
            fetch: FetchSettings::default(),
            scan: ScanSettings::default(),
            llm: LlmSettings::default(),
            diagram: DiagramSettings::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchSettings {
    pub clone_timeout_ms: u64,
    /// Abort the clone once this many bytes have been received.
    pub max_clone_bytes: u64,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self { clone_timeout_ms: 20_000, max_clone_bytes: 500 * 1024 * 1024 }
    }
}

impl FetchSettings {
    pub fn clone_timeout(&self) -> Duration {
        Duration::from_millis(self.clone_timeout_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanSettings {
    pub max_files: usize,
    pub max_depth: usize,
    pub max_total_bytes: u64,
    /// Directory names never descended into.
    pub ignored_dirs: Vec<String>,
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self {
            max_files: 10_000,
            max_depth: 20,
            max_total_bytes: 500 * 1024 * 1024,
            ignored_dirs: vec![".git".to_string()],
        }
    }
}

#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    /// Provider name; selects the `OPENAI_API_KEY_<PROVIDER>` fallback variables.
    pub provider: String,
    pub model: String,
    pub api_base: Option<String>,
    pub api_key: Option<String>,
    pub temperature: f32,
    pub timeout_ms: u64,
    pub max_attempts: u32,
    /// Upper bound on the repository structure text placed in a prompt.
    pub prompt_budget_chars: usize,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            model: "gpt-4".to_string(),
            api_base: None,
            api_key: None,
            temperature: 0.1,
            timeout_ms: 60_000,
            max_attempts: 2,
            prompt_budget_chars: 24_000,
        }
    }
}

impl LlmSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.as_deref().is_some_and(|k| !k.is_empty())
            && self.api_base.as_deref().is_some_and(|b| !b.is_empty())
    }
}

impl std::fmt::Debug for LlmSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmSettings")
            .field("provider", &self.provider)
            .field("model", &self.model)
            .field("api_base", &self.api_base)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("temperature", &self.temperature)
            .field("timeout_ms", &self.timeout_ms)
            .field("max_attempts", &self.max_attempts)
            .field("prompt_budget_chars", &self.prompt_budget_chars)
            .finish()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagramMode {
    #[default]
    Llm,
    Template,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiagramSettings {
    pub mode: DiagramMode,
    /// Directory levels drawn by the template renderer.
    pub template_depth: usize,
}

impl Default for DiagramSettings {
    fn default() -> Self {
        Self { mode: DiagramMode::Llm, template_depth: 2 }
    }
}
