//! Config file loading

use crate::config::Settings;
use anyhow::{Context, Result};
use figment::providers::{Env, Serialized};
use figment::Figment;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};

const ENV_PREFIX: &str = "REPO_PROMPT_";
const OPENAI_DEFAULT_BASE: &str = "https://api.openai.com/v1";

/// Load settings with precedence env > config file > defaults.
///
/// An explicit `config_path` must parse; an auto-discovered file that fails to
/// parse is reported and ignored.
pub fn load_config(work_dir: &Path, config_path: Option<&Path>) -> Result<Settings> {
    let explicit = config_path.is_some();
    let discovered = match config_path {
        Some(path) => Some(path.to_path_buf()),
        None => discover_config(work_dir),
    };

    let mut figment = Figment::from(Serialized::defaults(Settings::default()));

    if let Some(config_file) = discovered {
        match read_file_layer(&config_file) {
            Ok(layer) => figment = figment.merge(Serialized::globals(layer)),
            Err(e) if explicit => return Err(e),
            Err(e) => {
                tracing::warn!(
                    "Failed to parse auto-discovered config {}: {:#}",
                    config_file.display(),
                    e
                );
            }
        }
    }

    let mut settings: Settings = figment
        .merge(Env::prefixed(ENV_PREFIX).split("__"))
        .extract()
        .context("Invalid configuration")?;

    apply_credential_fallback(&mut settings);
    Ok(settings)
}

/// Parse a TOML or YAML file into a layer, supporting a nested
/// `[repo-prompt]` section. The layer must deserialize into [`Settings`].
fn read_file_layer(config_file: &Path) -> Result<Value> {
    let content = fs::read_to_string(config_file)
        .with_context(|| format!("Failed reading config file: {}", config_file.display()))?;

    let ext = config_file.extension().and_then(|e| e.to_str()).unwrap_or("").to_ascii_lowercase();

    let raw: Value = match ext.as_str() {
        "toml" => {
            let parsed: toml::Value = toml::from_str(&content)
                .with_context(|| format!("Invalid TOML syntax: {}", config_file.display()))?;
            serde_json::to_value(parsed)?
        }
        "yaml" | "yml" => {
            let parsed: serde_yaml::Value = serde_yaml::from_str(&content)
                .with_context(|| format!("Invalid YAML syntax: {}", config_file.display()))?;
            serde_json::to_value(parsed)?
        }
        other => anyhow::bail!(
            "Unsupported config extension '.{}' for file {}",
            other,
            config_file.display()
        ),
    };

    let layer = match raw.get("repo-prompt") {
        Some(nested) => nested.clone(),
        None => raw,
    };

    Figment::from(Serialized::defaults(Settings::default()))
        .merge(Serialized::globals(layer.clone()))
        .extract::<Settings>()
        .with_context(|| format!("Invalid config: {}", config_file.display()))?;

    Ok(layer)
}

/// Credentials may also come from `OPENAI_API_KEY_<PROVIDER>` and
/// `OPENAI_API_BASE_<PROVIDER>`.
fn apply_credential_fallback(settings: &mut Settings) {
    let provider = settings.llm.provider.to_ascii_uppercase();
    if settings.llm.api_key.is_none() {
        settings.llm.api_key = std::env::var(format!("OPENAI_API_KEY_{provider}")).ok();
    }
    if settings.llm.api_base.is_none() {
        settings.llm.api_base = std::env::var(format!("OPENAI_API_BASE_{provider}")).ok();
    }
    if settings.llm.api_base.is_none() && provider == "OPENAI" {
        settings.llm.api_base = Some(OPENAI_DEFAULT_BASE.to_string());
    }
}

fn discover_config(work_dir: &Path) -> Option<PathBuf> {
    let candidates = [
        "repo-prompt.toml",
        ".repo-prompt.toml",
        "repo-prompt.yml",
        ".repo-prompt.yml",
        "repo-prompt.yaml",
        ".repo-prompt.yaml",
    ];

    candidates.iter().map(|candidate| work_dir.join(candidate)).find(|path| path.exists())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DiagramMode;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_load_config_defaults_when_missing() {
        let tmp = TempDir::new().expect("tmp");
        let cfg = load_config(tmp.path(), None).expect("config");
        assert_eq!(cfg.default_max_file_size, Settings::default().default_max_file_size);
        assert_eq!(cfg.scan.max_files, 10_000);
    }

    #[test]
    fn test_load_toml_config() {
        let tmp = TempDir::new().expect("tmp");
        fs::write(
            tmp.path().join("repo-prompt.toml"),
            "default_max_file_size = 999\n[scan]\nmax_files = 5\n[diagram]\nmode = 'template'\n",
        )
        .expect("write");

        let cfg = load_config(tmp.path(), None).expect("config");
        assert_eq!(cfg.default_max_file_size, 999);
        assert_eq!(cfg.scan.max_files, 5);
        assert_eq!(cfg.scan.max_depth, 20, "unset keys keep their defaults");
        assert_eq!(cfg.diagram.mode, DiagramMode::Template);
    }

    #[test]
    fn test_nested_section_is_used() {
        let tmp = TempDir::new().expect("tmp");
        let path = tmp.path().join("custom.toml");
        fs::write(&path, "[repo-prompt]\nmax_output_bytes = 1234\n").expect("write");

        let cfg = load_config(tmp.path(), Some(&path)).expect("config");
        assert_eq!(cfg.max_output_bytes, 1234);
    }

    #[test]
    fn test_load_yaml_config() {
        let tmp = TempDir::new().expect("tmp");
        let path = tmp.path().join("settings.yml");
        fs::write(&path, "llm:\n  model: gpt-4o-mini\n  max_attempts: 3\n").expect("write");

        let cfg = load_config(tmp.path(), Some(&path)).expect("config");
        assert_eq!(cfg.llm.model, "gpt-4o-mini");
        assert_eq!(cfg.llm.max_attempts, 3);
    }

    #[test]
    fn test_explicit_config_invalid_type_returns_err() {
        let tmp = TempDir::new().expect("tmp");
        let path = tmp.path().join("bad.toml");
        fs::write(&path, "default_max_file_size = 'large'\n").expect("write");

        assert!(load_config(tmp.path(), Some(&path)).is_err());
    }

    #[test]
    fn test_explicit_config_unsupported_extension_returns_err() {
        let tmp = TempDir::new().expect("tmp");
        let path = tmp.path().join("config.ini");
        fs::write(&path, "x=1\n").expect("write");

        assert!(load_config(tmp.path(), Some(&path)).is_err());
    }

    #[test]
    fn test_auto_discovered_invalid_config_returns_default() {
        let tmp = TempDir::new().expect("tmp");
        fs::write(tmp.path().join("repo-prompt.toml"), "[scan]\nmax_files = 'many'\n")
            .expect("write");

        let cfg = load_config(tmp.path(), None).expect("should not error on auto-discovery");
        assert_eq!(cfg.scan.max_files, crate::config::ScanSettings::default().max_files);
    }
}
