//! Shared CLI utilities.

use anyhow::{Context, Result};
use repo_prompt::config::{load_config, Settings};
use std::path::Path;

/// Parse a comma-separated string into a `Vec<String>`, trimming whitespace and
/// discarding empty segments. Returns an empty list when `value` is `None`.
pub fn parse_csv(value: &Option<String>) -> Vec<String> {
    value
        .as_ref()
        .map(|s| {
            s.split(',')
                .map(str::trim)
                .filter(|part| !part.is_empty())
                .map(|part| part.to_string())
                .collect::<Vec<_>>()
        })
        .unwrap_or_default()
}

/// Load settings relative to the current directory.
pub fn load_settings(config: Option<&Path>) -> Result<Settings> {
    let work_dir = std::env::current_dir().context("Failed reading current directory")?;
    load_config(&work_dir, config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_csv_trims_and_drops_empty() {
        assert_eq!(parse_csv(&Some(" a, ,b ,".to_string())), vec!["a", "b"]);
        assert!(parse_csv(&None).is_empty());
    }
}
