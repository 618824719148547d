//! Pattern safety checks and normalization

use globset::Glob;
use serde::Serialize;
use std::collections::HashSet;

/// A pattern dropped during sanitizing, with the reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RejectedPattern {
    pub pattern: String,
    pub reason: String,
}

impl std::fmt::Display for RejectedPattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "'{}' ({})", self.pattern, self.reason)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SanitizedPatterns {
    pub accepted: Vec<String>,
    pub rejected: Vec<RejectedPattern>,
}

/// Normalize one pattern. `Ok(None)` means the pattern was blank.
///
/// Patterns are relative to the repository root: absolute paths, home
/// references, drive letters and `..` segments are refused. A leading `./`
/// is dropped and a trailing `/` widens to everything below (`src/` ->
/// `src/**`).
pub fn normalize_pattern(raw: &str) -> Result<Option<String>, String> {
    let mut pattern = raw.trim();
    while let Some(rest) = pattern.strip_prefix("./") {
        pattern = rest;
    }
    if pattern.is_empty() {
        return Ok(None);
    }

    if pattern.starts_with('/') || pattern.starts_with('\\') || pattern.starts_with('~') {
        return Err("absolute path".to_string());
    }
    let bytes = pattern.as_bytes();
    if bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':' {
        return Err("absolute path".to_string());
    }
    if pattern.split(['/', '\\']).any(|segment| segment == "..") {
        return Err("parent directory segment".to_string());
    }

    let normalized = match pattern.strip_suffix('/') {
        Some(dir) => format!("{}/**", dir.trim_end_matches('/')),
        None => pattern.to_string(),
    };

    Glob::new(&normalized).map_err(|e| format!("invalid glob: {}", e.kind()))?;
    Ok(Some(normalized))
}

/// Normalize a list, dropping blanks and duplicates while keeping order.
pub fn sanitize_patterns<I, S>(patterns: I) -> SanitizedPatterns
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = HashSet::new();
    let mut out = SanitizedPatterns::default();
    for raw in patterns {
        let raw = raw.as_ref();
        match normalize_pattern(raw) {
            Ok(Some(pattern)) => {
                if seen.insert(pattern.clone()) {
                    out.accepted.push(pattern);
                }
            }
            Ok(None) => {}
            Err(reason) => {
                out.rejected.push(RejectedPattern { pattern: raw.trim().to_string(), reason })
            }
        }
    }
    out
}
