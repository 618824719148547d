//! Path normalization

use std::path::{Component, Path};

/// Forward-slash relative path for a file under `root`, or `None` when the
/// path is outside `root` or not valid UTF-8.
pub fn relative_slash_path(root: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    let mut parts = Vec::new();
    for component in rel.components() {
        match component {
            Component::Normal(part) => parts.push(part.to_str()?),
            _ => return None,
        }
    }
    Some(parts.join("/"))
}

/// Repository name from a URL or path: last segment without `.git`.
pub fn repo_name_from_url(url: &str) -> String {
    let trimmed = url.trim_end_matches('/');
    let last = trimmed.rsplit(['/', '\\', ':']).next().unwrap_or(trimmed);
    let name = last.strip_suffix(".git").unwrap_or(last);
    // The name becomes a directory under the workspace; dot-only names would escape it.
    if name.is_empty() || name.chars().all(|c| c == '.') {
        "repository".to_string()
    } else {
        name.to_string()
    }
}
