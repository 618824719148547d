//! Repository URL normalization and ref classification

use crate::error::FetchError;
use crate::utils::repo_name_from_url;
use reqwest::Url;
use serde::Serialize;
use std::path::Path;

/// Which revision to materialize. `None` on a [`RepoSource`] means the
/// remote's default branch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "name", rename_all = "snake_case")]
pub enum GitRef {
    Branch(String),
    Commit(String),
}

impl GitRef {
    /// A full 40-character hex id is a commit, anything else a branch or tag.
    pub fn classify(reference: &str) -> Self {
        if reference.len() == 40 && reference.chars().all(|c| c.is_ascii_hexdigit()) {
            GitRef::Commit(reference.to_ascii_lowercase())
        } else {
            GitRef::Branch(reference.to_string())
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            GitRef::Branch(name) | GitRef::Commit(name) => name,
        }
    }
}

/// A normalized, clonable repository location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RepoSource {
    pub url: String,
    pub name: String,
    pub reference: Option<GitRef>,
}

impl RepoSource {
    /// Normalize user input into a clone URL.
    ///
    /// Accepts `owner/repo`-style host paths with or without a scheme,
    /// percent-encoded input, browser URLs pointing into a tree or blob
    /// (`/owner/repo/tree/<ref>/...`), SSH remotes, and local paths or
    /// `file://` URLs. An explicit `reference` wins over one embedded in the
    /// URL.
    pub fn parse(input: &str, reference: Option<&str>) -> Result<Self, FetchError> {
        let raw = input.split_whitespace().next().unwrap_or("");
        if raw.is_empty() {
            return Err(FetchError::InvalidUrl(input.to_string()));
        }
        let explicit = reference.map(str::trim).filter(|r| !r.is_empty()).map(GitRef::classify);

        if raw.starts_with("file://") || Path::new(raw).is_absolute() {
            let url = raw.trim_end_matches('/').to_string();
            return Ok(Self { name: repo_name_from_url(&url), url, reference: explicit });
        }
        if raw.starts_with("git@") {
            let url = raw.trim_end_matches('/').to_string();
            return Ok(Self { name: repo_name_from_url(&url), url, reference: explicit });
        }

        let decoded = urlencoding::decode(raw)
            .map_err(|_| FetchError::InvalidUrl(input.to_string()))?
            .into_owned();
        let with_scheme =
            if decoded.contains("://") { decoded } else { format!("https://{decoded}") };

        let parsed =
            Url::parse(&with_scheme).map_err(|_| FetchError::InvalidUrl(input.to_string()))?;
        if !matches!(parsed.scheme(), "http" | "https" | "ssh" | "git") {
            return Err(FetchError::InvalidUrl(input.to_string()));
        }
        let host = parsed.host_str().ok_or_else(|| FetchError::InvalidUrl(input.to_string()))?;

        let segments: Vec<&str> =
            parsed.path_segments().map(|s| s.filter(|p| !p.is_empty()).collect()).unwrap_or_default();
        if segments.is_empty() {
            return Err(FetchError::InvalidUrl(input.to_string()));
        }

        let mut embedded = None;
        let url = if segments.len() >= 4 && matches!(segments[2], "tree" | "blob") {
            let branch = segments[3];
            if branch != "main" && branch != "master" {
                embedded = Some(GitRef::classify(branch));
            }
            let port = parsed.port().map(|p| format!(":{p}")).unwrap_or_default();
            format!("{}://{host}{port}/{}/{}", parsed.scheme(), segments[0], segments[1])
        } else {
            with_scheme.trim_end_matches('/').to_string()
        };

        let url = normalize_github_url(&url, host);
        Ok(Self { name: repo_name_from_url(&url), url, reference: explicit.or(embedded) })
    }
}

/// GitHub remotes are cloned through their canonical `.git` form.
fn normalize_github_url(url: &str, host: &str) -> String {
    if host.eq_ignore_ascii_case("github.com") && !url.ends_with(".git") {
        format!("{url}.git")
    } else {
        url.to_string()
    }
}
