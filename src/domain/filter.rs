//! Resolved file filter and its glob matcher.

use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::Serialize;

/// Where a [`FilterSpec`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterOrigin {
    /// Patterns supplied with the request.
    Explicit,
    /// Patterns produced by the filter generator from a query.
    Generated,
    /// No query and no patterns: everything under the size cap.
    MatchAll,
    /// Filter generation failed and the run degraded to match-all.
    Fallback,
}

/// Immutable include/exclude filter handed to the extractor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FilterSpec {
    include: Vec<String>,
    exclude: Vec<String>,
    max_file_size: u64,
    origin: FilterOrigin,
    #[serde(skip_serializing_if = "Option::is_none")]
    explanation: Option<String>,
}

impl FilterSpec {
    pub fn new(
        include: Vec<String>,
        exclude: Vec<String>,
        max_file_size: u64,
        origin: FilterOrigin,
    ) -> Self {
        Self { include, exclude, max_file_size, origin, explanation: None }
    }

    pub fn match_all(max_file_size: u64, origin: FilterOrigin) -> Self {
        Self::new(Vec::new(), Vec::new(), max_file_size, origin)
    }

    pub fn with_explanation(mut self, explanation: impl Into<String>) -> Self {
        let explanation = explanation.into();
        if !explanation.trim().is_empty() {
            self.explanation = Some(explanation);
        }
        self
    }

    pub fn include(&self) -> &[String] {
        &self.include
    }

    pub fn exclude(&self) -> &[String] {
        &self.exclude
    }

    pub fn max_file_size(&self) -> u64 {
        self.max_file_size
    }

    pub fn origin(&self) -> FilterOrigin {
        self.origin
    }

    pub fn explanation(&self) -> Option<&str> {
        self.explanation.as_deref()
    }

    pub fn matcher(&self) -> Result<FilterMatcher, globset::Error> {
        Ok(FilterMatcher {
            include: PatternSet::build(&self.include)?,
            exclude: PatternSet::build(&self.exclude)?,
        })
    }
}

/// Result of checking one path against the include/exclude patterns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatternDecision {
    Included,
    ExcludedByPattern,
    NotIncluded,
}

pub struct FilterMatcher {
    include: PatternSet,
    exclude: PatternSet,
}

impl FilterMatcher {
    /// Exclude patterns are checked first and always win.
    pub fn decide(&self, path: &str) -> PatternDecision {
        if self.exclude.is_match(path) {
            return PatternDecision::ExcludedByPattern;
        }
        if self.include.is_empty() || self.include.is_match(path) {
            PatternDecision::Included
        } else {
            PatternDecision::NotIncluded
        }
    }
}

/// Globs matched against the full relative path; patterns without a `/` are
/// also matched against the bare file name.
struct PatternSet {
    full: GlobSet,
    name_only: GlobSet,
    len: usize,
}

impl PatternSet {
    fn build(patterns: &[String]) -> Result<Self, globset::Error> {
        let mut full = GlobSetBuilder::new();
        let mut name_only = GlobSetBuilder::new();
        for pattern in patterns {
            let glob = Glob::new(pattern)?;
            if !pattern.contains('/') {
                name_only.add(glob.clone());
            }
            full.add(glob);
        }
        Ok(Self { full: full.build()?, name_only: name_only.build()?, len: patterns.len() })
    }

    fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn is_match(&self, path: &str) -> bool {
        if self.full.is_match(path) {
            return true;
        }
        let name = path.rsplit_once('/').map(|(_, n)| n).unwrap_or(path);
        self.name_only.is_match(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(include: &[&str], exclude: &[&str]) -> FilterSpec {
        FilterSpec::new(
            include.iter().map(|s| s.to_string()).collect(),
            exclude.iter().map(|s| s.to_string()).collect(),
            1024,
            FilterOrigin::Explicit,
        )
    }

    #[test]
    fn exclude_beats_include() {
        let matcher = spec(&["*.py"], &["test_*.py"]).matcher().expect("matcher");
        assert_eq!(matcher.decide("main.py"), PatternDecision::Included);
        assert_eq!(matcher.decide("test_main.py"), PatternDecision::ExcludedByPattern);
        assert_eq!(matcher.decide("tests/test_util.py"), PatternDecision::ExcludedByPattern);
        assert_eq!(matcher.decide("README.md"), PatternDecision::NotIncluded);
    }

    #[test]
    fn empty_include_matches_everything() {
        let matcher = spec(&[], &["docs/**"]).matcher().expect("matcher");
        assert_eq!(matcher.decide("src/lib.rs"), PatternDecision::Included);
        assert_eq!(matcher.decide("docs/guide/intro.md"), PatternDecision::ExcludedByPattern);
    }

    #[test]
    fn star_crosses_directories_like_fnmatch() {
        let matcher = spec(&["src/*"], &[]).matcher().expect("matcher");
        assert_eq!(matcher.decide("src/deep/mod.rs"), PatternDecision::Included);
        assert_eq!(matcher.decide("lib/mod.rs"), PatternDecision::NotIncluded);
    }

    #[test]
    fn invalid_glob_is_an_error() {
        assert!(spec(&["src/[a"], &[]).matcher().is_err());
    }

    #[test]
    fn blank_explanation_is_dropped() {
        let spec = FilterSpec::match_all(10, FilterOrigin::Generated).with_explanation("  ");
        assert!(spec.explanation().is_none());
    }
}
