//! Inbound analysis request.

use serde::{Deserialize, Serialize};

/// How the single-list `pattern` field is interpreted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternType {
    Include,
    #[default]
    Exclude,
}

impl std::str::FromStr for PatternType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "include" => Ok(PatternType::Include),
            "exclude" => Ok(PatternType::Exclude),
            other => Err(format!("Invalid pattern type '{other}' (expected include or exclude)")),
        }
    }
}

/// One request to analyze a repository.
///
/// `query` and the explicit pattern fields are independent; when both are
/// present the explicit patterns win. `pattern` is a comma-separated list
/// whose meaning is selected by `pattern_type`; it is merged with
/// `include` / `exclude`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisRequest {
    pub url: String,
    /// Branch, tag or commit. Overrides a ref embedded in the URL.
    pub reference: Option<String>,
    pub query: Option<String>,
    /// Fail the request instead of degrading when the query cannot be turned into filters.
    pub require_query: bool,
    pub include: Vec<String>,
    pub exclude: Vec<String>,
    pub pattern: Option<String>,
    pub pattern_type: PatternType,
    pub diagram: bool,
    pub max_file_size: Option<u64>,
}

impl AnalysisRequest {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into(), ..Self::default() }
    }

    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = Some(query.into());
        self
    }

    pub fn with_required_query(mut self, query: impl Into<String>) -> Self {
        self.query = Some(query.into());
        self.require_query = true;
        self
    }

    pub fn with_include<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.include.extend(patterns.into_iter().map(Into::into));
        self
    }

    pub fn with_exclude<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude.extend(patterns.into_iter().map(Into::into));
        self
    }

    pub fn with_diagram(mut self, enabled: bool) -> Self {
        self.diagram = enabled;
        self
    }

    pub fn with_max_file_size(mut self, bytes: u64) -> Self {
        self.max_file_size = Some(bytes);
        self
    }

    pub fn with_reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = Some(reference.into());
        self
    }

    /// The natural-language query, if it holds anything besides whitespace.
    pub fn query(&self) -> Option<&str> {
        self.query.as_deref().map(str::trim).filter(|q| !q.is_empty())
    }

    /// Explicit include and exclude lists with the `pattern` field folded in.
    pub fn explicit_patterns(&self) -> (Vec<String>, Vec<String>) {
        let mut include = self.include.clone();
        let mut exclude = self.exclude.clone();
        if let Some(list) = &self.pattern {
            let parsed = list
                .split(',')
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(str::to_string);
            match self.pattern_type {
                PatternType::Include => include.extend(parsed),
                PatternType::Exclude => exclude.extend(parsed),
            }
        }
        (include, exclude)
    }

    pub fn has_explicit_patterns(&self) -> bool {
        let (include, exclude) = self.explicit_patterns();
        include.iter().chain(exclude.iter()).any(|p| !p.trim().is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_query_is_treated_as_absent() {
        let request = AnalysisRequest::new("https://github.com/a/b").with_query("   ");
        assert!(request.query().is_none());
    }

    #[test]
    fn pattern_list_follows_pattern_type() {
        let mut request = AnalysisRequest::new("https://github.com/a/b");
        request.pattern = Some("*.md, docs/ ,".to_string());
        let (include, exclude) = request.explicit_patterns();
        assert!(include.is_empty());
        assert_eq!(exclude, vec!["*.md".to_string(), "docs/".to_string()]);

        request.pattern_type = PatternType::Include;
        let (include, exclude) = request.explicit_patterns();
        assert_eq!(include.len(), 2);
        assert!(exclude.is_empty());
    }

    #[test]
    fn deserializes_with_defaults() {
        let request: AnalysisRequest =
            serde_json::from_str(r#"{"url":"https://github.com/a/b","diagram":true}"#)
                .expect("request json");
        assert!(request.diagram);
        assert_eq!(request.pattern_type, PatternType::Exclude);
        assert!(!request.has_explicit_patterns());
    }
}
