//! Explicit run configuration, validated before any aggregation starts.

use crate::era::default_cutoff;
use crate::error::{DebtError, Result};
use crate::signal::{PatternTable, PatternTableSpec};
use crate::util::parse_instant;
use chrono::{DateTime, Utc};
use std::path::Path;

pub const DEFAULT_MAX_COMMITS: i64 = 500;
pub const DEFAULT_TOP_TERMS: usize = 5;
pub const DEFAULT_EXTREMES: usize = 10;
pub const SAMPLES_PER_REPOSITORY: usize = 5;
pub const SAMPLES_PER_ERA: usize = 10;
pub const SAMPLE_LINE_CHARS: usize = 100;

pub const DEFAULT_LANGUAGES: &[&str] = &["javascript", "python", "typescript", "java", "go", "rust"];

#[derive(Debug, Clone)]
pub struct AnalysisConfig {
    pub cutoff: DateTime<Utc>,
    pub as_of: DateTime<Utc>,
    pub max_commits: usize,
    pub patterns: PatternTable,
    pub top_terms: usize,
    pub extremes: usize,
}

impl AnalysisConfig {
    pub fn builder() -> AnalysisConfigBuilder {
        AnalysisConfigBuilder::default()
    }
}

#[derive(Debug, Clone)]
pub struct AnalysisConfigBuilder {
    cutoff: Option<String>,
    as_of: Option<String>,
    max_commits: i64,
    patterns: Option<PatternTableSpec>,
    top_terms: usize,
    extremes: usize,
}

impl Default for AnalysisConfigBuilder {
    fn default() -> Self {
        Self {
            cutoff: None,
            as_of: None,
            max_commits: DEFAULT_MAX_COMMITS,
            patterns: None,
            top_terms: DEFAULT_TOP_TERMS,
            extremes: DEFAULT_EXTREMES,
        }
    }
}

impl AnalysisConfigBuilder {
    pub fn cutoff(mut self, cutoff: impl Into<String>) -> Self {
        self.cutoff = Some(cutoff.into());
        self
    }

    pub fn as_of(mut self, as_of: impl Into<String>) -> Self {
        self.as_of = Some(as_of.into());
        self
    }

    pub fn max_commits(mut self, max_commits: i64) -> Self {
        self.max_commits = max_commits;
        self
    }

    pub fn patterns(mut self, spec: PatternTableSpec) -> Self {
        self.patterns = Some(spec);
        self
    }

    pub fn patterns_file<P: AsRef<Path>>(self, path: P) -> Result<Self> {
        let spec = PatternTableSpec::load(path)?;
        Ok(self.patterns(spec))
    }

    pub fn top_terms(mut self, top_terms: usize) -> Self {
        self.top_terms = top_terms;
        self
    }

    pub fn extremes(mut self, extremes: usize) -> Self {
        self.extremes = extremes;
        self
    }

    pub fn build(self) -> Result<AnalysisConfig> {
        let cutoff = match self.cutoff.as_deref() {
            Some(raw) => parse_instant(raw)
                .map_err(|e| DebtError::Configuration(format!("invalid cutoff: {e}")))?,
            None => default_cutoff(),
        };
        let as_of = match self.as_of.as_deref() {
            Some(raw) => parse_instant(raw)
                .map_err(|e| DebtError::Configuration(format!("invalid as-of date: {e}")))?,
            None => {
                return Err(DebtError::Configuration(
                    "an as-of instant is required for age-based metrics".to_string(),
                ))
            }
        };
        if self.max_commits <= 0 {
            return Err(DebtError::Configuration(format!(
                "max commits per repository must be positive, got {}",
                self.max_commits
            )));
        }
        if self.top_terms == 0 {
            return Err(DebtError::Configuration(
                "top terms must be at least 1".to_string(),
            ));
        }
        let patterns = self
            .patterns
            .unwrap_or_else(PatternTableSpec::reference)
            .compile()?;

        Ok(AnalysisConfig {
            cutoff,
            as_of,
            max_commits: self.max_commits as usize,
            patterns,
            top_terms: self.top_terms,
            extremes: self.extremes,
        })
    }
}

#[derive(Debug, Clone)]
pub struct SearchFilter {
    pub min_stars: u64,
    pub languages: Vec<String>,
    pub max_repos: usize,
    pub per_query: u32,
}

impl Default for SearchFilter {
    fn default() -> Self {
        Self {
            min_stars: 1000,
            languages: DEFAULT_LANGUAGES.iter().map(|l| l.to_string()).collect(),
            max_repos: 200,
            per_query: 30,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal::SignalCategory;

    #[test]
    fn defaults_build() {
        let cfg = AnalysisConfig::builder().as_of("2025-01-01").build().unwrap();
        assert_eq!(cfg.cutoff, default_cutoff());
        assert_eq!(cfg.max_commits, 500);
        assert_eq!(cfg.top_terms, DEFAULT_TOP_TERMS);
        assert!(!cfg.patterns.patterns(SignalCategory::Debt).is_empty());
    }

    #[test]
    fn bad_cutoff_is_fatal() {
        let err = AnalysisConfig::builder()
            .as_of("2025-01-01")
            .cutoff("not-a-date")
            .build()
            .unwrap_err();
        assert!(matches!(err, DebtError::Configuration(ref m) if m.contains("cutoff")));
    }

    #[test]
    fn missing_as_of_is_fatal() {
        let err = AnalysisConfig::builder().build().unwrap_err();
        assert!(matches!(err, DebtError::Configuration(ref m) if m.contains("as-of")));
    }

    #[test]
    fn non_positive_max_commits_is_fatal() {
        for n in [0, -1, -500] {
            let err = AnalysisConfig::builder()
                .as_of("2025-01-01")
                .max_commits(n)
                .build()
                .unwrap_err();
            assert!(matches!(err, DebtError::Configuration(ref m) if m.contains("max commits")));
        }
    }

    #[test]
    fn empty_pattern_table_is_fatal() {
        let spec = PatternTableSpec::from_categories(2, Vec::new());
        let err = AnalysisConfig::builder()
            .as_of("2025-01-01")
            .patterns(spec)
            .build()
            .unwrap_err();
        assert!(matches!(err, DebtError::Configuration(_)));
    }

    #[test]
    fn missing_patterns_file_is_fatal() {
        let err = AnalysisConfig::builder()
            .patterns_file("/definitely/not/here.json")
            .unwrap_err();
        assert!(matches!(err, DebtError::Configuration(_)));
    }
}
