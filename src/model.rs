use crate::era::Era;
use crate::error::{DebtError, Result};
use crate::signal::SignalCategory;
use crate::util::parse_instant;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Repository {
    pub full_name: String,
    pub created_at: DateTime<Utc>,
    pub stars: u64,
    pub open_issues: u64,
    pub forks: u64,
    pub language: Option<String>,
    pub closed_issues: Option<u64>,
    pub total_issues: Option<u64>,
    pub contributors: Option<u64>,
}

impl Repository {
    pub fn new(full_name: impl Into<String>, created_at: DateTime<Utc>, stars: u64, open_issues: u64) -> Self {
        Self {
            full_name: full_name.into(),
            created_at,
            stars,
            open_issues,
            forks: 0,
            language: None,
            closed_issues: None,
            total_issues: None,
            contributors: None,
        }
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    pub fn with_issue_counts(mut self, open: u64, closed: u64) -> Self {
        self.total_issues = Some(open + closed);
        self.closed_issues = Some(closed);
        self
    }

    pub fn with_contributors(mut self, contributors: u64) -> Self {
        self.contributors = Some(contributors);
        self
    }

    pub fn age_days(&self, as_of: &DateTime<Utc>) -> i64 {
        (*as_of - self.created_at).num_days()
    }

    /// Open issues accumulated per year of existence; age floors at 0.1 years.
    pub fn issues_per_year(&self, as_of: &DateTime<Utc>) -> f64 {
        let years = (self.age_days(as_of) as f64 / 365.0).max(0.1);
        self.open_issues as f64 / years
    }

    /// Percentage of all issues that are closed, once issue counts are known.
    pub fn close_rate(&self) -> Option<f64> {
        match (self.closed_issues, self.total_issues) {
            (Some(closed), Some(total)) if total > 0 => Some(closed as f64 / total as f64 * 100.0),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawRepository {
    pub full_name: Option<String>,
    pub created_at: Option<String>,
    pub stars: Option<u64>,
    pub open_issues: Option<u64>,
    pub forks: Option<u64>,
    pub language: Option<String>,
    pub closed_issues: Option<u64>,
    pub total_issues: Option<u64>,
    pub contributors: Option<u64>,
}

impl TryFrom<RawRepository> for Repository {
    type Error = DebtError;

    fn try_from(raw: RawRepository) -> Result<Self> {
        let full_name = raw
            .full_name
            .filter(|n| !n.trim().is_empty())
            .ok_or_else(|| DebtError::MalformedInput("repository without full_name".to_string()))?;
        let created_raw = raw.created_at.ok_or_else(|| {
            DebtError::MalformedInput(format!("{full_name}: missing created_at"))
        })?;
        let created_at = parse_instant(&created_raw)
            .map_err(|e| DebtError::MalformedInput(format!("{full_name}: {e}")))?;
        let stars = raw
            .stars
            .ok_or_else(|| DebtError::MalformedInput(format!("{full_name}: missing star count")))?;
        let open_issues = raw.open_issues.ok_or_else(|| {
            DebtError::MalformedInput(format!("{full_name}: missing open issue count"))
        })?;

        Ok(Repository {
            full_name,
            created_at,
            stars,
            open_issues,
            forks: raw.forks.unwrap_or(0),
            language: raw.language,
            closed_issues: raw.closed_issues,
            total_issues: raw.total_issues,
            contributors: raw.contributors,
        })
    }
}

impl From<&Repository> for RawRepository {
    fn from(repo: &Repository) -> Self {
        Self {
            full_name: Some(repo.full_name.clone()),
            created_at: Some(repo.created_at.to_rfc3339()),
            stars: Some(repo.stars),
            open_issues: Some(repo.open_issues),
            forks: Some(repo.forks),
            language: repo.language.clone(),
            closed_issues: repo.closed_issues,
            total_issues: repo.total_issues,
            contributors: repo.contributors,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommitRecord {
    pub repository: String,
    pub sha: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawCommit {
    pub repository: String,
    pub sha: Option<String>,
    pub message: Option<String>,
    pub timestamp: Option<String>,
}

impl TryFrom<RawCommit> for CommitRecord {
    type Error = DebtError;

    fn try_from(raw: RawCommit) -> Result<Self> {
        let sha = raw.sha.filter(|s| !s.is_empty()).ok_or_else(|| {
            DebtError::MalformedInput(format!("{}: commit without sha", raw.repository))
        })?;
        let message = raw.message.filter(|m| !m.is_empty()).ok_or_else(|| {
            DebtError::MalformedInput(format!("{}@{sha}: empty commit message", raw.repository))
        })?;
        let ts = raw.timestamp.ok_or_else(|| {
            DebtError::MalformedInput(format!("{}@{sha}: missing commit date", raw.repository))
        })?;
        let timestamp = parse_instant(&ts)
            .map_err(|e| DebtError::MalformedInput(format!("{}@{sha}: {e}", raw.repository)))?;

        Ok(CommitRecord {
            repository: raw.repository,
            sha,
            message,
            timestamp,
        })
    }
}

/// `commits` is `None` when the history was never sampled.
#[derive(Debug, Clone, PartialEq)]
pub struct RepositorySample {
    pub repository: Repository,
    pub commits: Option<Vec<CommitRecord>>,
}

impl RepositorySample {
    pub fn new(repository: Repository) -> Self {
        Self {
            repository,
            commits: None,
        }
    }

    pub fn with_commits(mut self, commits: Vec<CommitRecord>) -> Self {
        self.commits = Some(commits);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExclusionKind {
    DataInsufficient,
    MalformedInput,
}

impl ExclusionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExclusionKind::DataInsufficient => "data_insufficient",
            ExclusionKind::MalformedInput => "malformed_input",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Exclusion {
    pub subject: String,
    pub kind: ExclusionKind,
    pub reason: String,
}

impl Exclusion {
    pub fn from_error(subject: impl Into<String>, err: &DebtError) -> Option<Self> {
        let (kind, reason) = match err {
            DebtError::DataInsufficient(r) => (ExclusionKind::DataInsufficient, r.clone()),
            DebtError::MalformedInput(r) => (ExclusionKind::MalformedInput, r.clone()),
            _ => return None,
        };
        Some(Self {
            subject: subject.into(),
            kind,
            reason,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TermCount {
    pub term: String,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalSummary {
    pub category: SignalCategory,
    pub count: u64,
    /// Absent when the era has no commits.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rate_per_100: Option<f64>,
    pub top_terms: Vec<TermCount>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RepositoryStats {
    pub ratio_repositories: usize,
    pub avg_issues_per_1k_stars: Option<f64>,
    pub median_issues_per_1k_stars: Option<f64>,
    pub std_dev_ratio: Option<f64>,
    pub total_stars: u64,
    pub total_open_issues: u64,
    pub avg_stars: Option<f64>,
    pub avg_open_issues: Option<f64>,
    pub avg_issues_per_year: Option<f64>,
    pub median_issues_per_year: Option<f64>,
    pub avg_close_rate: Option<f64>,
    pub median_close_rate: Option<f64>,
    pub avg_contributors: Option<f64>,
    pub median_contributors: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EraAggregate {
    pub era: Era,
    pub repositories: u64,
    pub repository_stats: RepositoryStats,
    pub commit_repositories: u64,
    pub total_commits: u64,
    pub signals: Vec<SignalSummary>,
    pub avg_message_length: Option<f64>,
    pub samples: Vec<String>,
    pub exclusions: Vec<Exclusion>,
}

impl EraAggregate {
    pub fn signal(&self, category: SignalCategory) -> Option<&SignalSummary> {
        self.signals.iter().find(|s| s.category == category)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepositoryRow {
    pub full_name: String,
    pub era: Era,
    pub created_at: DateTime<Utc>,
    pub language: Option<String>,
    pub stars: u64,
    pub open_issues: u64,
    pub issues_per_1k_stars: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LanguageStats {
    pub language: String,
    pub repositories: usize,
    pub avg_issues_per_1k_stars: f64,
    pub median_issues_per_1k_stars: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EraReport {
    pub cutoff: DateTime<Utc>,
    pub as_of: DateTime<Utc>,
    pub pattern_table_version: u32,
    pub pre: EraAggregate,
    pub post: EraAggregate,
    pub languages: Vec<LanguageStats>,
    pub highest_ratio: Vec<RepositoryRow>,
    pub lowest_ratio: Vec<RepositoryRow>,
    pub repositories: Vec<RepositoryRow>,
    pub unclassified: Vec<Exclusion>,
}

impl EraReport {
    pub fn era(&self, era: Era) -> &EraAggregate {
        match era {
            Era::Pre => &self.pre,
            Era::Post => &self.post,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportOutput {
    pub version: u32,
    pub generated_at: DateTime<Utc>,
    pub cache_path: String,
    #[serde(flatten)]
    pub report: EraReport,
}
