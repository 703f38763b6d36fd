//! Wire shapes of the GitHub responses we read, and their conversion into raw
//! records. Every field is optional here; validation happens later.

use crate::era::Era;
use crate::model::{RawCommit, RawRepository};
use chrono::{DateTime, Timelike, Utc};
use regex::Regex;
use serde::Deserialize;
use std::sync::OnceLock;

#[derive(Debug, Deserialize)]
pub struct SearchResponse<T> {
    #[serde(default)]
    pub total_count: u64,
    #[serde(default = "Vec::new")]
    pub items: Vec<T>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GitHubRepository {
    pub full_name: Option<String>,
    pub created_at: Option<String>,
    pub stargazers_count: Option<u64>,
    pub open_issues_count: Option<u64>,
    pub forks_count: Option<u64>,
    pub language: Option<String>,
}

impl From<GitHubRepository> for RawRepository {
    fn from(repo: GitHubRepository) -> Self {
        RawRepository {
            full_name: repo.full_name,
            created_at: repo.created_at,
            stars: repo.stargazers_count,
            open_issues: repo.open_issues_count,
            forks: repo.forks_count,
            language: repo.language,
            closed_issues: None,
            total_issues: None,
            contributors: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct GitHubCommit {
    pub sha: Option<String>,
    pub commit: Option<GitHubCommitDetail>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GitHubCommitDetail {
    pub message: Option<String>,
    pub author: Option<GitHubSignature>,
    pub committer: Option<GitHubSignature>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GitHubSignature {
    pub date: Option<String>,
}

impl GitHubCommit {
    pub fn into_raw(self, repository: &str) -> RawCommit {
        let (message, timestamp) = match self.commit {
            Some(detail) => {
                let date = detail
                    .author
                    .and_then(|a| a.date)
                    .or_else(|| detail.committer.and_then(|c| c.date));
                (detail.message, date)
            }
            None => (None, None),
        };
        RawCommit {
            repository: repository.to_string(),
            sha: self.sha,
            message,
            timestamp,
        }
    }
}

/// Page number of the `rel="last"` entry of a `Link` header.
pub fn last_page(link: &str) -> Option<u64> {
    static LAST: OnceLock<Option<Regex>> = OnceLock::new();
    let re = LAST
        .get_or_init(|| Regex::new(r#"[?&]page=(\d+)[^>]*>;\s*rel="last""#).ok())
        .as_ref()?;
    re.captures(link)?.get(1)?.as_str().parse().ok()
}

pub fn era_query(language: &str, min_stars: u64, cutoff: &DateTime<Utc>, era: Era) -> String {
    let bound = if cutoff.num_seconds_from_midnight() == 0 {
        cutoff.format("%Y-%m-%d").to_string()
    } else {
        cutoff.format("%Y-%m-%dT%H:%M:%SZ").to_string()
    };
    let op = match era {
        Era::Pre => "<",
        Era::Post => ">=",
    };
    format!("language:{language} stars:>{min_stars} created:{op}{bound}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::era::default_cutoff;
    use chrono::TimeZone;

    #[test]
    fn search_items_become_raw_repositories() {
        let json = r#"{
            "total_count": 2,
            "items": [
                {"full_name": "a/b", "created_at": "2019-01-01T00:00:00Z",
                 "stargazers_count": 1200, "open_issues_count": 30,
                 "forks_count": 4, "language": "Rust", "extra": true},
                {"full_name": "c/d", "stargazers_count": 5}
            ]
        }"#;
        let resp: SearchResponse<GitHubRepository> = serde_json::from_str(json).unwrap();
        let raws: Vec<RawRepository> = resp.items.into_iter().map(Into::into).collect();
        assert_eq!(raws[0].stars, Some(1200));
        assert_eq!(raws[0].language.as_deref(), Some("Rust"));
        assert_eq!(raws[1].created_at, None);
    }

    #[test]
    fn commit_uses_author_date_then_committer() {
        let json = r#"[
            {"sha": "1", "commit": {"message": "fix", "author": {"date": "2024-01-01T00:00:00Z"},
                                    "committer": {"date": "2024-01-02T00:00:00Z"}}},
            {"sha": "2", "commit": {"message": "wip", "author": null,
                                    "committer": {"date": "2024-01-03T00:00:00Z"}}},
            {"sha": "3"}
        ]"#;
        let commits: Vec<GitHubCommit> = serde_json::from_str(json).unwrap();
        let raws: Vec<RawCommit> = commits.into_iter().map(|c| c.into_raw("o/r")).collect();
        assert_eq!(raws[0].timestamp.as_deref(), Some("2024-01-01T00:00:00Z"));
        assert_eq!(raws[1].timestamp.as_deref(), Some("2024-01-03T00:00:00Z"));
        assert_eq!(raws[2].message, None);
        assert_eq!(raws[2].repository, "o/r");
    }

    #[test]
    fn parses_last_page_from_link_header() {
        let link = r#"<https://api.github.com/repositories/1/contributors?per_page=1&anon=true&page=2>; rel="next", <https://api.github.com/repositories/1/contributors?per_page=1&anon=true&page=417>; rel="last""#;
        assert_eq!(last_page(link), Some(417));
        assert_eq!(last_page(r#"<https://x/?page=2>; rel="next""#), None);
        assert_eq!(last_page(""), None);
    }

    #[test]
    fn era_queries_split_at_cutoff() {
        let cutoff = default_cutoff();
        assert_eq!(
            era_query("rust", 1000, &cutoff, Era::Pre),
            "language:rust stars:>1000 created:<2022-01-01"
        );
        assert_eq!(
            era_query("go", 50, &cutoff, Era::Post),
            "language:go stars:>50 created:>=2022-01-01"
        );
        let noon = Utc.with_ymd_and_hms(2022, 11, 30, 12, 0, 0).unwrap();
        assert_eq!(
            era_query("go", 50, &noon, Era::Pre),
            "language:go stars:>50 created:<2022-11-30T12:00:00Z"
        );
    }
}
