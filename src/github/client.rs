use super::rate_limit::RateLimit;
use super::types::{last_page, GitHubCommit, GitHubRepository, SearchResponse};
use super::{ApiClientConfig, COMMITS_PER_PAGE};
use crate::error::{DebtError, Result};
use crate::model::{RawCommit, RawRepository};
use chrono::Utc;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, LINK, USER_AGENT};
use reqwest::{Response, StatusCode};
use serde::Deserialize;
use tracing::{debug, info, warn};

const MAX_ATTEMPTS: usize = 2;

#[derive(Debug, Deserialize)]
struct IssueCount {
    total_count: u64,
}

/// Thin wrapper over `reqwest` that knows the endpoints we read and waits out
/// the rate-limit window when it runs low.
#[derive(Debug, Clone)]
pub struct GitHubClient {
    client: reqwest::Client,
    config: ApiClientConfig,
}

impl GitHubClient {
    pub fn new(config: ApiClientConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&config.user_agent)
                .map_err(|e| DebtError::Configuration(format!("invalid user agent: {e}")))?,
        );
        headers.insert(ACCEPT, HeaderValue::from_static("application/vnd.github.v3+json"));
        if let Some(token) = &config.access_token {
            let mut value = HeaderValue::from_str(&format!("token {token}"))
                .map_err(|e| DebtError::Configuration(format!("invalid API token: {e}")))?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .default_headers(headers)
            .build()?;

        info!(base_url = %config.base_url, authenticated = config.access_token.is_some(), "created GitHub client");
        Ok(Self { client, config })
    }

    pub fn is_authenticated(&self) -> bool {
        self.config.access_token.is_some()
    }

    fn url(&self, endpoint: &str) -> String {
        format!(
            "{}/{}",
            self.config.base_url.trim_end_matches('/'),
            endpoint.trim_start_matches('/')
        )
    }

    async fn get(&self, endpoint: &str, query: &[(&str, String)]) -> Result<Response> {
        let url = self.url(endpoint);
        let mut attempt = 0;

        loop {
            attempt += 1;
            debug!(%url, ?query, attempt, "GitHub API request");
            let response = self.client.get(&url).query(query).send().await?;
            let limit = RateLimit::from_headers(response.headers());
            let status = response.status();

            let throttled = matches!(status, StatusCode::FORBIDDEN | StatusCode::TOO_MANY_REQUESTS)
                && limit.is_exhausted();

            if let Some(wait) = limit.wait_duration(Utc::now().timestamp()) {
                warn!(
                    remaining = ?limit.remaining,
                    wait = %humantime::format_duration(wait),
                    "rate limit low, pausing"
                );
                tokio::time::sleep(wait).await;
            }

            if throttled && attempt < MAX_ATTEMPTS {
                continue;
            }

            if !status.is_success() {
                let message = response.text().await.unwrap_or_default();
                return Err(DebtError::Api {
                    status: status.as_u16(),
                    url,
                    message: if message.is_empty() {
                        status.canonical_reason().unwrap_or("unknown error").to_string()
                    } else {
                        message
                    },
                });
            }

            return Ok(response);
        }
    }

    pub async fn search_repositories(&self, query: &str, per_page: u32, page: u32) -> Result<Vec<RawRepository>> {
        let response = self
            .get(
                "search/repositories",
                &[
                    ("q", query.to_string()),
                    ("sort", "stars".to_string()),
                    ("order", "desc".to_string()),
                    ("per_page", per_page.to_string()),
                    ("page", page.to_string()),
                ],
            )
            .await?;
        let body: SearchResponse<GitHubRepository> = response.json().await?;
        debug!(query, total = body.total_count, returned = body.items.len(), "search results");
        Ok(body.items.into_iter().map(Into::into).collect())
    }

    /// Open and closed issue totals from the issue search endpoint.
    pub async fn issue_counts(&self, full_name: &str) -> Result<(u64, u64)> {
        let mut counts = [0u64; 2];
        for (slot, state) in counts.iter_mut().zip(["open", "closed"]) {
            let response = self
                .get(
                    "search/issues",
                    &[
                        ("q", format!("repo:{full_name} type:issue state:{state}")),
                        ("per_page", "1".to_string()),
                    ],
                )
                .await?;
            *slot = response.json::<IssueCount>().await?.total_count;
            tokio::time::sleep(self.config.page_delay).await;
        }
        Ok((counts[0], counts[1]))
    }

    /// Contributors including anonymous ones, read from the last page number
    /// of a one-per-page listing.
    pub async fn contributor_count(&self, full_name: &str) -> Result<u64> {
        let response = self
            .get(
                &format!("repos/{full_name}/contributors"),
                &[("per_page", "1".to_string()), ("anon", "true".to_string())],
            )
            .await?;

        let last = response
            .headers()
            .get(LINK)
            .and_then(|v| v.to_str().ok())
            .and_then(last_page);
        if let Some(n) = last {
            return Ok(n);
        }
        if response.status() == StatusCode::NO_CONTENT {
            return Ok(0);
        }
        let listed: Vec<serde_json::Value> = response.json().await?;
        Ok(listed.len() as u64)
    }

    pub async fn commits(&self, full_name: &str, max: usize) -> Result<Vec<RawCommit>> {
        let mut commits = Vec::new();
        let mut page = 1u32;

        while commits.len() < max {
            let response = self
                .get(
                    &format!("repos/{full_name}/commits"),
                    &[
                        ("per_page", COMMITS_PER_PAGE.to_string()),
                        ("page", page.to_string()),
                    ],
                )
                .await?;
            let batch: Vec<GitHubCommit> = response.json().await?;
            if batch.is_empty() {
                break;
            }
            let short = batch.len() < COMMITS_PER_PAGE;
            commits.extend(batch.into_iter().map(|c| c.into_raw(full_name)));
            if short {
                break;
            }
            page += 1;
            tokio::time::sleep(self.config.page_delay).await;
        }

        commits.truncate(max);
        debug!(repository = full_name, count = commits.len(), "fetched commit window");
        Ok(commits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_urls_without_double_slashes() {
        let client = GitHubClient::new(
            ApiClientConfig::github(Some("abc".into())).with_base_url("https://example.test/api/"),
        )
        .unwrap();
        assert!(client.is_authenticated());
        assert_eq!(
            client.url("/repos/a/b/commits"),
            "https://example.test/api/repos/a/b/commits"
        );
    }

    #[test]
    fn rejects_tokens_that_are_not_header_safe() {
        let err = GitHubClient::new(ApiClientConfig::github(Some("bad\ntoken".into()))).unwrap_err();
        assert!(matches!(err, DebtError::Configuration(_)));
    }
}
