//! GitHub REST v3 collaborator: repository search, issue and contributor
//! counts, and bounded commit windows.

pub mod client;
pub mod rate_limit;
pub mod types;

pub use client::GitHubClient;
pub use rate_limit::RateLimit;
pub use types::{era_query, last_page};

use std::time::Duration;

pub const GITHUB_API_BASE: &str = "https://api.github.com";
pub const COMMITS_PER_PAGE: usize = 100;

#[derive(Debug, Clone)]
pub struct ApiClientConfig {
    pub base_url: String,
    pub access_token: Option<String>,
    pub timeout: Duration,
    pub user_agent: String,
    pub page_delay: Duration,
}

impl Default for ApiClientConfig {
    fn default() -> Self {
        Self {
            base_url: GITHUB_API_BASE.to_string(),
            access_token: None,
            timeout: Duration::from_secs(30),
            user_agent: format!("debtscope/{}", env!("CARGO_PKG_VERSION")),
            page_delay: Duration::from_millis(300),
        }
    }
}

impl ApiClientConfig {
    pub fn github(access_token: Option<String>) -> Self {
        Self {
            access_token,
            ..Default::default()
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_page_delay(mut self, delay: Duration) -> Self {
        self.page_delay = delay;
        self
    }
}
