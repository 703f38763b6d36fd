//! Fetch commands: fill the cache from the GitHub API.

pub mod commits;
pub mod repositories;

pub use commits::exec as exec_commits;
pub use repositories::exec as exec_repositories;

use crate::cli::CommonArgs;
use crate::github::{ApiClientConfig, GitHubClient};
use anyhow::Context;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};

pub(crate) fn runtime() -> anyhow::Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")
}

pub(crate) fn client(common: &CommonArgs) -> anyhow::Result<GitHubClient> {
    let mut config = ApiClientConfig::github(common.token.clone());
    if let Some(url) = &common.api_url {
        config = config.with_base_url(url.clone());
    }
    let client = GitHubClient::new(config).context("Failed to create GitHub client")?;
    if !client.is_authenticated() {
        eprintln!(
            "{} No GITHUB_TOKEN set. Rate limits will be strict (60 req/hour).",
            style("warning:").yellow().bold()
        );
    }
    Ok(client)
}

pub(crate) fn progress(len: u64, message: &'static str) -> ProgressBar {
    let pb = ProgressBar::new(len);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} {msg} [{bar:30.cyan/blue}] {pos}/{len}")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );
    pb.set_message(message);
    pb
}
