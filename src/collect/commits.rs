use crate::cache::Cache;
use crate::cli::CommonArgs;
use crate::era::{classify_era, Era};
use crate::github::GitHubClient;
use crate::model::{RawCommit, Repository};
use anyhow::Context;
use chrono::{DateTime, Utc};
use console::style;
use futures::stream::{self, StreamExt};
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct CommitOptions {
    pub max_repos: usize,
    pub commits_per_repo: usize,
    pub refresh: bool,
    pub workers: usize,
}

pub fn exec(common: CommonArgs, opts: CommitOptions) -> anyhow::Result<()> {
    let cutoff = common.cutoff()?;
    let mut cache = Cache::new(common.cache.as_deref()).context("Failed to initialize cache")?;

    let repositories = cache
        .get_repositories()
        .context("Failed to read cached repositories")?
        .into_iter()
        .filter_map(|raw| {
            let name = raw.full_name.clone().unwrap_or_default();
            Repository::try_from(raw)
                .map_err(|e| warn!(repository = %name, error = %e, "skipping malformed repository"))
                .ok()
        })
        .collect::<Vec<_>>();

    if repositories.is_empty() {
        println!("No repositories cached. Run `debtscope fetch` first.");
        return Ok(());
    }

    let sampled = if opts.refresh {
        Default::default()
    } else {
        cache.sampled_repositories().context("Failed to read commit windows")?
    };

    let targets: Vec<String> = select_targets(repositories, &cutoff, opts.max_repos)
        .into_iter()
        .filter(|name| !sampled.contains(name))
        .collect();

    if targets.is_empty() {
        println!("All selected repositories already have commit windows cached");
        return Ok(());
    }

    let client = super::client(&common)?;
    let rt = super::runtime()?;
    info!(repositories = targets.len(), max = opts.commits_per_repo, "fetching commit windows");

    let windows = rt.block_on(fetch_windows(&client, targets, opts.commits_per_repo, opts.workers));

    let mut stored = 0usize;
    let mut commits = 0usize;
    for (name, window) in windows {
        match window {
            Ok(window) => {
                cache
                    .store_commits(&name, &window)
                    .with_context(|| format!("Failed to store commits for {name}"))?;
                stored += 1;
                commits += window.len();
            }
            Err(e) => warn!(repository = %name, error = %e, "commit window unavailable"),
        }
    }

    println!(
        "{} {} commits from {} repositories cached in {}",
        style("✓").green(),
        style(commits).cyan(),
        stored,
        cache.path().display()
    );
    Ok(())
}

/// Most-starred repositories of each era, `max_repos / 2` per era.
fn select_targets(mut repositories: Vec<Repository>, cutoff: &DateTime<Utc>, max_repos: usize) -> Vec<String> {
    repositories.sort_by(|a, b| {
        b.stars
            .cmp(&a.stars)
            .then_with(|| a.full_name.cmp(&b.full_name))
    });
    let per_era = (max_repos / 2).max(1);

    let mut targets = Vec::new();
    for era in Era::ALL {
        targets.extend(
            repositories
                .iter()
                .filter(|r| classify_era(&r.created_at, cutoff) == era)
                .take(per_era)
                .map(|r| r.full_name.clone()),
        );
    }
    targets
}

async fn fetch_windows(
    client: &GitHubClient,
    targets: Vec<String>,
    max: usize,
    workers: usize,
) -> Vec<(String, crate::error::Result<Vec<RawCommit>>)> {
    let pb = super::progress(targets.len() as u64, "Fetching commits");

    let windows = stream::iter(targets.into_iter().map(|name| async move {
        let window = client.commits(&name, max).await;
        (name, window)
    }))
    .buffer_unordered(workers.max(1))
    .inspect(|_| pb.inc(1))
    .collect::<Vec<_>>()
    .await;

    pb.finish_with_message("Commits fetched");
    windows
}
