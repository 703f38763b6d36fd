use crate::cache::Cache;
use crate::cli::CommonArgs;
use crate::config::SearchFilter;
use crate::era::Era;
use crate::github::{era_query, GitHubClient};
use crate::model::RawRepository;
use anyhow::Context;
use chrono::{DateTime, Utc};
use console::style;
use futures::stream::{self, StreamExt};
use std::collections::HashSet;
use std::time::Duration;
use tracing::{info, warn};

const QUERY_PAUSE: Duration = Duration::from_secs(1);

#[derive(Debug, Clone)]
pub struct FetchOptions {
    pub filter: SearchFilter,
    pub extended: bool,
    pub enrich_top: usize,
    pub workers: usize,
}

pub fn exec(common: CommonArgs, opts: FetchOptions) -> anyhow::Result<()> {
    let cutoff = common.cutoff()?;
    let mut cache = Cache::new(common.cache.as_deref()).context("Failed to initialize cache")?;
    let client = super::client(&common)?;
    let rt = super::runtime()?;

    let mut repos = rt.block_on(search_all(&client, &opts.filter, &cutoff));
    if repos.is_empty() {
        println!("No repositories matched the search filters");
        return Ok(());
    }

    let enrich = if opts.extended {
        repos.len()
    } else {
        opts.enrich_top.min(repos.len())
    };
    if enrich > 0 {
        repos.sort_by(|a, b| {
            b.stars
                .cmp(&a.stars)
                .then_with(|| a.full_name.cmp(&b.full_name))
        });
        let rest = repos.split_off(enrich);
        let mut enriched = rt.block_on(enrich_repositories(&client, repos, opts.workers));
        enriched.extend(rest);
        repos = enriched;
    }

    let stored = cache
        .store_repositories(&repos)
        .context("Failed to store repositories in cache")?;

    let (pre, post) = count_by_era(&repos, &cutoff);
    println!(
        "{} {} repositories cached ({} pre, {} post, {} enriched) in {}",
        style("✓").green(),
        style(stored).cyan(),
        pre,
        post,
        enrich,
        cache.path().display()
    );
    Ok(())
}

/// One search per (language, era) so both cohorts are represented.
pub async fn search_all(client: &GitHubClient, filter: &SearchFilter, cutoff: &DateTime<Utc>) -> Vec<RawRepository> {
    let mut seen = HashSet::new();
    let mut repos = Vec::new();

    for language in &filter.languages {
        info!(%language, "fetching repositories");
        for era in Era::ALL {
            let query = era_query(language, filter.min_stars, cutoff, era);
            match client.search_repositories(&query, filter.per_query, 1).await {
                Ok(items) => keep_unseen(&mut seen, &mut repos, items, &query),
                Err(e) => warn!(%language, %era, error = %e, "repository search failed"),
            }
            tokio::time::sleep(QUERY_PAUSE).await;
        }
        if repos.len() >= filter.max_repos {
            break;
        }
    }

    repos.truncate(filter.max_repos);
    repos
}

fn keep_unseen(seen: &mut HashSet<String>, repos: &mut Vec<RawRepository>, items: Vec<RawRepository>, query: &str) {
    for item in items {
        let Some(name) = item.full_name.clone() else {
            warn!(%query, "search result without full_name");
            continue;
        };
        if seen.insert(name) {
            repos.push(item);
        }
    }
}

/// Adds issue and contributor counts. A failed lookup leaves the field unset.
pub async fn enrich_repositories(client: &GitHubClient, repos: Vec<RawRepository>, workers: usize) -> Vec<RawRepository> {
    let pb = super::progress(repos.len() as u64, "Enriching repositories");

    let enriched = stream::iter(repos.into_iter().map(|mut repo| async move {
        let name = repo.full_name.clone().unwrap_or_default();
        match client.issue_counts(&name).await {
            Ok((open, closed)) => {
                repo.total_issues = Some(open + closed);
                repo.closed_issues = Some(closed);
            }
            Err(e) => warn!(repository = %name, error = %e, "issue counts unavailable"),
        }
        match client.contributor_count(&name).await {
            Ok(n) => repo.contributors = Some(n),
            Err(e) => warn!(repository = %name, error = %e, "contributor count unavailable"),
        }
        repo
    }))
    .buffer_unordered(workers.max(1))
    .inspect(|_| pb.inc(1))
    .collect::<Vec<_>>()
    .await;

    pb.finish_with_message("Repositories enriched");
    enriched
}

fn count_by_era(repos: &[RawRepository], cutoff: &DateTime<Utc>) -> (usize, usize) {
    repos
        .iter()
        .filter_map(|r| r.created_at.as_deref())
        .filter_map(|c| crate::util::parse_instant(c).ok())
        .fold((0, 0), |(pre, post), created| {
            match crate::era::classify_era(&created, cutoff) {
                Era::Pre => (pre + 1, post),
                Era::Post => (pre, post + 1),
            }
        })
}
