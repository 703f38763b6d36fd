use super::{output_json, output_ndjson, output_table, render_markdown};
use crate::aggregate::EraAccumulator;
use crate::cache::Cache;
use crate::cli::CommonArgs;
use crate::config::AnalysisConfig;
use crate::model::EraReport;
use anyhow::Context;
use chrono::{DateTime, Utc};
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormat {
    Table,
    Json,
    Ndjson,
    Markdown,
}

#[derive(Debug, Clone)]
pub struct ReportOptions {
    pub format: ReportFormat,
    pub max_commits: i64,
    pub top_terms: usize,
    pub extremes: usize,
    pub as_of: Option<String>,
}

pub fn exec(common: CommonArgs, opts: ReportOptions) -> anyhow::Result<()> {
    let cache = Cache::new(common.cache.as_deref()).context("Failed to initialize cache")?;
    let as_of = resolve_as_of(opts.as_of.as_deref(), &cache, common.cutoff()?)?;
    info!(%as_of, "age-based metrics reference");

    let config = common
        .config_builder()?
        .as_of(as_of.to_rfc3339())
        .max_commits(opts.max_commits)
        .top_terms(opts.top_terms)
        .extremes(opts.extremes)
        .build()
        .context("Invalid analysis configuration")?;
    let report = build_report(&cache, &config)?;

    match opts.format {
        ReportFormat::Json => output_json(&report, &cache)?,
        ReportFormat::Ndjson => output_ndjson(&report)?,
        ReportFormat::Markdown => print!("{}", render_markdown(&report)),
        ReportFormat::Table => output_table(&report)?,
    }
    Ok(())
}

/// `--as-of` if given, else the latest fetch, else the cutoff. Reruns over the
/// same cache then agree.
pub fn resolve_as_of(explicit: Option<&str>, cache: &Cache, cutoff: DateTime<Utc>) -> anyhow::Result<DateTime<Utc>> {
    if let Some(raw) = explicit {
        return crate::util::parse_instant(raw).with_context(|| format!("Invalid --as-of {raw:?}"));
    }
    let latest = cache.latest_fetch().context("Failed to read fetch time")?;
    Ok(latest.unwrap_or(cutoff))
}

pub fn build_report(cache: &Cache, config: &AnalysisConfig) -> anyhow::Result<EraReport> {
    let samples = cache.load_samples().context("Failed to read cached samples")?;
    info!(repositories = samples.len(), "aggregating cached samples");

    let mut acc = EraAccumulator::new(config);
    for (repository, commits) in samples {
        acc.push_raw(repository, commits);
    }
    Ok(acc.snapshot())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::era::{default_cutoff, Era};
    use crate::model::{RawCommit, RawRepository};
    use crate::signal::SignalCategory;
    use tempfile::tempdir;

    fn raw(name: &str, created: &str, stars: u64, open: u64) -> RawRepository {
        RawRepository {
            full_name: Some(name.into()),
            created_at: Some(created.into()),
            stars: Some(stars),
            open_issues: Some(open),
            language: Some("Rust".into()),
            ..Default::default()
        }
    }

    fn commit(repo: &str, sha: &str, message: &str) -> RawCommit {
        RawCommit {
            repository: repo.into(),
            sha: Some(sha.into()),
            message: Some(message.into()),
            timestamp: Some("2024-01-01T00:00:00Z".into()),
        }
    }

    #[test]
    fn builds_report_from_cache() {
        let dir = tempdir().unwrap();
        let mut cache = Cache::new(Some(dir.path())).unwrap();
        cache
            .store_repositories(&[
                raw("old/a", "2015-01-01T00:00:00Z", 2000, 40),
                raw("new/b", "2023-01-01T00:00:00Z", 1000, 5),
                RawRepository {
                    full_name: Some("broken/c".into()),
                    ..Default::default()
                },
            ])
            .unwrap();
        cache
            .store_commits(
                "old/a",
                &[commit("old/a", "1", "fix crash, todo cleanup"), commit("old/a", "2", "docs")],
            )
            .unwrap();

        let config = AnalysisConfig::builder().as_of("2025-01-01").build().unwrap();
        let report = build_report(&cache, &config).unwrap();

        assert_eq!(report.pre.repositories, 1);
        assert_eq!(report.post.repositories, 1);
        assert_eq!(report.pre.total_commits, 2);
        assert_eq!(report.era(Era::Pre).signal(SignalCategory::Debt).unwrap().count, 1);
        assert_eq!(report.post.total_commits, 0);
        assert!(report
            .post
            .signals
            .iter()
            .all(|s| s.rate_per_100.is_none()));
        assert_eq!(report.unclassified.len(), 1);
        assert_eq!(report.unclassified[0].subject, "broken/c");
    }

    #[test]
    fn reruns_over_same_cache_agree() {
        let dir = tempdir().unwrap();
        let mut cache = Cache::new(Some(dir.path())).unwrap();
        cache
            .store_repositories(&[
                raw("old/a", "2015-01-01T00:00:00Z", 2000, 40),
                raw("new/b", "2023-01-01T00:00:00Z", 1000, 5),
            ])
            .unwrap();
        cache
            .store_commits("new/b", &[commit("new/b", "1", "hack around broken build")])
            .unwrap();

        let cutoff = default_cutoff();
        let build = || {
            let as_of = resolve_as_of(None, &cache, cutoff).unwrap();
            let config = AnalysisConfig::builder()
                .as_of(as_of.to_rfc3339())
                .build()
                .unwrap();
            build_report(&cache, &config).unwrap()
        };
        let first = build();
        std::thread::sleep(std::time::Duration::from_millis(10));
        let second = build();

        assert_eq!(first, second);
        assert!(first.pre.repository_stats.avg_issues_per_year.is_some());
    }

    #[test]
    fn as_of_prefers_flag_then_fetch_then_cutoff() {
        let dir = tempdir().unwrap();
        let mut cache = Cache::new(Some(dir.path())).unwrap();
        let cutoff = default_cutoff();

        assert_eq!(resolve_as_of(None, &cache, cutoff).unwrap(), cutoff);

        cache
            .store_repositories(&[raw("old/a", "2015-01-01T00:00:00Z", 2000, 40)])
            .unwrap();
        assert_eq!(
            resolve_as_of(None, &cache, cutoff).unwrap(),
            cache.latest_fetch().unwrap().unwrap()
        );

        let explicit = resolve_as_of(Some("2024-06-01"), &cache, cutoff).unwrap();
        assert_eq!(explicit, crate::util::parse_instant("2024-06-01").unwrap());
        assert!(resolve_as_of(Some("soon"), &cache, cutoff).is_err());
    }
}
