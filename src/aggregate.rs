//! Streaming fold of repository samples into per-era aggregates.
//!
//! Each sample is turned into a single-repository [`EraPartial`] and merged
//! into the partial for its era, so `push` is just a `merge` with a singleton.
//! Counters add and retained lists concatenate; every list is sorted before
//! statistics are taken, which makes the result independent of the order in
//! which repositories arrive or partials are combined.

use crate::config::{AnalysisConfig, SAMPLES_PER_ERA, SAMPLES_PER_REPOSITORY, SAMPLE_LINE_CHARS};
use crate::era::{classify_era, Era};
use crate::error::DebtError;
use crate::model::{
    CommitRecord, EraAggregate, EraReport, Exclusion, LanguageStats, RawCommit, RawRepository,
    Repository, RepositoryRow, RepositorySample, RepositoryStats, SignalSummary, TermCount,
};
use crate::signal::SignalCategory;
use crate::stats::{issues_per_1k_stars, mean, median, rate_per_100, sample_std_dev};
use crate::util::first_line;
use std::collections::BTreeMap;
use tracing::{debug, warn};

pub const MIN_LANGUAGE_REPOSITORIES: usize = 3;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct EraPartial {
    repositories: u64,
    stars: u64,
    open_issues: u64,
    issue_ratios: Vec<f64>,
    issues_per_year: Vec<f64>,
    close_rates: Vec<f64>,
    contributors: Vec<f64>,
    rows: Vec<RepositoryRow>,
    commit_repositories: u64,
    commits: u64,
    terms: BTreeMap<SignalCategory, BTreeMap<String, u64>>,
    message_lengths: Vec<f64>,
    samples: Vec<(String, Vec<String>)>,
    exclusions: Vec<Exclusion>,
}

impl EraPartial {
    pub fn from_sample(sample: &RepositorySample, config: &AnalysisConfig) -> (Era, Self) {
        let repo = &sample.repository;
        let era = classify_era(&repo.created_at, &config.cutoff);
        let mut partial = EraPartial {
            repositories: 1,
            stars: repo.stars,
            open_issues: repo.open_issues,
            ..Default::default()
        };

        match issues_per_1k_stars(repo.open_issues, repo.stars) {
            Ok(ratio) => {
                partial.issue_ratios.push(ratio);
                partial.rows.push(RepositoryRow {
                    full_name: repo.full_name.clone(),
                    era,
                    created_at: repo.created_at,
                    language: repo.language.clone(),
                    stars: repo.stars,
                    open_issues: repo.open_issues,
                    issues_per_1k_stars: ratio,
                });
            }
            Err(e) => partial.exclude(&repo.full_name, &e),
        }

        partial.issues_per_year.push(repo.issues_per_year(&config.as_of));
        if let Some(rate) = repo.close_rate() {
            partial.close_rates.push(rate);
        }
        if let Some(c) = repo.contributors.filter(|c| *c > 0) {
            partial.contributors.push(c as f64);
        }

        if let Some(commits) = &sample.commits {
            partial.absorb_commits(repo, commits, config);
        }

        (era, partial)
    }

    fn absorb_commits(&mut self, repo: &Repository, commits: &[CommitRecord], config: &AnalysisConfig) {
        let mut lengths = 0usize;
        let mut counted = 0u64;
        let mut samples = Vec::new();

        for commit in commits.iter().take(config.max_commits) {
            if commit.message.is_empty() {
                self.exclude(
                    &format!("{}@{}", repo.full_name, commit.sha),
                    &DebtError::MalformedInput("empty commit message".to_string()),
                );
                continue;
            }

            counted += 1;
            lengths += commit.message.chars().count();

            let signals = config.patterns.classify(&commit.message);
            for (category, fired) in signals.iter() {
                let counts = self.terms.entry(category).or_default();
                for term in fired {
                    *counts.entry((*term).to_string()).or_insert(0) += 1;
                }
            }

            let noteworthy = signals.contains(SignalCategory::Debt)
                || signals.contains(SignalCategory::Frustration);
            if noteworthy && samples.len() < SAMPLES_PER_REPOSITORY {
                samples.push(first_line(&commit.message, SAMPLE_LINE_CHARS));
            }
        }

        if counted == 0 {
            self.exclude(
                &repo.full_name,
                &DebtError::DataInsufficient("no commit messages in window".to_string()),
            );
            return;
        }

        self.commit_repositories += 1;
        self.commits += counted;
        self.message_lengths.push(lengths as f64 / counted as f64);
        if !samples.is_empty() {
            self.samples.push((repo.full_name.clone(), samples));
        }
    }

    fn exclude(&mut self, subject: &str, err: &DebtError) {
        if let Some(exclusion) = Exclusion::from_error(subject, err) {
            debug!(subject, reason = %exclusion.reason, "excluded from aggregate");
            self.exclusions.push(exclusion);
        }
    }

    pub fn merge(&mut self, other: EraPartial) {
        self.repositories += other.repositories;
        self.stars += other.stars;
        self.open_issues += other.open_issues;
        self.issue_ratios.extend(other.issue_ratios);
        self.issues_per_year.extend(other.issues_per_year);
        self.close_rates.extend(other.close_rates);
        self.contributors.extend(other.contributors);
        self.rows.extend(other.rows);
        self.commit_repositories += other.commit_repositories;
        self.commits += other.commits;
        for (category, counts) in other.terms {
            let mine = self.terms.entry(category).or_default();
            for (term, n) in counts {
                *mine.entry(term).or_insert(0) += n;
            }
        }
        self.message_lengths.extend(other.message_lengths);
        self.samples.extend(other.samples);
        self.exclusions.extend(other.exclusions);
    }

    pub fn repositories(&self) -> u64 {
        self.repositories
    }

    pub fn commits(&self) -> u64 {
        self.commits
    }

    pub fn category_count(&self, category: SignalCategory) -> u64 {
        self.terms
            .get(&category)
            .map(|counts| counts.values().sum())
            .unwrap_or(0)
    }

    pub fn finalize(&self, era: Era, config: &AnalysisConfig) -> EraAggregate {
        let ratios = sorted(&self.issue_ratios);
        let per_year = sorted(&self.issues_per_year);
        let close_rates = sorted(&self.close_rates);
        let contributors = sorted(&self.contributors);
        let lengths = sorted(&self.message_lengths);

        let avg = |total: u64| {
            (self.repositories > 0).then(|| total as f64 / self.repositories as f64)
        };

        let repository_stats = RepositoryStats {
            ratio_repositories: ratios.len(),
            avg_issues_per_1k_stars: mean(&ratios),
            median_issues_per_1k_stars: median(&ratios),
            std_dev_ratio: sample_std_dev(&ratios),
            total_stars: self.stars,
            total_open_issues: self.open_issues,
            avg_stars: avg(self.stars),
            avg_open_issues: avg(self.open_issues),
            avg_issues_per_year: mean(&per_year),
            median_issues_per_year: median(&per_year),
            avg_close_rate: mean(&close_rates),
            median_close_rate: median(&close_rates),
            avg_contributors: mean(&contributors),
            median_contributors: median(&contributors),
        };

        let signals = SignalCategory::ALL
            .iter()
            .map(|category| self.signal_summary(*category, config.top_terms))
            .collect();

        let mut samples = self.samples.clone();
        samples.sort();
        let samples = samples
            .into_iter()
            .flat_map(|(_, lines)| lines)
            .take(SAMPLES_PER_ERA)
            .collect();

        let mut exclusions = self.exclusions.clone();
        exclusions.sort();

        EraAggregate {
            era,
            repositories: self.repositories,
            repository_stats,
            commit_repositories: self.commit_repositories,
            total_commits: self.commits,
            signals,
            avg_message_length: mean(&lengths),
            samples,
            exclusions,
        }
    }

    fn signal_summary(&self, category: SignalCategory, top_n: usize) -> SignalSummary {
        let count = self.category_count(category);
        let rate_per_100 = rate_per_100(count, self.commits).ok();

        let mut top_terms: Vec<TermCount> = self
            .terms
            .get(&category)
            .map(|counts| {
                counts
                    .iter()
                    .map(|(term, n)| TermCount {
                        term: term.clone(),
                        count: *n,
                    })
                    .collect()
            })
            .unwrap_or_default();
        top_terms.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.term.cmp(&b.term)));
        top_terms.truncate(top_n);

        SignalSummary {
            category,
            count,
            rate_per_100,
            top_terms,
        }
    }
}

fn sorted(values: &[f64]) -> Vec<f64> {
    let mut v = values.to_vec();
    v.sort_by(f64::total_cmp);
    v
}

/// Two running partials, one per era, plus records that never got an era.
#[derive(Debug, Clone)]
pub struct EraAccumulator<'c> {
    config: &'c AnalysisConfig,
    partials: [EraPartial; 2],
    unclassified: Vec<Exclusion>,
}

impl<'c> EraAccumulator<'c> {
    pub fn new(config: &'c AnalysisConfig) -> Self {
        Self {
            config,
            partials: Default::default(),
            unclassified: Vec::new(),
        }
    }

    pub fn fold<I>(config: &'c AnalysisConfig, samples: I) -> Self
    where
        I: IntoIterator<Item = RepositorySample>,
    {
        samples.into_iter().fold(Self::new(config), |mut acc, sample| {
            acc.push(&sample);
            acc
        })
    }

    pub fn push(&mut self, sample: &RepositorySample) -> Era {
        let (era, partial) = EraPartial::from_sample(sample, self.config);
        self.partials[era.index()].merge(partial);
        era
    }

    /// Validates raw records first. A repository that fails validation is
    /// recorded as unclassified; commits that fail are recorded in the
    /// repository's era and skipped.
    pub fn push_raw(&mut self, raw: RawRepository, commits: Option<Vec<RawCommit>>) -> Option<Era> {
        let subject = raw.full_name.clone().unwrap_or_else(|| "<unnamed>".to_string());
        let repository = match Repository::try_from(raw) {
            Ok(repo) => repo,
            Err(e) => {
                warn!(repository = %subject, error = %e, "skipping malformed repository");
                self.unclassified.extend(Exclusion::from_error(subject, &e));
                return None;
            }
        };

        let era = classify_era(&repository.created_at, &self.config.cutoff);
        let mut sample = RepositorySample::new(repository);

        if let Some(raw_commits) = commits {
            let mut valid = Vec::with_capacity(raw_commits.len());
            for raw_commit in raw_commits {
                let subject = format!(
                    "{}@{}",
                    raw_commit.repository,
                    raw_commit.sha.as_deref().unwrap_or("?")
                );
                match CommitRecord::try_from(raw_commit) {
                    Ok(commit) => valid.push(commit),
                    Err(e) => {
                        warn!(commit = %subject, error = %e, "skipping malformed commit");
                        self.partials[era.index()]
                            .exclusions
                            .extend(Exclusion::from_error(subject, &e));
                    }
                }
            }
            sample = sample.with_commits(valid);
        }

        Some(self.push(&sample))
    }

    pub fn merge(&mut self, other: EraAccumulator<'_>) {
        let [pre, post] = other.partials;
        self.partials[Era::Pre.index()].merge(pre);
        self.partials[Era::Post.index()].merge(post);
        self.unclassified.extend(other.unclassified);
    }

    pub fn partial(&self, era: Era) -> &EraPartial {
        &self.partials[era.index()]
    }

    pub fn repositories(&self) -> u64 {
        self.partials.iter().map(EraPartial::repositories).sum()
    }

    pub fn snapshot(&self) -> EraReport {
        let config = self.config;
        let pre = self.partial(Era::Pre).finalize(Era::Pre, config);
        let post = self.partial(Era::Post).finalize(Era::Post, config);

        let mut rows: Vec<RepositoryRow> = self
            .partials
            .iter()
            .flat_map(|p| p.rows.iter().cloned())
            .collect();
        rows.sort_by(|a, b| a.full_name.cmp(&b.full_name));

        let mut highest = rows.clone();
        highest.sort_by(|a, b| {
            b.issues_per_1k_stars
                .total_cmp(&a.issues_per_1k_stars)
                .then_with(|| a.full_name.cmp(&b.full_name))
        });
        highest.truncate(config.extremes);

        let mut lowest = rows.clone();
        lowest.sort_by(|a, b| {
            a.issues_per_1k_stars
                .total_cmp(&b.issues_per_1k_stars)
                .then_with(|| a.full_name.cmp(&b.full_name))
        });
        lowest.truncate(config.extremes);

        let mut unclassified = self.unclassified.clone();
        unclassified.sort();

        EraReport {
            cutoff: config.cutoff,
            as_of: config.as_of,
            pattern_table_version: config.patterns.version(),
            pre,
            post,
            languages: language_breakdown(&rows),
            highest_ratio: highest,
            lowest_ratio: lowest,
            repositories: rows,
            unclassified,
        }
    }
}

fn language_breakdown(rows: &[RepositoryRow]) -> Vec<LanguageStats> {
    let mut by_language: BTreeMap<&str, Vec<f64>> = BTreeMap::new();
    for row in rows {
        by_language
            .entry(row.language.as_deref().unwrap_or("Unknown"))
            .or_default()
            .push(row.issues_per_1k_stars);
    }

    let mut stats: Vec<LanguageStats> = by_language
        .into_iter()
        .filter(|(_, ratios)| ratios.len() >= MIN_LANGUAGE_REPOSITORIES)
        .filter_map(|(language, ratios)| {
            let ratios = sorted(&ratios);
            Some(LanguageStats {
                language: language.to_string(),
                repositories: ratios.len(),
                avg_issues_per_1k_stars: mean(&ratios)?,
                median_issues_per_1k_stars: median(&ratios)?,
            })
        })
        .collect();

    stats.sort_by(|a, b| {
        b.avg_issues_per_1k_stars
            .total_cmp(&a.avg_issues_per_1k_stars)
            .then_with(|| a.language.cmp(&b.language))
    });
    stats
}
