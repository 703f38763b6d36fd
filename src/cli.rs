use crate::collect::commits::CommitOptions;
use crate::collect::repositories::FetchOptions;
use crate::config::{
    AnalysisConfig, AnalysisConfigBuilder, SearchFilter, DEFAULT_EXTREMES, DEFAULT_LANGUAGES, DEFAULT_MAX_COMMITS,
    DEFAULT_TOP_TERMS,
};
use crate::era::default_cutoff;
use crate::report::{ReportFormat, ReportOptions};
use crate::signal::PatternTableSpec;
use crate::util::parse_instant;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{ArgAction, Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "debtscope")]
#[command(about = "Compare technical-debt signals between repositories created before and after a cutoff")]
#[command(version)]
pub struct Cli {
    #[clap(flatten)]
    pub common: CommonArgs,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Args, Clone, Debug)]
pub struct CommonArgs {
    #[arg(long, global = true, help = "Directory holding the cache database [default: ./.debtscope]")]
    pub cache: Option<PathBuf>,

    #[arg(long, global = true, env = "GITHUB_TOKEN", hide_env_values = true, help = "GitHub API token")]
    pub token: Option<String>,

    #[arg(long, global = true, help = "GitHub API base URL")]
    pub api_url: Option<String>,

    #[arg(long, global = true, help = "Era cutoff (RFC3339 or YYYY-MM-DD) [default: 2022-01-01]")]
    pub cutoff: Option<String>,

    #[arg(long, global = true, help = "Pattern table JSON file")]
    pub patterns: Option<PathBuf>,

    #[arg(short, long, global = true, action = ArgAction::Count, help = "More log output (repeatable)")]
    pub verbose: u8,
}

impl CommonArgs {
    pub fn config_builder(&self) -> Result<AnalysisConfigBuilder> {
        let mut builder = AnalysisConfig::builder();
        if let Some(cutoff) = &self.cutoff {
            builder = builder.cutoff(cutoff.clone());
        }
        if let Some(path) = &self.patterns {
            builder = builder
                .patterns_file(path)
                .with_context(|| format!("Failed to load pattern table {}", path.display()))?;
        }
        Ok(builder)
    }

    pub fn cutoff(&self) -> Result<DateTime<Utc>> {
        match &self.cutoff {
            Some(raw) => parse_instant(raw).with_context(|| format!("Invalid cutoff {raw:?}")),
            None => Ok(default_cutoff()),
        }
    }

    pub fn pattern_table(&self) -> Result<PatternTableSpec> {
        let spec = match &self.patterns {
            Some(path) => PatternTableSpec::load(path)
                .with_context(|| format!("Failed to load pattern table {}", path.display()))?,
            None => PatternTableSpec::reference(),
        };
        let table = spec.compile().context("Invalid pattern table")?;
        Ok(table.to_spec())
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Search GitHub for repositories of both eras and cache them
    Fetch {
        #[arg(long, default_value_t = 1000, help = "Minimum stars")]
        min_stars: u64,

        #[arg(long = "language", help = "Language to search (repeatable)")]
        languages: Vec<String>,

        #[arg(long, default_value_t = 200, help = "Maximum repositories to keep")]
        max_repos: usize,

        #[arg(long, default_value_t = 30, help = "Results per search query")]
        per_query: u32,

        #[arg(long, help = "Fetch issue and contributor counts for every repository")]
        extended: bool,

        #[arg(long, default_value_t = 0, help = "Fetch issue and contributor counts for the N most-starred")]
        enrich_top: usize,

        #[arg(long, default_value_t = 4, help = "Concurrent API requests")]
        workers: usize,
    },
    /// Fetch recent commit windows for cached repositories
    Commits {
        #[arg(long, default_value_t = 30, help = "Repositories to sample, split across eras")]
        max_repos: usize,

        #[arg(long, default_value_t = DEFAULT_MAX_COMMITS, help = "Commits per repository")]
        commits_per_repo: i64,

        #[arg(long, help = "Refetch repositories that already have a commit window")]
        refresh: bool,

        #[arg(long, default_value_t = 4, help = "Concurrent API requests")]
        workers: usize,
    },
    /// Aggregate cached data into the era comparison
    Report {
        #[arg(long, help = "Output as JSON")]
        json: bool,

        #[arg(long, help = "Output as NDJSON")]
        ndjson: bool,

        #[arg(long, help = "Output as Markdown")]
        markdown: bool,

        #[arg(long, default_value_t = DEFAULT_MAX_COMMITS, help = "Commits per repository to classify")]
        max_commits: i64,

        #[arg(long, default_value_t = DEFAULT_TOP_TERMS, help = "Top terms per signal category")]
        top_terms: usize,

        #[arg(long, default_value_t = DEFAULT_EXTREMES, help = "Repositories listed at each ratio extreme")]
        extremes: usize,

        #[arg(long, help = "Reference date for age-based metrics [default: latest fetch]")]
        as_of: Option<String>,
    },
    /// Print the active pattern table as JSON
    Patterns,
}

impl Cli {
    pub fn parse() -> Self {
        <Self as Parser>::parse()
    }

    pub fn execute(self) -> Result<()> {
        crate::logging::init_logging(self.common.verbose);

        match self.command {
            Commands::Fetch {
                min_stars,
                languages,
                max_repos,
                per_query,
                extended,
                enrich_top,
                workers,
            } => {
                let languages = if languages.is_empty() {
                    DEFAULT_LANGUAGES.iter().map(|l| l.to_string()).collect()
                } else {
                    languages
                };
                let opts = FetchOptions {
                    filter: SearchFilter {
                        min_stars,
                        languages,
                        max_repos,
                        per_query,
                    },
                    extended,
                    enrich_top,
                    workers,
                };
                crate::collect::exec_repositories(self.common, opts)
            }
            Commands::Commits {
                max_repos,
                commits_per_repo,
                refresh,
                workers,
            } => {
                if commits_per_repo <= 0 {
                    anyhow::bail!("--commits-per-repo must be positive, got {commits_per_repo}");
                }
                let opts = CommitOptions {
                    max_repos,
                    commits_per_repo: commits_per_repo as usize,
                    refresh,
                    workers,
                };
                crate::collect::exec_commits(self.common, opts)
            }
            Commands::Report {
                json,
                ndjson,
                markdown,
                max_commits,
                top_terms,
                extremes,
                as_of,
            } => {
                let format = if json {
                    ReportFormat::Json
                } else if ndjson {
                    ReportFormat::Ndjson
                } else if markdown {
                    ReportFormat::Markdown
                } else {
                    ReportFormat::Table
                };
                let opts = ReportOptions {
                    format,
                    max_commits,
                    top_terms,
                    extremes,
                    as_of,
                };
                crate::report::exec(self.common, opts)
            }
            Commands::Patterns => {
                let spec = self.common.pattern_table()?;
                println!("{}", serde_json::to_string_pretty(&spec)?);
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn global_flags_parse_after_subcommand() {
        let cli = Cli::try_parse_from([
            "debtscope",
            "report",
            "--json",
            "--cutoff",
            "2021-06-01",
            "--cache",
            "/tmp/x",
        ])
        .unwrap();
        assert_eq!(cli.common.cutoff.as_deref(), Some("2021-06-01"));
        assert!(matches!(cli.command, Commands::Report { json: true, .. }));
    }

    #[test]
    fn fetch_languages_repeat() {
        let cli = Cli::try_parse_from(["debtscope", "fetch", "--language", "rust", "--language", "go"]).unwrap();
        match cli.command {
            Commands::Fetch { languages, min_stars, .. } => {
                assert_eq!(languages, vec!["rust", "go"]);
                assert_eq!(min_stars, 1000);
            }
            _ => panic!("expected fetch"),
        }
    }

    #[test]
    fn bad_cutoff_fails_config() {
        let cli = Cli::try_parse_from(["debtscope", "--cutoff", "yesterday-ish", "patterns"]).unwrap();
        assert!(cli.common.cutoff().is_err());
    }

    #[test]
    fn cutoff_defaults_when_unset() {
        let cli = Cli::try_parse_from(["debtscope", "patterns"]).unwrap();
        assert_eq!(cli.common.cutoff().unwrap(), default_cutoff());
    }
}
