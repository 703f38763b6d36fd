use crate::cache::Cache;
use crate::era::Era;
use crate::model::{EraAggregate, EraReport, ReportOutput, SCHEMA_VERSION};
use crate::signal::SignalCategory;
use crate::stats::round_to;
use anyhow::Result;
use chrono::Utc;
use console::style;

pub(crate) struct MetricRow {
    pub label: String,
    pub pre: Option<f64>,
    pub post: Option<f64>,
    pub places: u32,
}

impl MetricRow {
    fn new(label: impl Into<String>, pre: Option<f64>, post: Option<f64>, places: u32) -> Self {
        Self {
            label: label.into(),
            pre,
            post,
            places,
        }
    }

    /// Relative change from pre to post, in percent.
    pub fn change(&self) -> Option<f64> {
        match (self.pre, self.post) {
            (Some(pre), Some(post)) if pre != 0.0 => Some((post - pre) / pre * 100.0),
            _ => None,
        }
    }
}

pub(crate) fn fmt_value(value: Option<f64>, places: u32) -> String {
    match value {
        Some(v) => format!("{:.*}", places as usize, round_to(v, places)),
        None => "n/a".to_string(),
    }
}

pub(crate) fn fmt_change(change: Option<f64>) -> String {
    match change {
        Some(c) => format!("{:+.1}%", round_to(c, 1)),
        None => "-".to_string(),
    }
}

pub(crate) fn metric_rows(report: &EraReport) -> Vec<MetricRow> {
    let (pre, post) = (&report.pre, &report.post);
    let both = |f: fn(&EraAggregate) -> Option<f64>| (f(pre), f(post));
    let mut rows = Vec::new();

    let mut push = |label: &str, (a, b): (Option<f64>, Option<f64>), places: u32| {
        rows.push(MetricRow::new(label, a, b, places));
    };

    push("Repositories", both(|e| Some(e.repositories as f64)), 0);
    push("Avg stars", both(|e| e.repository_stats.avg_stars), 0);
    push("Avg open issues", both(|e| e.repository_stats.avg_open_issues), 1);
    push("Avg issues / 1K stars", both(|e| e.repository_stats.avg_issues_per_1k_stars), 2);
    push("Median issues / 1K stars", both(|e| e.repository_stats.median_issues_per_1k_stars), 2);
    push("Std dev issues / 1K stars", both(|e| e.repository_stats.std_dev_ratio), 2);
    push("Avg issues / year", both(|e| e.repository_stats.avg_issues_per_year), 1);
    push("Median issues / year", both(|e| e.repository_stats.median_issues_per_year), 1);
    push("Avg close rate %", both(|e| e.repository_stats.avg_close_rate), 1);
    push("Avg contributors", both(|e| e.repository_stats.avg_contributors), 1);
    push("Commits analyzed", both(|e| Some(e.total_commits as f64)), 0);
    push("Avg message length", both(|e| e.avg_message_length), 1);

    for category in SignalCategory::ALL {
        let rate = |e: &EraAggregate| e.signal(category).and_then(|s| s.rate_per_100);
        push(&format!("{} / 100 commits", category.label()), (rate(pre), rate(post)), 2);
    }
    rows
}

pub fn output_json(report: &EraReport, cache: &Cache) -> Result<()> {
    let output = ReportOutput {
        version: SCHEMA_VERSION,
        generated_at: Utc::now(),
        cache_path: cache.path().to_string_lossy().to_string(),
        report: report.clone(),
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

pub fn output_ndjson(report: &EraReport) -> Result<()> {
    for era in Era::ALL {
        println!("{}", serde_json::to_string(report.era(era))?);
    }
    Ok(())
}

pub fn output_table(report: &EraReport) -> Result<()> {
    if report.pre.repositories == 0 && report.post.repositories == 0 {
        println!("No repositories in cache. Run `debtscope fetch` first.");
        return Ok(());
    }

    println!(
        "{}",
        style(format!(
            "Era comparison: created before vs on/after {}",
            report.cutoff.format("%Y-%m-%d")
        ))
        .bold()
    );
    println!("{}", "─".repeat(72));
    println!(
        "{:<30} {:>12} {:>12} {:>12}",
        style("Metric").bold(),
        style("Pre").bold(),
        style("Post").bold(),
        style("Change").bold()
    );

    for row in metric_rows(report) {
        let change = row.change();
        let change_text = format!("{:>12}", fmt_change(change));
        let change_styled = match change {
            Some(c) if c > 0.0 => style(change_text).red(),
            Some(c) if c < 0.0 => style(change_text).green(),
            _ => style(change_text).dim(),
        };
        println!(
            "{:<30} {:>12} {:>12} {}",
            row.label,
            fmt_value(row.pre, row.places),
            fmt_value(row.post, row.places),
            change_styled
        );
    }

    println!("\n{}", style("Top terms").bold());
    for category in SignalCategory::ALL {
        for era in Era::ALL {
            let Some(summary) = report.era(era).signal(category) else {
                continue;
            };
            if summary.top_terms.is_empty() {
                continue;
            }
            let terms = summary
                .top_terms
                .iter()
                .map(|t| format!("{} ({})", t.term, t.count))
                .collect::<Vec<_>>()
                .join(", ");
            println!("  {:<12} {:<5} {}", category.label(), era.as_str(), style(terms).cyan());
        }
    }

    if !report.highest_ratio.is_empty() {
        println!("\n{}", style("Highest issues / 1K stars").bold());
        for row in &report.highest_ratio {
            println!(
                "  {:<40} {:<5} {:>8}",
                row.full_name,
                row.era.as_str(),
                fmt_value(Some(row.issues_per_1k_stars), 2)
            );
        }
    }

    let exclusions = report.pre.exclusions.len() + report.post.exclusions.len() + report.unclassified.len();
    if exclusions > 0 {
        println!(
            "\n{} {} records excluded (see --json for details)",
            style("note:").yellow(),
            exclusions
        );
    }

    Ok(())
}
