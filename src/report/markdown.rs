//! Markdown rendering of an era report, suitable for pasting into an issue or
//! a write-up.

use super::output::{fmt_change, fmt_value, metric_rows};
use crate::era::Era;
use crate::model::{EraReport, RepositoryRow};
use crate::signal::SignalCategory;
use std::fmt::{self, Write};

pub fn render_markdown(report: &EraReport) -> String {
    let mut out = String::new();
    // Writing into a String cannot fail.
    let _ = write_markdown(&mut out, report);
    out
}

fn write_markdown(out: &mut impl Write, report: &EraReport) -> fmt::Result {
    let cutoff = report.cutoff.format("%Y-%m-%d");
    writeln!(out, "# Technical debt signals: before vs after {cutoff}")?;
    writeln!(out)?;
    writeln!(
        out,
        "Repositories created before {cutoff} are **pre**, on or after are **post**. \
         Ages measured as of {}. Pattern table version {}.",
        report.as_of.format("%Y-%m-%d"),
        report.pattern_table_version
    )?;
    writeln!(out)?;

    writeln!(out, "## Era comparison")?;
    writeln!(out)?;
    writeln!(out, "| Metric | Pre | Post | Change |")?;
    writeln!(out, "|---|---:|---:|---:|")?;
    for row in metric_rows(report) {
        writeln!(
            out,
            "| {} | {} | {} | {} |",
            row.label,
            fmt_value(row.pre, row.places),
            fmt_value(row.post, row.places),
            fmt_change(row.change())
        )?;
    }
    writeln!(out)?;

    writeln!(out, "## Top terms")?;
    writeln!(out)?;
    writeln!(out, "| Category | Pre | Post |")?;
    writeln!(out, "|---|---|---|")?;
    for category in SignalCategory::ALL {
        let terms = |era: Era| {
            report
                .era(era)
                .signal(category)
                .map(|s| {
                    s.top_terms
                        .iter()
                        .map(|t| format!("{} ({})", t.term, t.count))
                        .collect::<Vec<_>>()
                        .join(", ")
                })
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| "-".to_string())
        };
        writeln!(out, "| {} | {} | {} |", category.label(), terms(Era::Pre), terms(Era::Post))?;
    }
    writeln!(out)?;

    if !report.languages.is_empty() {
        writeln!(out, "## By language")?;
        writeln!(out)?;
        writeln!(out, "| Language | Repositories | Avg issues / 1K stars | Median |")?;
        writeln!(out, "|---|---:|---:|---:|")?;
        for lang in &report.languages {
            writeln!(
                out,
                "| {} | {} | {} | {} |",
                lang.language,
                lang.repositories,
                fmt_value(Some(lang.avg_issues_per_1k_stars), 2),
                fmt_value(Some(lang.median_issues_per_1k_stars), 2)
            )?;
        }
        writeln!(out)?;
    }

    write_extremes(out, "Highest issues / 1K stars", &report.highest_ratio)?;
    write_extremes(out, "Lowest issues / 1K stars", &report.lowest_ratio)?;

    for era in Era::ALL {
        let samples = &report.era(era).samples;
        if samples.is_empty() {
            continue;
        }
        writeln!(out, "## Sample messages ({era})")?;
        writeln!(out)?;
        for line in samples {
            writeln!(out, "- `{}`", line.replace('`', "'"))?;
        }
        writeln!(out)?;
    }

    let excluded: Vec<_> = Era::ALL
        .iter()
        .flat_map(|era| report.era(*era).exclusions.iter())
        .chain(report.unclassified.iter())
        .collect();
    if !excluded.is_empty() {
        writeln!(out, "## Exclusions")?;
        writeln!(out)?;
        for exclusion in excluded {
            writeln!(
                out,
                "- {} ({}): {}",
                exclusion.subject,
                exclusion.kind.as_str(),
                exclusion.reason
            )?;
        }
        writeln!(out)?;
    }

    Ok(())
}

fn write_extremes(out: &mut impl Write, title: &str, rows: &[RepositoryRow]) -> fmt::Result {
    if rows.is_empty() {
        return Ok(());
    }
    writeln!(out, "## {title}")?;
    writeln!(out)?;
    writeln!(out, "| Repository | Era | Created | Stars | Open issues | Ratio |")?;
    writeln!(out, "|---|---|---|---:|---:|---:|")?;
    for row in rows {
        writeln!(
            out,
            "| {} | {} | {} | {} | {} | {} |",
            row.full_name,
            row.era,
            row.created_at.format("%Y-%m-%d"),
            row.stars,
            row.open_issues,
            fmt_value(Some(row.issues_per_1k_stars), 2)
        )?;
    }
    writeln!(out)
}
