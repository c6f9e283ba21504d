//! Markdown rendering of a status [`Report`].

use crate::report::Report;
use crate::utils::upcase;
use chrono::NaiveDate;
use std::error::Error;
use std::fmt::Write;
use tokio::fs;
use tracing::{info, instrument};

fn bullet_section(md: &mut String, title: &str, items: &[String], empty: &str) {
    writeln!(md, "## {}\n", title).unwrap();
    if items.is_empty() {
        writeln!(md, "_{}_\n", empty).unwrap();
        return;
    }
    for item in items {
        writeln!(md, "- {}", item).unwrap();
    }
    writeln!(md).unwrap();
}

/// Render `report` as a Markdown document dated `date`.
pub fn report_to_markdown(report: &Report, date: NaiveDate) -> String {
    let mut md = String::new();
    let s = &report.summary;

    writeln!(md, "# Application status report for {}\n", date).unwrap();

    bullet_section(&mut md, "Alerts", &report.alerts, "No alerts.");

    writeln!(md, "## Summary\n").unwrap();
    writeln!(md, "| Table | Open | Closed | Rate |").unwrap();
    writeln!(md, "|---|---|---|---|").unwrap();
    let rates = &report.rates;
    for (table, open, closed, rate) in [
        ("institutions", s.open_institutions, s.closed_institutions, rates.institution_open_rate),
        ("programs", s.open_programs, s.closed_programs, rates.program_open_rate),
        ("bursaries", s.active_bursaries, s.expired_bursaries, rates.bursary_active_rate),
    ] {
        writeln!(md, "| {} | {} | {} | {}% |", upcase(table), open, closed, rate).unwrap();
    }
    writeln!(md).unwrap();

    if !s.upcoming_deadlines.is_empty() {
        writeln!(md, "## Upcoming deadlines\n").unwrap();
        for u in &s.upcoming_deadlines {
            writeln!(
                md,
                "- **{}** ({}) closes {} ({} day(s) left)",
                u.name,
                upcase(&u.table),
                u.deadline,
                u.days_left
            )
            .unwrap();
        }
        writeln!(md).unwrap();
    }

    bullet_section(&mut md, "Insights", &report.insights, "Nothing to report.");
    bullet_section(
        &mut md,
        "Recommendations",
        &report.recommendations,
        "No action needed.",
    );

    md
}

/// Write the report to `{markdown_output_dir}/{date}_report.md`.
///
/// Returns the file name (not the full path) for index updates.
#[instrument(level = "info", skip(report), fields(%markdown_output_dir, %date))]
pub async fn write_report(
    report: &Report,
    markdown_output_dir: &str,
    date: NaiveDate,
) -> Result<String, Box<dyn Error>> {
    fs::create_dir_all(markdown_output_dir).await?;
    let filename = format!("{}_report.md", date);
    let path = format!("{}/{}", markdown_output_dir.trim_end_matches('/'), filename);
    fs::write(&path, report_to_markdown(report, date)).await?;
    info!(%path, "Wrote Markdown report");
    Ok(filename)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{StatusSummary, UpcomingDeadline};
    use crate::report::build_report;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 1).unwrap()
    }

    #[test]
    fn test_markdown_contains_sections() {
        let summary = StatusSummary {
            open_institutions: 3,
            closed_institutions: 1,
            active_bursaries: 0,
            expired_bursaries: 2,
            upcoming_deadlines: vec![UpcomingDeadline {
                table: "institutions".to_string(),
                name: "UCT".to_string(),
                deadline: NaiveDate::from_ymd_opt(2025, 6, 4).unwrap(),
                days_left: 3,
            }],
            ..StatusSummary::default()
        };
        let md = report_to_markdown(&build_report(&summary), date());

        assert!(md.starts_with("# Application status report for 2025-06-01"));
        assert!(md.contains("- CRITICAL: No active bursaries available"));
        assert!(md.contains("| Institutions | 3 | 1 | 75% |"));
        assert!(md.contains("- **UCT** (Institutions) closes 2025-06-04 (3 day(s) left)"));
        assert!(md.contains("## Recommendations"));
    }

    #[test]
    fn test_markdown_marks_empty_sections() {
        let summary = StatusSummary {
            open_institutions: 1,
            active_bursaries: 1,
            ..StatusSummary::default()
        };
        let md = report_to_markdown(&build_report(&summary), date());
        assert!(md.contains("_No alerts._"));
        assert!(md.contains("_No action needed._"));
        assert!(!md.contains("## Upcoming deadlines"));
    }
}
