//! Running index of written Markdown reports.
//!
//! `reports.md` lists every report, newest first. Re-running on the same day
//! rewrites that day's report file but never duplicates its index entry.

use chrono::NaiveDate;
use std::error::Error;
use std::path::Path;
use tokio::fs;
use tracing::{info, instrument};

pub const INDEX_HEADER: &str = "# Application Status Reports";

/// Insert a link to `markdown_filename` under the index header.
#[instrument(
    level = "info",
    skip_all,
    fields(%markdown_output_dir, %date, file = %markdown_filename)
)]
pub async fn update_reports_index(
    markdown_output_dir: &str,
    date: NaiveDate,
    markdown_filename: &str,
) -> Result<(), Box<dyn Error>> {
    let index_path = format!("{}/reports.md", markdown_output_dir.trim_end_matches('/'));
    let content = if Path::new(&index_path).exists() {
        fs::read_to_string(&index_path).await?
    } else {
        format!("{}\n", INDEX_HEADER)
    };

    let entry = format!("- [{} Report](./{})", date, markdown_filename);
    let mut lines: Vec<String> = content.lines().map(|l| l.to_string()).collect();

    if lines.iter().any(|l| l.trim() == entry) {
        info!(path = %index_path, "Report already indexed");
        return Ok(());
    }

    match lines.iter().position(|l| l.starts_with(INDEX_HEADER)) {
        Some(pos) => {
            if lines.get(pos + 1).is_none_or(|l| !l.is_empty()) {
                lines.insert(pos + 1, String::new());
            }
            lines.insert(pos + 2, entry);
        }
        None => lines.push(entry),
    }

    fs::write(&index_path, lines.join("\n") + "\n").await?;
    info!(path = %index_path, "Updated reports index");
    Ok(())
}
