//! JSON output for scrape runs, reports and actions.
//!
//! Files are grouped by the local date of the run; a second run on the same
//! day with the same stem overwrites the first.
//!
//! ```text
//! json_output_dir/
//! └── 2025-05-06/
//!     ├── scrape.json
//!     └── report.json
//! ```

use crate::utils::today;
use chrono::NaiveDate;
use serde::Serialize;
use std::error::Error;
use std::path::PathBuf;
use tokio::fs;
use tracing::{error, info, instrument};

/// Write `value` to `{json_output_dir}/{today}/{stem}.json`.
///
/// Returns the path written.
pub async fn write_json<T: Serialize>(
    value: &T,
    json_output_dir: &str,
    stem: &str,
) -> Result<PathBuf, Box<dyn Error>> {
    write_json_on(value, json_output_dir, stem, today()).await
}

#[instrument(level = "info", skip(value), fields(%json_output_dir, %stem, %date))]
pub async fn write_json_on<T: Serialize>(
    value: &T,
    json_output_dir: &str,
    stem: &str,
    date: NaiveDate,
) -> Result<PathBuf, Box<dyn Error>> {
    let json = serde_json::to_string_pretty(value)?;

    let full_json_dir = PathBuf::from(json_output_dir).join(date.to_string());
    info!(dir = %full_json_dir.display(), "Ensuring JSON directory exists");
    if let Err(e) = fs::create_dir_all(&full_json_dir).await {
        error!(dir = %full_json_dir.display(), error = %e, "Failed to create JSON dir");
        return Err(e.into());
    }

    let path = full_json_dir.join(format!("{stem}.json"));
    fs::write(&path, json).await?;
    info!(path = %path.display(), "Wrote JSON file");
    Ok(path)
}
