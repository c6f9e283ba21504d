//! Output generation for scrape runs and status reports.
//!
//! # Submodules
//!
//! - [`json`]: Writes any serializable payload (scrape run, report, action
//!   outcome) to a dated JSON file
//! - [`markdown`]: Renders a [`Report`](crate::report::Report) as Markdown
//! - [`indexes`]: Appends each written report to a running index
//!
//! # Output Structure
//!
//! ```text
//! json_output_dir/
//! ├── 2025-05-06/
//! │   ├── scrape.json
//! │   ├── report.json
//! │   └── mark-expired.json
//!
//! markdown_output_dir/
//! ├── 2025-05-06_report.md   # Full report
//! └── reports.md             # Index of all reports
//! ```

pub mod indexes;
pub mod json;
pub mod markdown;
