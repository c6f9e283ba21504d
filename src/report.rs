//! Human-facing status report derived from a [`StatusSummary`].
//!
//! Pure computation: rates, insights, alerts and recommendations come from
//! fixed thresholds over the summary counts. No I/O, no clock.

use crate::models::StatusSummary;
use serde::{Deserialize, Serialize};

/// Bursary active ratio under which listings are considered stale.
pub const BURSARY_STALE_RATIO: f64 = 0.3;
/// Institution open rate (percent) under which deadlines need refreshing.
pub const LOW_OPEN_RATE: u32 = 50;
/// Open rate (percent) at or above which availability is called strong.
pub const STRONG_OPEN_RATE: u32 = 80;
/// Deadlines this close (in days) raise an alert.
pub const URGENT_DAYS: i64 = 7;

pub const ALERT_NO_INSTITUTIONS: &str =
    "CRITICAL: No institutions are currently open for applications";
pub const ALERT_NO_BURSARIES: &str = "CRITICAL: No active bursaries available";
pub const ALERT_NO_PROGRAMS: &str = "WARNING: No programs are currently accepting applications";

/// Percentage of `part` in `total`, rounded. Zero when `total` is zero.
pub fn percentage(part: usize, total: usize) -> u32 {
    if total == 0 {
        return 0;
    }
    (part as f64 / total as f64 * 100.0).round() as u32
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Rates {
    pub institution_open_rate: u32,
    pub program_open_rate: u32,
    pub bursary_active_rate: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub summary: StatusSummary,
    pub rates: Rates,
    pub insights: Vec<String>,
    pub alerts: Vec<String>,
    pub recommendations: Vec<String>,
}

impl Report {
    pub fn has_critical_alerts(&self) -> bool {
        self.alerts.iter().any(|a| a.starts_with("CRITICAL"))
    }
}

/// Build the report for `summary`.
pub fn build_report(summary: &StatusSummary) -> Report {
    let rates = Rates {
        institution_open_rate: percentage(summary.open_institutions, summary.total_institutions()),
        program_open_rate: percentage(summary.open_programs, summary.total_programs()),
        bursary_active_rate: percentage(summary.active_bursaries, summary.total_bursaries()),
    };

    let mut insights = Vec::new();
    let mut alerts = Vec::new();
    let mut recommendations = Vec::new();

    insights.push(format!(
        "{} of {} institutions are open for applications ({}%)",
        summary.open_institutions,
        summary.total_institutions(),
        rates.institution_open_rate
    ));
    if summary.total_programs() > 0 {
        insights.push(format!(
            "{} of {} programs are accepting applications ({}%)",
            summary.open_programs,
            summary.total_programs(),
            rates.program_open_rate
        ));
    }
    insights.push(format!(
        "{} of {} bursaries are active ({}%)",
        summary.active_bursaries,
        summary.total_bursaries(),
        rates.bursary_active_rate
    ));
    if summary.total_institutions() > 0 && rates.institution_open_rate >= STRONG_OPEN_RATE {
        insights.push("Institutions show strong availability for applications".to_string());
    }
    if summary.total_bursaries() > 0 && rates.bursary_active_rate >= STRONG_OPEN_RATE {
        insights.push("Bursaries show strong availability".to_string());
    }

    if summary.open_institutions == 0 {
        alerts.push(ALERT_NO_INSTITUTIONS.to_string());
    }
    if summary.active_bursaries == 0 {
        alerts.push(ALERT_NO_BURSARIES.to_string());
    }
    if summary.total_programs() > 0 && summary.open_programs == 0 {
        alerts.push(ALERT_NO_PROGRAMS.to_string());
    }
    let urgent = summary
        .upcoming_deadlines
        .iter()
        .filter(|u| u.days_left <= URGENT_DAYS)
        .count();
    if urgent > 0 {
        alerts.push(format!(
            "WARNING: {urgent} deadline(s) close within {URGENT_DAYS} days"
        ));
    }

    let total_bursaries = summary.total_bursaries();
    if total_bursaries > 0
        && (summary.active_bursaries as f64 / total_bursaries as f64) < BURSARY_STALE_RATIO
    {
        recommendations
            .push("Refresh bursary listings: most known bursaries have expired".to_string());
    }
    if summary.total_institutions() > 0 && rates.institution_open_rate < LOW_OPEN_RATE {
        recommendations.push(
            "Update institution deadlines: fewer than half are open for applications".to_string(),
        );
    }
    if summary.closed_institutions + summary.closed_programs + summary.expired_bursaries > 0 {
        recommendations
            .push("Run mark-expired to deactivate records whose deadline has passed".to_string());
    }

    Report {
        summary: summary.clone(),
        rates,
        insights,
        alerts,
        recommendations,
    }
}
