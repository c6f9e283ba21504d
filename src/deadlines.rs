//! Deadline and status maintenance over the persisted tables.
//!
//! A row is *open* (institutions, programs) or *active* (bursaries) when its
//! deadline is unknown or falls on or after today. The stored `active` flag
//! is only brought in line with that rule when an operator runs
//! [`DeadlineManager::mark_expired_items_inactive`].
//!
//! The status summary fails as a whole when any table cannot be read, because
//! a partial count would read as "nothing open". The expiry sweep and the
//! deadline check isolate failures per table instead.

use crate::models::{StatusSummary, UpcomingDeadline};
use crate::store::{Filter, Patch, Row, Store, StoreError, Table};
use crate::utils::today;
use chrono::NaiveDate;
use serde::Serialize;
use std::cmp::Ordering;
use tracing::{error, info, instrument, warn};

/// How many days ahead a deadline counts as upcoming.
pub const UPCOMING_WINDOW_DAYS: i64 = 30;

fn is_open(row: &Row, today: NaiveDate) -> bool {
    row.deadline.is_none_or(|d| d >= today)
}

fn by_deadline(a: &UpcomingDeadline, b: &UpcomingDeadline) -> Ordering {
    a.deadline.cmp(&b.deadline).then_with(|| a.name.cmp(&b.name))
}

/// A table that could not be processed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableFailure {
    pub table: Table,
    pub message: String,
}

/// Per-table row counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TableCounts {
    pub institutions: usize,
    pub programs: usize,
    pub bursaries: usize,
}

impl TableCounts {
    fn set(&mut self, table: Table, n: usize) {
        match table {
            Table::Institutions => self.institutions = n,
            Table::Programs => self.programs = n,
            Table::Bursaries => self.bursaries = n,
        }
    }

    pub fn total(&self) -> usize {
        self.institutions + self.programs + self.bursaries
    }
}

/// Outcome of [`DeadlineManager::mark_expired_items_inactive`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpiryReport {
    pub institutions_updated: usize,
    pub programs_updated: usize,
    pub bursaries_updated: usize,
    pub errors: Vec<TableFailure>,
}

impl ExpiryReport {
    pub fn total_updated(&self) -> usize {
        self.institutions_updated + self.programs_updated + self.bursaries_updated
    }
}

/// Outcome of [`DeadlineManager::check_deadlines`]: what an expiry sweep
/// would change, plus what is about to close. Changes nothing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeadlineCheck {
    pub expired_still_active: TableCounts,
    pub upcoming: Vec<UpcomingDeadline>,
    pub errors: Vec<TableFailure>,
}

/// Reads and maintains deadline state through a [`Store`].
#[derive(Debug)]
pub struct DeadlineManager<'s, S> {
    store: &'s S,
    upcoming_window_days: i64,
}

impl<'s, S> DeadlineManager<'s, S>
where
    S: Store,
{
    pub fn new(store: &'s S) -> Self {
        Self {
            store,
            upcoming_window_days: UPCOMING_WINDOW_DAYS,
        }
    }

    #[cfg(test)]
    pub fn with_window_days(mut self, days: i64) -> Self {
        self.upcoming_window_days = days;
        self
    }

    fn upcoming_in(&self, table: Table, rows: &[Row], today: NaiveDate) -> Vec<UpcomingDeadline> {
        let horizon = today + chrono::Duration::days(self.upcoming_window_days);
        rows.iter()
            .filter(|r| r.active)
            .filter_map(|r| {
                let deadline = r.deadline.filter(|d| *d >= today && *d <= horizon)?;
                Some(UpcomingDeadline {
                    table: table.to_string(),
                    name: r.name.clone(),
                    deadline,
                    days_left: (deadline - today).num_days(),
                })
            })
            .collect()
    }

    pub async fn application_status_summary(&self) -> Result<StatusSummary, StoreError> {
        self.application_status_summary_at(today()).await
    }

    /// Count open/closed rows per table as of `today`.
    #[instrument(level = "info", skip(self))]
    pub async fn application_status_summary_at(
        &self,
        today: NaiveDate,
    ) -> Result<StatusSummary, StoreError> {
        let all = Filter::all();
        let (institutions, programs, bursaries) = tokio::join!(
            self.store.select(Table::Institutions, &all),
            self.store.select(Table::Programs, &all),
            self.store.select(Table::Bursaries, &all),
        );

        for (table, res) in [
            (Table::Institutions, &institutions),
            (Table::Programs, &programs),
            (Table::Bursaries, &bursaries),
        ] {
            if let Err(e) = res {
                error!(%table, error = %e, "Status query failed");
            }
        }
        let (institutions, programs, bursaries) = (institutions?, programs?, bursaries?);

        let open_institutions = institutions.iter().filter(|r| is_open(r, today)).count();
        let open_programs = programs.iter().filter(|r| is_open(r, today)).count();
        let active_bursaries = bursaries.iter().filter(|r| is_open(r, today)).count();

        let mut upcoming_deadlines = self.upcoming_in(Table::Institutions, &institutions, today);
        upcoming_deadlines.extend(self.upcoming_in(Table::Programs, &programs, today));
        upcoming_deadlines.extend(self.upcoming_in(Table::Bursaries, &bursaries, today));
        upcoming_deadlines.sort_by(by_deadline);

        let summary = StatusSummary {
            open_institutions,
            closed_institutions: institutions.len() - open_institutions,
            open_programs,
            closed_programs: programs.len() - open_programs,
            active_bursaries,
            expired_bursaries: bursaries.len() - active_bursaries,
            upcoming_deadlines,
        };
        info!(
            open_institutions = summary.open_institutions,
            open_programs = summary.open_programs,
            active_bursaries = summary.active_bursaries,
            upcoming = summary.upcoming_deadlines.len(),
            "Computed status summary"
        );
        Ok(summary)
    }

    async fn expire_table(&self, table: Table, today: NaiveDate) -> Result<usize, StoreError> {
        let stale = self
            .store
            .select(table, &Filter::all().active(true).deadline_before(today))
            .await?;
        if stale.is_empty() {
            return Ok(0);
        }
        let ids = stale.iter().map(|r| r.id).collect();
        // Re-check `active` so rows flipped since the select are not counted twice.
        self.store
            .update(table, &Filter::ids(ids).active(true), &Patch::deactivate())
            .await
    }

    pub async fn mark_expired_items_inactive(&self) -> ExpiryReport {
        self.mark_expired_items_inactive_at(today()).await
    }

    /// Flip every active row whose deadline is before `today` to inactive.
    ///
    /// Idempotent: a second call with no new data changes nothing.
    #[instrument(level = "info", skip(self))]
    pub async fn mark_expired_items_inactive_at(&self, today: NaiveDate) -> ExpiryReport {
        let mut counts = TableCounts::default();
        let mut errors = Vec::new();

        for table in Table::ALL {
            match self.expire_table(table, today).await {
                Ok(n) => {
                    info!(%table, updated = n, "Marked expired rows inactive");
                    counts.set(table, n);
                }
                Err(e) => {
                    error!(%table, error = %e, "Expiry sweep failed for table; continuing");
                    errors.push(TableFailure {
                        table,
                        message: e.to_string(),
                    });
                }
            }
        }

        ExpiryReport {
            institutions_updated: counts.institutions,
            programs_updated: counts.programs,
            bursaries_updated: counts.bursaries,
            errors,
        }
    }

    pub async fn check_deadlines(&self) -> DeadlineCheck {
        self.check_deadlines_at(today()).await
    }

    /// Report stale-but-active rows and upcoming deadlines without writing.
    #[instrument(level = "info", skip(self))]
    pub async fn check_deadlines_at(&self, today: NaiveDate) -> DeadlineCheck {
        let mut check = DeadlineCheck::default();

        for table in Table::ALL {
            match self.store.select(table, &Filter::all()).await {
                Ok(rows) => {
                    let stale = rows.iter().filter(|r| r.active && !is_open(r, today)).count();
                    if stale > 0 {
                        warn!(%table, stale, "Rows past their deadline are still active");
                    }
                    check.expired_still_active.set(table, stale);
                    check.upcoming.extend(self.upcoming_in(table, &rows, today));
                }
                Err(e) => {
                    error!(%table, error = %e, "Deadline check failed for table; continuing");
                    check.errors.push(TableFailure {
                        table,
                        message: e.to_string(),
                    });
                }
            }
        }

        check.upcoming.sort_by(by_deadline);
        check
    }
}
