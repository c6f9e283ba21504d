//! Persisted institutions, programs and bursaries.
//!
//! The [`Store`] trait is the generic relational interface the deadline
//! manager works against: select / insert / update / delete over one of three
//! tables, narrowed by a [`Filter`]. [`JsonStore`] implements it with an
//! in-memory table set that is optionally flushed to a JSON file after every
//! write.
//!
//! # File Layout
//!
//! ```text
//! {
//!   "nextId": 4,
//!   "institutions": [ { "id": 1, "name": "...", "deadline": "2025-09-30", "active": true, ... } ],
//!   "programs": [ ... ],
//!   "bursaries": [ ... ]
//! }
//! ```

use crate::models::{ScrapeResult, ScrapedBursary, ScrapedInstitution};
use crate::utils::{looks_truncated, today};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument, warn};

/// The tables the pipeline reads and writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Table {
    Institutions,
    Programs,
    Bursaries,
}

impl Table {
    pub const ALL: [Table; 3] = [Table::Institutions, Table::Programs, Table::Bursaries];

    pub fn as_str(self) -> &'static str {
        match self {
            Table::Institutions => "institutions",
            Table::Programs => "programs",
            Table::Bursaries => "bursaries",
        }
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure talking to the persisted store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("store file {path} is truncated: {source}")]
    Truncated {
        path: String,
        source: serde_json::Error,
    },
    #[error("store data is malformed: {0}")]
    Malformed(#[from] serde_json::Error),
    #[cfg(test)]
    #[error("{table} table unavailable: {message}")]
    Unavailable { table: Table, message: String },
}

/// One persisted row. Institutions use `active` as "accepting applications",
/// programs as "available" and bursaries as "is active".
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Row {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub deadline: Option<NaiveDate>,
    pub active: bool,
    #[serde(default)]
    pub source: Option<String>,
    pub updated_at: DateTime<Utc>,
}

/// A row to be inserted; the store assigns `id` and `updated_at`.
#[derive(Debug, Clone, PartialEq)]
pub struct NewRow {
    pub name: String,
    pub category: Option<String>,
    pub deadline: Option<NaiveDate>,
    pub active: bool,
    pub source: Option<String>,
}

impl NewRow {
    pub fn new(name: impl Into<String>, deadline: Option<NaiveDate>, active: bool) -> Self {
        Self {
            name: name.into(),
            category: None,
            deadline,
            active,
            source: None,
        }
    }

    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

/// Row predicate. Every field that is set must match; an empty filter
/// matches every row. Rows without a deadline never match a deadline bound.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    pub ids: Option<Vec<u64>>,
    pub active: Option<bool>,
    /// `deadline < date`
    pub deadline_before: Option<NaiveDate>,
    /// `deadline >= date`
    pub deadline_from: Option<NaiveDate>,
    /// `deadline <= date`
    pub deadline_to: Option<NaiveDate>,
}

impl Filter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn ids(ids: Vec<u64>) -> Self {
        Self {
            ids: Some(ids),
            ..Self::default()
        }
    }

    pub fn active(mut self, active: bool) -> Self {
        self.active = Some(active);
        self
    }

    pub fn deadline_before(mut self, date: NaiveDate) -> Self {
        self.deadline_before = Some(date);
        self
    }

    #[cfg(test)]
    pub fn deadline_between(mut self, from: NaiveDate, to: NaiveDate) -> Self {
        self.deadline_from = Some(from);
        self.deadline_to = Some(to);
        self
    }

    pub fn matches(&self, row: &Row) -> bool {
        if let Some(ids) = &self.ids {
            if !ids.contains(&row.id) {
                return false;
            }
        }
        if self.active.is_some_and(|a| a != row.active) {
            return false;
        }
        let bounded = self.deadline_before.is_some()
            || self.deadline_from.is_some()
            || self.deadline_to.is_some();
        if !bounded {
            return true;
        }
        let Some(deadline) = row.deadline else {
            return false;
        };
        self.deadline_before.is_none_or(|d| deadline < d)
            && self.deadline_from.is_none_or(|d| deadline >= d)
            && self.deadline_to.is_none_or(|d| deadline <= d)
    }
}

/// Partial update applied to every matching row.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Patch {
    pub active: Option<bool>,
    pub deadline: Option<Option<NaiveDate>>,
}

impl Patch {
    pub fn deactivate() -> Self {
        Self {
            active: Some(false),
            ..Self::default()
        }
    }

    fn apply(&self, row: &mut Row, now: DateTime<Utc>) {
        if let Some(active) = self.active {
            row.active = active;
        }
        if let Some(deadline) = self.deadline {
            row.deadline = deadline;
        }
        row.updated_at = now;
    }
}

/// Generic relational interface over the three tables.
pub trait Store {
    async fn select(&self, table: Table, filter: &Filter) -> Result<Vec<Row>, StoreError>;
    async fn insert(&self, table: Table, row: NewRow) -> Result<Row, StoreError>;
    /// Returns the number of rows changed.
    async fn update(&self, table: Table, filter: &Filter, patch: &Patch)
    -> Result<usize, StoreError>;
    /// Returns the number of rows removed.
    async fn delete(&self, table: Table, filter: &Filter) -> Result<usize, StoreError>;
}

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
struct Tables {
    #[serde(default = "first_id")]
    next_id: u64,
    #[serde(default)]
    institutions: Vec<Row>,
    #[serde(default)]
    programs: Vec<Row>,
    #[serde(default)]
    bursaries: Vec<Row>,
}

fn first_id() -> u64 {
    1
}

impl Tables {
    fn rows(&self, table: Table) -> &Vec<Row> {
        match table {
            Table::Institutions => &self.institutions,
            Table::Programs => &self.programs,
            Table::Bursaries => &self.bursaries,
        }
    }

    fn rows_mut(&mut self, table: Table) -> &mut Vec<Row> {
        match table {
            Table::Institutions => &mut self.institutions,
            Table::Programs => &mut self.programs,
            Table::Bursaries => &mut self.bursaries,
        }
    }

    /// Keep `next_id` ahead of every stored id, whatever the file said.
    fn reconcile_next_id(&mut self) {
        let max_id = Table::ALL
            .iter()
            .flat_map(|t| self.rows(*t))
            .map(|r| r.id)
            .max()
            .unwrap_or(0);
        self.next_id = self.next_id.max(max_id + 1);
    }
}

/// [`Store`] backed by memory and, optionally, a JSON file.
#[derive(Debug)]
pub struct JsonStore {
    path: Option<PathBuf>,
    tables: RwLock<Tables>,
}

impl JsonStore {
    /// A store that lives only as long as the process.
    #[cfg(test)]
    pub fn in_memory() -> Self {
        Self {
            path: None,
            tables: RwLock::new(Tables {
                next_id: first_id(),
                ..Tables::default()
            }),
        }
    }

    /// Open the store file at `path`, starting empty if it does not exist.
    #[instrument(level = "info", skip_all, fields(path = %path.as_ref().display()))]
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let mut tables = match fs::read_to_string(&path).await {
            Ok(content) => serde_json::from_str::<Tables>(&content).map_err(|e| {
                if looks_truncated(&e) {
                    StoreError::Truncated {
                        path: path.display().to_string(),
                        source: e,
                    }
                } else {
                    StoreError::Malformed(e)
                }
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!("Store file not found; starting with empty tables");
                Tables {
                    next_id: first_id(),
                    ..Tables::default()
                }
            }
            Err(e) => return Err(e.into()),
        };
        tables.reconcile_next_id();
        info!(
            institutions = tables.institutions.len(),
            programs = tables.programs.len(),
            bursaries = tables.bursaries.len(),
            "Opened store"
        );
        Ok(Self {
            path: Some(path),
            tables: RwLock::new(tables),
        })
    }

    async fn flush(&self, tables: &Tables) -> Result<(), StoreError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }
        let json = serde_json::to_string_pretty(tables)?;
        fs::write(path, json).await?;
        debug!(path = %path.display(), "Flushed store");
        Ok(())
    }
}

impl Store for JsonStore {
    async fn select(&self, table: Table, filter: &Filter) -> Result<Vec<Row>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .rows(table)
            .iter()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect())
    }

    async fn insert(&self, table: Table, row: NewRow) -> Result<Row, StoreError> {
        let mut tables = self.tables.write().await;
        let stored = Row {
            id: tables.next_id,
            name: row.name,
            category: row.category,
            deadline: row.deadline,
            active: row.active,
            source: row.source,
            updated_at: Utc::now(),
        };
        tables.next_id += 1;
        tables.rows_mut(table).push(stored.clone());
        self.flush(&tables).await?;
        Ok(stored)
    }

    async fn update(
        &self,
        table: Table,
        filter: &Filter,
        patch: &Patch,
    ) -> Result<usize, StoreError> {
        let mut tables = self.tables.write().await;
        let now = Utc::now();
        let mut affected = 0;
        for row in tables.rows_mut(table).iter_mut().filter(|r| filter.matches(r)) {
            patch.apply(row, now);
            affected += 1;
        }
        if affected > 0 {
            self.flush(&tables).await?;
        }
        Ok(affected)
    }

    async fn delete(&self, table: Table, filter: &Filter) -> Result<usize, StoreError> {
        let mut tables = self.tables.write().await;
        let rows = tables.rows_mut(table);
        let before = rows.len();
        rows.retain(|r| !filter.matches(r));
        let affected = before - rows.len();
        if affected > 0 {
            self.flush(&tables).await?;
        }
        Ok(affected)
    }
}

/// Row counts written by [`persist_scrape`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistOutcome {
    pub institutions: usize,
    pub programs: usize,
    pub bursaries: usize,
}

fn open_on(deadline: Option<NaiveDate>, today: NaiveDate) -> bool {
    deadline.is_none_or(|d| d >= today)
}

fn institution_row(inst: &ScrapedInstitution, today: NaiveDate) -> NewRow {
    let deadline = inst.application_deadline;
    NewRow::new(inst.name.clone(), deadline, open_on(deadline, today))
        .category(inst.institution_type.to_string())
        .source(inst.source.clone())
}

fn bursary_row(bursary: &ScrapedBursary) -> NewRow {
    NewRow::new(
        bursary.title.clone(),
        bursary.application_deadline,
        bursary.is_active,
    )
    .category(bursary.provider.clone())
    .source(bursary.source.clone())
}

/// Insert the records of a scrape run as of the local date.
pub async fn persist_scrape<S: Store>(
    store: &S,
    result: &ScrapeResult,
) -> Result<PersistOutcome, StoreError> {
    persist_scrape_at(store, result, today()).await
}

/// Insert the records of a scrape run.
///
/// Degraded candidates are skipped: they carry no information beyond the
/// source registry. Programs inherit their institution's deadline, and
/// institutions and programs are stored inactive once that deadline is
/// before `today`.
#[instrument(level = "info", skip(store, result))]
pub async fn persist_scrape_at<S: Store>(
    store: &S,
    result: &ScrapeResult,
    today: NaiveDate,
) -> Result<PersistOutcome, StoreError> {
    let mut outcome = PersistOutcome::default();

    for candidate in result.institutions.iter().filter(|c| !c.is_degraded()) {
        let inst = &candidate.record;
        let row = institution_row(inst, today);
        let active = row.active;
        store.insert(Table::Institutions, row).await?;
        outcome.institutions += 1;
        for program in &inst.programs {
            let row = NewRow::new(program.clone(), inst.application_deadline, active)
                .category(inst.name.clone())
                .source(inst.source.clone());
            store.insert(Table::Programs, row).await?;
            outcome.programs += 1;
        }
    }

    for candidate in result.bursaries.iter().filter(|c| !c.is_degraded()) {
        store.insert(Table::Bursaries, bursary_row(&candidate.record)).await?;
        outcome.bursaries += 1;
    }

    info!(
        institutions = outcome.institutions,
        programs = outcome.programs,
        bursaries = outcome.bursaries,
        skipped_degraded = result.degraded_count(),
        "Persisted scrape results"
    );
    Ok(outcome)
}
