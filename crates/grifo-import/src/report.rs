//! Per-row outcomes and run totals for an import.
//!
//! The report is the single artifact of a run: every feed row lands in it
//! exactly once, with its status, the reason it was skipped or rejected,
//! rehost warnings, and (for updates) the fields that changed. It
//! serializes to JSON for the `--report` file.

use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RowStatus {
    Inserted,
    Updated,
    Unchanged,
    DuplicateSkipped,
    Skipped,
    Error,
}

impl RowStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            RowStatus::Inserted => "inserted",
            RowStatus::Updated => "updated",
            RowStatus::Unchanged => "unchanged",
            RowStatus::DuplicateSkipped => "duplicate_skipped",
            RowStatus::Skipped => "skipped",
            RowStatus::Error => "error",
        }
    }
}

impl std::fmt::Display for RowStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One field an update changed, with before/after rendered as display
/// strings. List fields summarize as counts instead of dumping contents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldChange {
    pub field: &'static str,
    pub from: String,
    pub to: String,
}

/// What happened to one feed row. `row` is the 1-based position in the
/// feed, stable across batches.
#[derive(Debug, Serialize)]
pub struct RowOutcome {
    pub row: usize,
    pub sku: String,
    pub name: String,
    pub status: RowStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub existing_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub changes: Vec<FieldChange>,
}

impl RowOutcome {
    #[must_use]
    pub fn new(
        row: usize,
        sku: impl Into<String>,
        name: impl Into<String>,
        status: RowStatus,
    ) -> Self {
        RowOutcome {
            row,
            sku: sku.into(),
            name: name.into(),
            status,
            reason: None,
            existing_id: None,
            warnings: Vec::new(),
            changes: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }
}

#[derive(Debug, Serialize)]
pub struct ImportReport {
    pub total_rows: usize,
    pub inserted: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub duplicates: usize,
    pub skipped: usize,
    pub errors: usize,
    pub dry_run: bool,
    pub rows: Vec<RowOutcome>,
}

impl ImportReport {
    #[must_use]
    pub fn new(dry_run: bool) -> Self {
        ImportReport {
            total_rows: 0,
            inserted: 0,
            updated: 0,
            unchanged: 0,
            duplicates: 0,
            skipped: 0,
            errors: 0,
            dry_run,
            rows: Vec::new(),
        }
    }

    pub fn push(&mut self, outcome: RowOutcome) {
        self.total_rows += 1;
        match outcome.status {
            RowStatus::Inserted => self.inserted += 1,
            RowStatus::Updated => self.updated += 1,
            RowStatus::Unchanged => self.unchanged += 1,
            RowStatus::DuplicateSkipped => self.duplicates += 1,
            RowStatus::Skipped => self.skipped += 1,
            RowStatus::Error => self.errors += 1,
        }
        self.rows.push(outcome);
    }

    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.errors > 0
    }

    /// One-line human summary for logs and the CLI.
    #[must_use]
    pub fn summary_line(&self) -> String {
        let mut line = format!(
            "{} rows: {} inserted, {} updated, {} unchanged, {} duplicates, {} skipped, {} errors",
            self.total_rows,
            self.inserted,
            self.updated,
            self.unchanged,
            self.duplicates,
            self.skipped,
            self.errors
        );
        if self.dry_run {
            line.push_str(" (dry run)");
        }
        line
    }

    /// Counters in the shape the `import_runs` table records. Saturates on
    /// the (theoretical) overflow past `i32::MAX` rows.
    #[must_use]
    pub fn run_totals(&self) -> grifo_db::ImportRunTotals {
        let count = |n: usize| i32::try_from(n).unwrap_or(i32::MAX);
        grifo_db::ImportRunTotals {
            total_rows: count(self.total_rows),
            inserted: count(self.inserted),
            updated: count(self.updated),
            unchanged: count(self.unchanged),
            duplicates: count(self.duplicates),
            skipped: count(self.skipped),
            errors: count(self.errors),
        }
    }
}
