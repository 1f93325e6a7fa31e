//! Database operations for the `import_runs` audit table.
//!
//! Every bulk import gets a row here, created in `queued` status before any
//! feed row is touched and resolved to `succeeded` or `failed` afterwards.
//! Status transitions are guarded in SQL so a crashed importer cannot be
//! double-completed by a retry.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::DbError;

const IMPORT_RUN_COLUMNS: &str = "id, public_id, source_file, format, mode, status, \
     started_at, completed_at, total_rows, inserted, updated, unchanged, \
     duplicates, skipped, errors, error_message, created_at";

/// A row from the `import_runs` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ImportRunRow {
    pub id: i64,
    pub public_id: Uuid,
    pub source_file: String,
    pub format: String,
    pub mode: String,
    pub status: String,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    /// The schema defines the counters as `INTEGER NOT NULL DEFAULT 0`.
    pub total_rows: i32,
    pub inserted: i32,
    pub updated: i32,
    pub unchanged: i32,
    pub duplicates: i32,
    pub skipped: i32,
    pub errors: i32,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Final counters written when a run completes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportRunTotals {
    pub total_rows: i32,
    pub inserted: i32,
    pub updated: i32,
    pub unchanged: i32,
    pub duplicates: i32,
    pub skipped: i32,
    pub errors: i32,
}

/// Creates a new import run in `queued` status.
///
/// Generates a UUID in Rust and binds it to `public_id`. Returns the full
/// newly-created row.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert or fetch fails.
pub async fn create_import_run(
    pool: &PgPool,
    source_file: &str,
    format: &str,
    mode: &str,
) -> Result<ImportRunRow, DbError> {
    let public_id = Uuid::new_v4();

    let row = sqlx::query_as::<_, ImportRunRow>(&format!(
        "INSERT INTO import_runs (public_id, source_file, format, mode, status) \
         VALUES ($1, $2, $3, $4, 'queued') \
         RETURNING {IMPORT_RUN_COLUMNS}"
    ))
    .bind(public_id)
    .bind(source_file)
    .bind(format)
    .bind(mode)
    .fetch_one(pool)
    .await?;

    Ok(row)
}

/// Marks a run as `running` and sets `started_at = NOW()`.
///
/// # Errors
///
/// Returns [`DbError::InvalidImportRunTransition`] if the run is not in
/// `queued` status, or [`DbError::Sqlx`] if the update fails.
pub async fn start_import_run(pool: &PgPool, id: i64) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE import_runs \
         SET status = 'running', started_at = NOW() \
         WHERE id = $1 AND status = 'queued'",
    )
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::InvalidImportRunTransition {
            id,
            expected_status: "queued",
        });
    }

    Ok(())
}

/// Marks a run as `succeeded`, sets `completed_at = NOW()` and the final
/// counters.
///
/// # Errors
///
/// Returns [`DbError::InvalidImportRunTransition`] if the run is not in
/// `running` status, or [`DbError::Sqlx`] if the update fails.
pub async fn complete_import_run(
    pool: &PgPool,
    id: i64,
    totals: &ImportRunTotals,
) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE import_runs \
         SET status = 'succeeded', completed_at = NOW(), \
             total_rows = $1, inserted = $2, updated = $3, unchanged = $4, \
             duplicates = $5, skipped = $6, errors = $7 \
         WHERE id = $8 AND status = 'running'",
    )
    .bind(totals.total_rows)
    .bind(totals.inserted)
    .bind(totals.updated)
    .bind(totals.unchanged)
    .bind(totals.duplicates)
    .bind(totals.skipped)
    .bind(totals.errors)
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::InvalidImportRunTransition {
            id,
            expected_status: "running",
        });
    }

    Ok(())
}

/// Marks a run as `failed`, sets `completed_at = NOW()` and `error_message`.
///
/// A run can fail from `queued` too: feed parsing happens before the run
/// starts, and a parse error still needs to be recorded.
///
/// # Errors
///
/// Returns [`DbError::InvalidImportRunTransition`] if the run has already
/// completed, or [`DbError::Sqlx`] if the update fails.
pub async fn fail_import_run(pool: &PgPool, id: i64, error_message: &str) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE import_runs \
         SET status = 'failed', completed_at = NOW(), error_message = $1 \
         WHERE id = $2 AND status IN ('queued', 'running')",
    )
    .bind(error_message)
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::InvalidImportRunTransition {
            id,
            expected_status: "queued or running",
        });
    }

    Ok(())
}

/// Fetches a single run by its internal `id`.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no row exists with the given `id`, or
/// [`DbError::Sqlx`] if the query fails.
pub async fn get_import_run(pool: &PgPool, id: i64) -> Result<ImportRunRow, DbError> {
    let row = sqlx::query_as::<_, ImportRunRow>(&format!(
        "SELECT {IMPORT_RUN_COLUMNS} FROM import_runs WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or(DbError::NotFound)?;

    Ok(row)
}

/// Returns the most recent `limit` runs, ordered by `created_at DESC`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_import_runs(pool: &PgPool, limit: i64) -> Result<Vec<ImportRunRow>, DbError> {
    let rows = sqlx::query_as::<_, ImportRunRow>(&format!(
        "SELECT {IMPORT_RUN_COLUMNS} FROM import_runs \
         ORDER BY created_at DESC, id DESC \
         LIMIT $1"
    ))
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
