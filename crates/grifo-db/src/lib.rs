//! Persistence and catalog services: the store abstraction, its Postgres
//! and in-memory implementations, and the category-tree and product
//! services that sit on top.

use sqlx::{postgres::PgPoolOptions, PgPool};
use std::{env, time::Duration};
use thiserror::Error;
use uuid::Uuid;

use grifo_core::MAX_CATEGORY_LEVEL;

const DEFAULT_MAX_CONNECTIONS: u32 = 10;
const DEFAULT_MIN_CONNECTIONS: u32 = 1;
const DEFAULT_ACQUIRE_TIMEOUT_SECS: u64 = 10;

// Path relative to crates/grifo-db/Cargo.toml; resolves to <workspace-root>/migrations/
static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("../../migrations");

#[derive(Debug, Clone, Copy)]
pub struct PoolConfig {
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout_secs: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: DEFAULT_MAX_CONNECTIONS,
            min_connections: DEFAULT_MIN_CONNECTIONS,
            acquire_timeout_secs: DEFAULT_ACQUIRE_TIMEOUT_SECS,
        }
    }
}

impl PoolConfig {
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            max_connections: read_u32("GRIFO_DB_MAX_CONNECTIONS", DEFAULT_MAX_CONNECTIONS),
            min_connections: read_u32("GRIFO_DB_MIN_CONNECTIONS", DEFAULT_MIN_CONNECTIONS),
            acquire_timeout_secs: read_u64(
                "GRIFO_DB_ACQUIRE_TIMEOUT_SECS",
                DEFAULT_ACQUIRE_TIMEOUT_SECS,
            ),
        }
    }
}

#[derive(Debug, Error)]
pub enum DbError {
    #[error("DATABASE_URL is not set")]
    MissingDatabaseUrl,
    #[error("record not found")]
    NotFound,
    #[error("import run {id} is not in status '{expected_status}'")]
    InvalidImportRunTransition {
        id: i64,
        expected_status: &'static str,
    },
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
    #[error(transparent)]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Failures surfaced by the catalog services to callers: the admin
/// surface, the import pipeline, and the CLI.
///
/// `Validation` carries the full message list from
/// [`grifo_core::validate::validate_product_draft`] plus any uniqueness
/// problems; store-level unique violations are translated into it at the
/// write seams instead of leaking database errors upward.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("validation failed: {}", .0.join("; "))]
    Validation(Vec<String>),

    #[error("category {0} not found")]
    CategoryNotFound(Uuid),

    #[error("product {0} not found")]
    ProductNotFound(Uuid),

    #[error("cannot attach '{slug}' under '{parent_slug}': the move would create a cycle")]
    Cycle { slug: String, parent_slug: String },

    #[error(
        "category depth limit exceeded: level {attempted} (levels 0..={MAX_CATEGORY_LEVEL} are allowed)"
    )]
    DepthExceeded { attempted: i16 },

    #[error(transparent)]
    Store(#[from] store::StoreError),
}

impl CatalogError {
    /// The validation messages, if this is a validation failure.
    #[must_use]
    pub fn validation_messages(&self) -> Option<&[String]> {
        match self {
            CatalogError::Validation(messages) => Some(messages),
            _ => None,
        }
    }

    /// Translates a store write failure. Unique-constraint conflicts become
    /// validation messages so import rows and admin calls report them like
    /// any other field problem; everything else passes through.
    pub(crate) fn from_write(err: store::StoreError) -> Self {
        match err {
            store::StoreError::Duplicate { field, value } => {
                CatalogError::Validation(vec![format!("{field} '{value}' is already in use")])
            }
            other => CatalogError::Store(other),
        }
    }
}

/// Connect to a Postgres pool using explicit URL and config.
///
/// # Errors
///
/// Returns [`sqlx::Error`] if the connection cannot be established.
pub async fn connect_pool(database_url: &str, config: PoolConfig) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
        .connect(database_url)
        .await
}

/// Connect to a Postgres pool, reading `DATABASE_URL` and pool settings from env.
///
/// # Errors
///
/// Returns [`DbError::MissingDatabaseUrl`] if `DATABASE_URL` is unset, or
/// [`DbError::Sqlx`] if the connection cannot be established.
pub async fn connect_pool_from_env() -> Result<PgPool, DbError> {
    let database_url = env::var("DATABASE_URL").map_err(|_| DbError::MissingDatabaseUrl)?;
    let config = PoolConfig::from_env();
    connect_pool(&database_url, config)
        .await
        .map_err(DbError::from)
}

/// Run all pending migrations against the pool.
///
/// Returns the number of migrations that were applied.
///
/// # Errors
///
/// Returns [`sqlx::migrate::MigrateError`] if any migration fails.
pub async fn run_migrations(pool: &PgPool) -> Result<usize, sqlx::migrate::MigrateError> {
    // Count applied migrations before running. The _sqlx_migrations table may not
    // exist yet on a fresh database; treat absence as zero applied.
    let applied_before: i64 =
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM _sqlx_migrations WHERE success = true")
            .fetch_one(pool)
            .await
            .unwrap_or(0);

    MIGRATOR.run(pool).await?;

    let applied_after: i64 =
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM _sqlx_migrations WHERE success = true")
            .fetch_one(pool)
            .await
            .unwrap_or(0);

    let delta = (applied_after - applied_before).max(0);
    Ok(usize::try_from(delta).unwrap_or(0))
}

/// Send a `SELECT 1` to verify the pool has a live connection.
///
/// # Errors
///
/// Returns [`sqlx::Error`] if the query fails.
pub async fn ping(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::query_scalar::<_, i64>("SELECT 1")
        .fetch_one(pool)
        .await?;
    Ok(())
}

fn read_u32(var: &str, default: u32) -> u32 {
    env::var(var)
        .ok()
        .and_then(|v| v.parse::<u32>().ok())
        .unwrap_or(default)
}

fn read_u64(var: &str, default: u64) -> u64 {
    env::var(var)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(default)
}


pub mod cache;
pub mod catalog;
pub mod import_runs;
pub mod memory;
pub mod postgres;
pub mod store;
pub mod tree;

pub use cache::{CategoryCache, RecountFlag};
pub use catalog::ProductCatalog;
pub use import_runs::{
    complete_import_run, create_import_run, fail_import_run, get_import_run, list_import_runs,
    start_import_run, ImportRunRow, ImportRunTotals,
};
pub use memory::MemoryStore;
pub use postgres::PgStore;
pub use store::{CatalogStore, StoreError};
pub use tree::{CategoryTree, SeedOutcome};
