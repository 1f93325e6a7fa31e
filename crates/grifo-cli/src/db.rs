//! Database utility commands: ping, migrate, seed.

use std::path::{Path, PathBuf};

use clap::Subcommand;
use grifo_core::seed_file::{flatten_categories, load_categories};

use crate::App;

/// Sub-commands available under `db`.
#[derive(Debug, Subcommand)]
pub enum DbCommands {
    /// Check database connectivity
    Ping,
    /// Apply pending schema migrations
    Migrate,
    /// Upsert the category tree from the YAML seed file
    Seed {
        /// Seed file path; defaults to the configured categories file
        #[arg(long)]
        categories: Option<PathBuf>,
    },
}

pub(crate) async fn run_ping(app: &App) -> anyhow::Result<()> {
    grifo_db::ping(&app.pool).await?;
    println!("database connection OK");
    Ok(())
}

pub(crate) async fn run_migrate(app: &App) -> anyhow::Result<()> {
    let applied = grifo_db::run_migrations(&app.pool).await?;
    if applied == 0 {
        println!("migrations already up to date");
    } else {
        println!("applied {applied} migrations");
    }
    Ok(())
}

/// Load, validate and upsert the category seed file.
///
/// Existing categories are matched by slug; the seed never reparents or
/// deletes, so a hand-edited tree survives re-seeding.
pub(crate) async fn run_seed(app: &App, categories: Option<&Path>) -> anyhow::Result<()> {
    let path = categories.unwrap_or(&app.config.categories_path);
    let file = load_categories(path)?;
    let records = flatten_categories(&file);
    let outcome = app.tree.import_records(&records).await?;
    println!(
        "seeded {} categories from {}: {} created, {} updated, {} unchanged",
        records.len(),
        path.display(),
        outcome.created,
        outcome.updated,
        outcome.unchanged
    );
    Ok(())
}
