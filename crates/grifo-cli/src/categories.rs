//! Category tree commands: inspection, recounts, flat-record round trips.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Subcommand;
use grifo_core::{CategoryRecord, MAX_CATEGORY_LEVEL};

use crate::App;

/// Sub-commands available under `categories`.
#[derive(Debug, Subcommand)]
pub enum CategoriesCommands {
    /// Print the category tree with product counts
    Tree,
    /// Recompute direct and subtree product counts
    Recount,
    /// Export the tree as flat JSON records (slug plus parent-slug edges)
    Export {
        /// Write to this file instead of stdout
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Import flat JSON records produced by `categories export`
    Import {
        /// Path to the records file
        path: PathBuf,

        /// Parse and resolve without writing
        #[arg(long)]
        dry_run: bool,
    },
}

pub(crate) async fn run_tree(app: &App) -> anyhow::Result<()> {
    let categories = app.tree.list().await?;
    if categories.is_empty() {
        println!("no categories found; run `db seed` first");
        return Ok(());
    }

    for category in &categories {
        let indent = "  ".repeat(usize::try_from(category.level).unwrap_or(0));
        let marker = if category.active { "" } else { " [inactive]" };
        println!(
            "{indent}{} ({}) {} direct / {} in subtree{marker}",
            category.name, category.slug, category.product_count, category.total_product_count
        );
    }
    println!("{} categories", categories.len());
    Ok(())
}

pub(crate) async fn run_recount(app: &App) -> anyhow::Result<()> {
    let updated = app.tree.recount().await?;
    println!("recounted products for {updated} categories");
    Ok(())
}

pub(crate) async fn run_export(app: &App, out: Option<&Path>) -> anyhow::Result<()> {
    let records = app.tree.export_records().await?;
    let json = serde_json::to_string_pretty(&records)?;
    match out {
        Some(path) => {
            fs::write(path, json).with_context(|| format!("writing {}", path.display()))?;
            println!("exported {} categories to {}", records.len(), path.display());
        }
        None => println!("{json}"),
    }
    Ok(())
}

/// Import flat category records, parents before children.
///
/// A dry run resolves every record without touching the store and exits
/// non-zero when any record would be rejected.
pub(crate) async fn run_import(app: &App, path: &Path, dry_run: bool) -> anyhow::Result<()> {
    let text = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let records: Vec<CategoryRecord> =
        serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))?;

    if dry_run {
        let problems = check_records(app, &records).await?;
        if problems > 0 {
            anyhow::bail!("dry run found {problems} problem records");
        }
        println!(
            "dry run: {} records parse and every parent resolves",
            records.len()
        );
        return Ok(());
    }

    let outcome = app.tree.import_records(&records).await?;
    println!(
        "imported {} category records: {} created, {} updated, {} unchanged",
        records.len(),
        outcome.created,
        outcome.updated,
        outcome.unchanged
    );
    Ok(())
}

/// Resolve each record against the live tree plus the records before it,
/// the same order the real import applies them in.
async fn check_records(app: &App, records: &[CategoryRecord]) -> anyhow::Result<usize> {
    let mut levels: HashMap<String, i16> = app
        .tree
        .list()
        .await?
        .into_iter()
        .map(|category| (category.slug, category.level))
        .collect();

    let mut problems = 0usize;
    for (position, record) in records.iter().enumerate() {
        let row = position + 1;
        let slug = record.resolved_slug();
        if slug.is_empty() {
            println!("record {row}: name {:?} yields an empty slug", record.name);
            problems += 1;
            continue;
        }
        let level = match record.parent_slug.as_deref().map(str::trim) {
            None | Some("") => 0,
            Some(parent) => match levels.get(parent) {
                Some(parent_level) => parent_level + 1,
                None => {
                    println!("record {row} ({slug}): parent '{parent}' not found");
                    problems += 1;
                    continue;
                }
            },
        };
        if level > MAX_CATEGORY_LEVEL {
            println!(
                "record {row} ({slug}): nesting deeper than {} levels",
                MAX_CATEGORY_LEVEL + 1
            );
            problems += 1;
            continue;
        }
        levels.entry(slug).or_insert(level);
    }
    Ok(problems)
}
