//! Bulk product import commands and run history.
//!
//! Non-dry imports are wrapped in an `import_runs` row so interrupted or
//! crashed runs stay visible. Row-level failures never abort the run; they
//! are printed at the end and the command still exits zero.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Subcommand;
use grifo_import::feed::{detect_format, read_feed};
use grifo_import::{
    CancelFlag, FeedFormat, HttpImageRehoster, ImageRehoster, ImportMode, ImportOptions,
    ImportPipeline, NoopImageRehoster, RowStatus,
};

use crate::App;

const DEFAULT_FEED_PATH: &str = "./data/products.csv";

/// Sub-commands available under `import`.
#[derive(Debug, Subcommand)]
pub enum ImportCommands {
    /// Import products from a CSV or JSON feed
    Products {
        /// Feed file; defaults to ./data/products.csv
        file: Option<PathBuf>,

        /// Feed format (csv or json); inferred from the extension when omitted
        #[arg(long)]
        format: Option<String>,

        /// Resolve, validate and classify every row without writing or uploading
        #[arg(long)]
        dry_run: bool,

        /// Update existing products on SKU matches instead of skipping them
        #[arg(long)]
        update: bool,

        /// Write the per-row JSON report to this file
        #[arg(long)]
        report: Option<PathBuf>,

        /// Rows per batch; defaults to the configured batch size
        #[arg(long)]
        batch_size: Option<usize>,
    },
    /// List recent import runs
    Runs {
        /// Maximum runs to show
        #[arg(long, default_value_t = 20)]
        limit: i64,
    },
}

/// Run a product feed through the import pipeline.
///
/// # Errors
///
/// Returns an error for fatal conditions only: an unreadable or unparseable
/// feed, a store that cannot be reached, or run bookkeeping failures.
#[allow(clippy::too_many_lines)] // Orchestration function: parse, book-keep, run, report.
pub(crate) async fn run_products(
    app: &App,
    file: Option<PathBuf>,
    format_flag: Option<&str>,
    dry_run: bool,
    update: bool,
    report_path: Option<&Path>,
    batch_size: Option<usize>,
) -> anyhow::Result<()> {
    let path = file.unwrap_or_else(|| PathBuf::from(DEFAULT_FEED_PATH));
    let format = match format_flag {
        Some(name) => FeedFormat::from_name(name)
            .ok_or_else(|| anyhow::anyhow!("unknown feed format '{name}'; expected csv or json"))?,
        None => detect_format(&path)?,
    };
    let records = read_feed(&path, format)?;
    if records.is_empty() {
        println!(
            "feed {} contains no records; skipping run creation",
            path.display()
        );
        return Ok(());
    }
    println!(
        "parsed {} records from {} ({format})",
        records.len(),
        path.display()
    );

    let mode = if update {
        ImportMode::Update
    } else {
        ImportMode::Insert
    };
    let options = ImportOptions {
        mode,
        dry_run,
        batch_size: batch_size.unwrap_or(app.config.import_batch_size),
        image_concurrency: app.config.import_image_concurrency,
        inter_batch_delay: Duration::from_millis(app.config.import_batch_delay_ms),
    };

    let rehoster: Arc<dyn ImageRehoster> = if dry_run {
        Arc::new(NoopImageRehoster)
    } else {
        match HttpImageRehoster::from_config(&app.config)? {
            Some(rehoster) => Arc::new(rehoster),
            None => {
                tracing::warn!("media host not configured; feed image URLs are kept as-is");
                Arc::new(NoopImageRehoster)
            }
        }
    };

    let pipeline = ImportPipeline::new(
        Arc::clone(&app.catalog),
        Arc::clone(&app.tree),
        rehoster,
        options,
    );

    // Ctrl-C finishes the current batch and skips the rest instead of
    // leaving the run half-written.
    let cancel = CancelFlag::new();
    let signal_flag = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received; remaining batches will be skipped");
            signal_flag.cancel();
        }
    });

    // Dry runs leave no trace in import_runs.
    let run = if dry_run {
        None
    } else {
        let source = path.display().to_string();
        let run =
            grifo_db::create_import_run(&app.pool, &source, format.as_str(), mode_name(mode))
                .await?;
        if let Err(e) = grifo_db::start_import_run(&app.pool, run.id).await {
            fail_run_best_effort(&app.pool, run.id, format!("{e:#}")).await;
            return Err(e.into());
        }
        Some(run)
    };

    let report = match pipeline.run(&records, &cancel).await {
        Ok(report) => report,
        Err(err) => {
            if let Some(run) = &run {
                fail_run_best_effort(&app.pool, run.id, format!("{err:#}")).await;
            }
            return Err(err.into());
        }
    };

    if let Some(run) = &run {
        if let Err(err) =
            grifo_db::complete_import_run(&app.pool, run.id, &report.run_totals()).await
        {
            let message = format!("{err:#}");
            fail_run_best_effort(&app.pool, run.id, message).await;
            return Err(err.into());
        }
    }

    if let Some(out) = report_path {
        let json = serde_json::to_string_pretty(&report)?;
        fs::write(out, json).with_context(|| format!("writing {}", out.display()))?;
        println!("wrote row report to {}", out.display());
    }

    for row in &report.rows {
        match row.status {
            RowStatus::Error => println!(
                "row {} ({}): ERROR {}",
                row.row,
                row.name,
                row.reason.as_deref().unwrap_or("unknown")
            ),
            RowStatus::DuplicateSkipped => println!(
                "row {} ({}): duplicate, {}",
                row.row,
                row.name,
                row.reason.as_deref().unwrap_or("already present")
            ),
            _ => {}
        }
    }
    println!("{}", report.summary_line());
    Ok(())
}

/// Show recent import runs, newest first.
///
/// # Errors
///
/// Returns an error if the database query fails.
pub(crate) async fn run_runs(app: &App, limit: i64) -> anyhow::Result<()> {
    let runs = grifo_db::list_import_runs(&app.pool, limit).await?;
    if runs.is_empty() {
        println!("no import runs recorded");
        return Ok(());
    }

    println!("| started | source | format | mode | status | rows | ins | upd | dup | err |");
    println!("|---|---|---|---|---|---|---|---|---|---|");
    for run in runs {
        let source = run.source_file.replace('|', "\\|");
        println!(
            "| {} | {} | {} | {} | {} | {} | {} | {} | {} | {} |",
            fmt_time(run.started_at),
            source,
            run.format,
            run.mode,
            run.status,
            run.total_rows,
            run.inserted,
            run.updated,
            run.duplicates,
            run.errors
        );
    }
    Ok(())
}

fn mode_name(mode: ImportMode) -> &'static str {
    match mode {
        ImportMode::Insert => "insert",
        ImportMode::Update => "update",
    }
}

fn fmt_time(time: Option<chrono::DateTime<chrono::Utc>>) -> String {
    time.map_or_else(
        || "\u{2014}".to_string(),
        |t| t.format("%Y-%m-%d %H:%M").to_string(),
    )
}

/// Attempt to mark an import run as failed, logging any secondary error.
async fn fail_run_best_effort(pool: &sqlx::PgPool, run_id: i64, message: String) {
    if let Err(mark_err) = grifo_db::fail_import_run(pool, run_id, &message).await {
        tracing::error!(
            run_id,
            error = %mark_err,
            "failed to mark import run as failed"
        );
    }
}
