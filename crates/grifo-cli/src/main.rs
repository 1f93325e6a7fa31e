//! Command line interface for the Grifo catalog.
//!
//! Command handlers live in topic modules (`db`, `categories`, `import`,
//! `products`) and are called from `main` after the config and database
//! pool are established.

use std::sync::Arc;

use clap::{Parser, Subcommand};
use grifo_core::config::load_app_config;
use grifo_core::AppConfig;
use grifo_db::{CatalogStore, CategoryCache, CategoryTree, PgStore, ProductCatalog, RecountFlag};
use tracing_subscriber::EnvFilter;

use categories::CategoriesCommands;
use db::DbCommands;
use import::ImportCommands;
use products::ProductsCommands;

mod categories;
mod db;
mod import;
mod products;

#[cfg(test)]
mod tests;

#[derive(Debug, Parser)]
#[command(name = "grifo-cli")]
#[command(about = "Grifo catalog command line interface")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Database utilities: connectivity, migrations, category seeding
    Db {
        #[command(subcommand)]
        command: DbCommands,
    },
    /// Category tree inspection and maintenance
    Categories {
        #[command(subcommand)]
        command: CategoriesCommands,
    },
    /// Bulk product imports and run history
    Import {
        #[command(subcommand)]
        command: ImportCommands,
    },
    /// Product catalog maintenance
    Products {
        #[command(subcommand)]
        command: ProductsCommands,
    },
}

/// Shared handles every database-backed command works against.
pub(crate) struct App {
    pub(crate) config: AppConfig,
    pub(crate) pool: sqlx::PgPool,
    pub(crate) tree: Arc<CategoryTree>,
    pub(crate) catalog: Arc<ProductCatalog>,
}

/// Connect the pool and wire the catalog services.
async fn boot(config: AppConfig) -> anyhow::Result<App> {
    let pool_config = grifo_db::PoolConfig {
        max_connections: config.db_max_connections,
        min_connections: config.db_min_connections,
        acquire_timeout_secs: config.db_acquire_timeout_secs,
    };
    let pool = grifo_db::connect_pool(&config.database_url, pool_config).await?;

    let store: Arc<dyn CatalogStore> = Arc::new(PgStore::new(pool.clone()));
    let cache = Arc::new(CategoryCache::new());
    let recount = RecountFlag::new();
    let tree = Arc::new(CategoryTree::new(
        Arc::clone(&store),
        cache,
        recount.clone(),
    ));
    let catalog = Arc::new(ProductCatalog::new(store, Arc::clone(&tree), recount));

    Ok(App {
        config,
        pool,
        tree,
        catalog,
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let Some(command) = cli.command else {
        println!("no command given; run with --help for usage");
        return Ok(());
    };

    let config = load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let app = boot(config).await?;
    match command {
        Commands::Db { command } => match command {
            DbCommands::Ping => db::run_ping(&app).await,
            DbCommands::Migrate => db::run_migrate(&app).await,
            DbCommands::Seed { categories } => db::run_seed(&app, categories.as_deref()).await,
        },
        Commands::Categories { command } => match command {
            CategoriesCommands::Tree => categories::run_tree(&app).await,
            CategoriesCommands::Recount => categories::run_recount(&app).await,
            CategoriesCommands::Export { out } => {
                categories::run_export(&app, out.as_deref()).await
            }
            CategoriesCommands::Import { path, dry_run } => {
                categories::run_import(&app, &path, dry_run).await
            }
        },
        Commands::Import { command } => match command {
            ImportCommands::Products {
                file,
                format,
                dry_run,
                update,
                report,
                batch_size,
            } => {
                import::run_products(
                    &app,
                    file,
                    format.as_deref(),
                    dry_run,
                    update,
                    report.as_deref(),
                    batch_size,
                )
                .await
            }
            ImportCommands::Runs { limit } => import::run_runs(&app, limit).await,
        },
        Commands::Products { command } => match command {
            ProductsCommands::VerifyImages { concurrency } => {
                products::run_verify_images(&app, concurrency).await
            }
        },
    }
}
