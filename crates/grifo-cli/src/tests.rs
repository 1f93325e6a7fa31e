use std::path::Path;

use super::*;

#[test]
fn parses_db_ping_command() {
    let cli = Cli::try_parse_from(["grifo-cli", "db", "ping"]).expect("expected valid cli args");

    assert!(matches!(
        cli.command,
        Some(Commands::Db {
            command: DbCommands::Ping
        })
    ));
}

#[test]
fn parses_db_migrate_command() {
    let cli = Cli::try_parse_from(["grifo-cli", "db", "migrate"]).expect("expected valid cli args");

    assert!(matches!(
        cli.command,
        Some(Commands::Db {
            command: DbCommands::Migrate
        })
    ));
}

#[test]
fn parses_db_seed_command() {
    let cli = Cli::try_parse_from(["grifo-cli", "db", "seed"]).expect("expected valid cli args");

    assert!(matches!(
        cli.command,
        Some(Commands::Db {
            command: DbCommands::Seed { categories: None }
        })
    ));
}

#[test]
fn parses_db_seed_with_explicit_file() {
    let cli = Cli::try_parse_from(["grifo-cli", "db", "seed", "--categories", "config/otras.yaml"])
        .expect("expected valid cli args");

    assert!(matches!(
        cli.command,
        Some(Commands::Db {
            command: DbCommands::Seed {
                categories: Some(ref p)
            }
        }) if p == Path::new("config/otras.yaml")
    ));
}

#[test]
fn no_command_is_none() {
    let cli = Cli::try_parse_from(["grifo-cli"]).expect("expected valid cli args");
    assert!(cli.command.is_none());
}

#[test]
fn parses_categories_tree_command() {
    let cli =
        Cli::try_parse_from(["grifo-cli", "categories", "tree"]).expect("expected valid cli args");

    assert!(matches!(
        cli.command,
        Some(Commands::Categories {
            command: CategoriesCommands::Tree
        })
    ));
}

#[test]
fn parses_categories_recount_command() {
    let cli = Cli::try_parse_from(["grifo-cli", "categories", "recount"])
        .expect("expected valid cli args");

    assert!(matches!(
        cli.command,
        Some(Commands::Categories {
            command: CategoriesCommands::Recount
        })
    ));
}

#[test]
fn parses_categories_export_with_out() {
    let cli = Cli::try_parse_from(["grifo-cli", "categories", "export", "--out", "arbol.json"])
        .expect("expected valid cli args");

    assert!(matches!(
        cli.command,
        Some(Commands::Categories {
            command: CategoriesCommands::Export { out: Some(ref p) }
        }) if p == Path::new("arbol.json")
    ));
}

#[test]
fn parses_categories_import_dry_run() {
    let cli = Cli::try_parse_from(["grifo-cli", "categories", "import", "arbol.json", "--dry-run"])
        .expect("expected valid cli args");

    assert!(matches!(
        cli.command,
        Some(Commands::Categories {
            command: CategoriesCommands::Import {
                ref path,
                dry_run: true
            }
        }) if path == Path::new("arbol.json")
    ));
}

#[test]
fn test_import_products_defaults() {
    let cli = Cli::try_parse_from(["grifo", "import", "products"]).unwrap();
    assert!(matches!(
        cli.command,
        Some(Commands::Import {
            command: ImportCommands::Products {
                file: None,
                format: None,
                dry_run: false,
                update: false,
                report: None,
                batch_size: None,
            }
        })
    ));
}

#[test]
fn test_import_products_with_file_and_format() {
    let cli = Cli::try_parse_from([
        "grifo", "import", "products", "data/feed.txt", "--format", "json",
    ])
    .unwrap();
    assert!(matches!(
        cli.command,
        Some(Commands::Import {
            command: ImportCommands::Products {
                file: Some(ref p),
                format: Some(ref f),
                ..
            }
        }) if p == Path::new("data/feed.txt") && f == "json"
    ));
}

#[test]
fn test_import_products_update_dry_run_and_batch_size() {
    let cli = Cli::try_parse_from([
        "grifo",
        "import",
        "products",
        "--dry-run",
        "--update",
        "--batch-size",
        "25",
        "--report",
        "reporte.json",
    ])
    .unwrap();
    assert!(matches!(
        cli.command,
        Some(Commands::Import {
            command: ImportCommands::Products {
                dry_run: true,
                update: true,
                batch_size: Some(25),
                report: Some(ref r),
                ..
            }
        }) if r == Path::new("reporte.json")
    ));
}

#[test]
fn test_import_runs_default_limit() {
    let cli = Cli::try_parse_from(["grifo", "import", "runs"]).unwrap();
    assert!(matches!(
        cli.command,
        Some(Commands::Import {
            command: ImportCommands::Runs { limit: 20 }
        })
    ));
}

#[test]
fn test_products_verify_images_defaults() {
    let cli = Cli::try_parse_from(["grifo", "products", "verify-images"]).unwrap();
    assert!(matches!(
        cli.command,
        Some(Commands::Products {
            command: ProductsCommands::VerifyImages { concurrency: 8 }
        })
    ));
}

#[test]
fn test_products_verify_images_custom_concurrency() {
    let cli =
        Cli::try_parse_from(["grifo", "products", "verify-images", "--concurrency", "3"]).unwrap();
    assert!(matches!(
        cli.command,
        Some(Commands::Products {
            command: ProductsCommands::VerifyImages { concurrency: 3 }
        })
    ));
}
