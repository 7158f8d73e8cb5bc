use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use serde::Serialize;
use wholesale_api::{
    auth,
    config::{self, AppConfig},
    db,
    services::catalog_import::{CatalogImportService, ImportReport, MappingOverride},
};

#[derive(Parser)]
#[command(
    name = "wholesale-cli",
    about = "Administrative tasks for the wholesale ordering API",
    version
)]
struct Cli {
    #[arg(
        long,
        global = true,
        action = ArgAction::SetTrue,
        help = "Print results as JSON"
    )]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print an argon2 hash suitable for `admin_password_hash`
    HashPassword {
        password: String,
    },
    /// Apply pending database migrations
    Migrate,
    /// Import a catalog spreadsheet (xlsx/xls) or CSV file
    ImportCatalog {
        file: PathBuf,
        /// JSON column mapping override, e.g. '{"sku": "Model"}'
        #[arg(long)]
        mapping: Option<String>,
    },
}

#[derive(Serialize)]
struct HashOutput {
    hash: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::HashPassword { password } => handle_hash_password(&password, cli.json)?,
        Commands::Migrate => handle_migrate(cli.json).await?,
        Commands::ImportCatalog { file, mapping } => {
            handle_import_catalog(file, mapping, cli.json).await?
        }
    }

    Ok(())
}

fn handle_hash_password(password: &str, json: bool) -> Result<()> {
    let hash = auth::hash_password(password).context("failed to hash password")?;
    if json {
        print_json(&HashOutput { hash })?;
    } else {
        println!("{}", hash);
    }
    Ok(())
}

async fn handle_migrate(json: bool) -> Result<()> {
    let cfg = load_config()?;
    let pool = db::establish_connection_from_app_config(&cfg)
        .await
        .context("failed to connect to the database")?;
    db::run_migrations(&pool)
        .await
        .context("failed to run migrations")?;
    db::close_pool(pool).await.context("failed to close the database pool")?;

    if json {
        print_json(&serde_json::json!({ "migrated": true }))?;
    } else {
        println!("Migrations applied");
    }
    Ok(())
}

async fn handle_import_catalog(file: PathBuf, mapping: Option<String>, json: bool) -> Result<()> {
    let mapping: Option<MappingOverride> = mapping
        .as_deref()
        .map(serde_json::from_str)
        .transpose()
        .context("--mapping is not a valid column mapping")?;
    let bytes = tokio::fs::read(&file)
        .await
        .with_context(|| format!("failed to read {}", file.display()))?;

    let cfg = load_config()?;
    let pool = db::establish_connection_from_app_config(&cfg)
        .await
        .context("failed to connect to the database")?;
    let service = CatalogImportService::new(Arc::new(pool), None, cfg.import_columns.clone());

    let report = service
        .import_file(&bytes, mapping)
        .await
        .context("catalog import failed")?;

    if json {
        print_json(&report)?;
    } else {
        print_report(&report);
    }
    Ok(())
}

fn load_config() -> Result<AppConfig> {
    let cfg = config::load_config().context("failed to load configuration")?;
    config::init_tracing(&cfg.log_level, cfg.log_json);
    Ok(cfg)
}

fn print_report(report: &ImportReport) {
    println!(
        "{} inserted, {} updated, {} failed",
        report.inserted,
        report.updated,
        report.errors.len()
    );
    for error in &report.errors {
        println!("  row {}: {}", error.row, error.message);
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
