use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use tracing::info;

mod dashboard;
mod db;
mod filter;
mod import;
mod models;
mod normalize;
mod scoring;
mod server;
mod workbook;

#[derive(Parser)]
#[command(name = "qa-review-dashboard")]
#[command(about = "Quality-control report ingestion and review dashboard", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Normalize and import a quality report (XLSX or CSV)
    Import {
        #[arg(long)]
        file: PathBuf,
        /// Sheet to read; defaults to "Relatorio"/"Relatório", then the first sheet
        #[arg(long)]
        sheet: Option<String>,
        /// Label grouping this import; defaults to "Import <timestamp>"
        #[arg(long)]
        label: Option<String>,
        /// Minimum kept rows for the header strategy to be trusted
        #[arg(long, default_value_t = 100)]
        min_viable_rows: usize,
    },
    /// Run the HTTP API
    Serve {
        #[arg(long, default_value = "127.0.0.1:8787")]
        bind: String,
        /// Comma-separated CORS origins, or "*"
        #[arg(long, env = "ALLOWED_ORIGINS", default_value = "*")]
        allowed_origins: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();
    let database_url = std::env::var("DATABASE_URL")
        .context("DATABASE_URL must be set to a Postgres instance")?;

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .context("failed to connect to Postgres")?;

    match cli.command {
        Commands::InitDb => {
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Import { file, sheet, label, min_viable_rows } => {
            let matrix = match file.extension().and_then(|e| e.to_str()) {
                Some("csv") => workbook::read_csv_matrix(&file)?,
                _ => workbook::read_workbook_matrix(&file, sheet.as_deref())?,
            };

            let opts = normalize::NormalizeOptions { min_viable_rows };
            let outcome = normalize::normalize_matrix(&matrix, &opts)?;
            info!(
                kept = outcome.rows.len(),
                dropped = outcome.dropped,
                used_fallback = outcome.used_fallback,
                "normalized {}",
                file.display()
            );

            if outcome.rows.is_empty() {
                anyhow::bail!("no usable rows in {}", file.display());
            }

            let receipt = import::import_rows(&pool, label, outcome.rows).await?;
            println!(
                "Imported {} rows as '{}' ({} dropped during normalization).",
                receipt.inserted, receipt.import_label, outcome.dropped
            );
        }
        Commands::Serve { bind, allowed_origins } => {
            let config = server::ServerConfig {
                bind,
                allowed_origins: allowed_origins
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect(),
            };
            server::serve(pool, config).await?;
        }
    }

    Ok(())
}
