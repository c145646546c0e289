//! AssetWatch CLI
//!
//! Runs the dashboard API server, or a single report from the terminal.

use anyhow::{bail, Context, Result};
use assetwatch_api::{create_router, AppState};
use assetwatch_reports::{ReportError, Reporter, CATALOGUE};
use assetwatch_warehouse::snowflake::SnowflakeConnector;
use assetwatch_warehouse::sqlite::SqliteConnector;
use assetwatch_warehouse::{Connector, SnowflakeSettings};
use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "assetwatch")]
#[command(about = "AssetWatch - IT asset and vulnerability dashboard backend")]
#[command(version)]
struct Cli {
    /// Query a local SQLite warehouse file instead of Snowflake
    #[arg(long)]
    sqlite: Option<PathBuf>,

    /// Load environment variables from this file instead of ./.env
    #[arg(long)]
    env_file: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the web server
    Serve {
        /// Address to bind to
        #[arg(short, long, default_value = "127.0.0.1:8000")]
        bind: SocketAddr,

        /// Static files directory (built dashboard)
        #[arg(short, long)]
        static_dir: Option<PathBuf>,
    },

    /// Run one report and print its JSON
    Report {
        /// Report name, see `list`
        name: String,

        /// Row limit for reports that accept one
        #[arg(short, long)]
        limit: Option<u32>,

        /// Fail instead of printing the default when the query fails
        #[arg(long)]
        strict: bool,
    },

    /// List available reports
    List,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .compact()
        .init();

    load_env(cli.env_file.as_deref())?;

    let connector = connector(cli.sqlite.as_deref())?;
    let reporter = Reporter::new(connector);

    match cli.command {
        Commands::Serve { bind, static_dir } => {
            serve(reporter, bind, static_dir).await?;
        }
        Commands::Report {
            name,
            limit,
            strict,
        } => {
            report(&reporter, &name, limit, strict).await?;
        }
        Commands::List => {
            list();
        }
    }

    Ok(())
}

/// Load `.env` once at startup. A missing default file is fine, a missing
/// explicit one is not.
fn load_env(env_file: Option<&Path>) -> Result<()> {
    match env_file {
        Some(path) => {
            dotenv::from_path(path)
                .with_context(|| format!("failed to load env file {}", path.display()))?;
            info!("Loaded environment from {}", path.display());
        }
        None => {
            if let Ok(path) = dotenv::dotenv() {
                info!("Loaded environment from {}", path.display());
            }
        }
    }
    Ok(())
}

fn connector(sqlite: Option<&Path>) -> Result<Arc<dyn Connector>> {
    if let Some(path) = sqlite {
        info!("Using local SQLite warehouse {}", path.display());
        return Ok(Arc::new(SqliteConnector::open(path)));
    }

    let settings = SnowflakeSettings::from_env();
    match settings.credentials() {
        Ok(creds) => info!(account = creds.account, "Using Snowflake warehouse"),
        Err(e) => warn!("{}; reports will serve their defaults", e),
    }

    Ok(Arc::new(SnowflakeConnector::new(settings)?))
}

async fn serve(reporter: Reporter, bind: SocketAddr, static_dir: Option<PathBuf>) -> Result<()> {
    let state = Arc::new(AppState::new(reporter));
    let router = create_router(state, static_dir.clone());

    info!("Starting AssetWatch server on {}", bind);
    if let Some(ref dir) = static_dir {
        info!("Serving static files from {}", dir.display());
    }

    let listener = tokio::net::TcpListener::bind(bind).await?;
    axum::serve(listener, router).await?;

    Ok(())
}

async fn report(reporter: &Reporter, name: &str, limit: Option<u32>, strict: bool) -> Result<()> {
    let outcome = if strict {
        reporter.try_run_named(name, limit).await
    } else {
        reporter.run_named(name, limit).await
    };

    let rows = match outcome {
        Err(ReportError::UnknownReport(name)) => {
            bail!("unknown report '{}', run `assetwatch list`", name)
        }
        other => other?,
    };

    println!("{}", serde_json::to_string_pretty(&rows)?);
    Ok(())
}

fn list() {
    println!("{:<28} {:<26} {}", "NAME", "PATH", "DESCRIPTION");
    println!("{}", "-".repeat(90));

    for report in CATALOGUE {
        println!("{:<28} {:<26} {}", report.name, report.path, report.description);
    }
}
