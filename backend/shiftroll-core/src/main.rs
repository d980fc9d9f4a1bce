// src/main.rs
use anyhow::Context;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use clap::{Parser, Subcommand};
use std::{path::PathBuf, sync::Arc};
use thiserror::Error;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod aggregate;
mod clock;
mod config;
mod export;
mod period;
mod reconcile;
mod records;
mod roster;
mod roster_tests;
mod routes;
mod store;
mod time_grid;

use crate::clock::SystemClock;
use crate::config::Config;
use crate::period::{PayPeriod, PeriodError};
use crate::roster::{RosterError, RosterService};
use crate::routes::AppState;
use crate::store::{InMemoryStore, RecordStore};
use crate::time_grid::TimeParseError;

// --- Error Handling ---

#[derive(Error, Debug)]
enum AppError {
    #[error(transparent)]
    Roster(#[from] RosterError),
    #[error(transparent)]
    Period(#[from] PeriodError),
    #[error("Invalid time: {0}")]
    Time(#[from] TimeParseError),
}

// Map AppError to a JSON error response
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status_code, error_message) = match &self {
            AppError::Roster(RosterError::Store(_)) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error (record store). Check logs.".to_string(),
            ),
            AppError::Roster(RosterError::Export(_)) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error (export). Check logs.".to_string(),
            ),
            AppError::Roster(RosterError::InvalidInput(msg)) => {
                (StatusCode::BAD_REQUEST, msg.clone())
            }
            AppError::Roster(RosterError::UnknownEmployee(id)) => {
                (StatusCode::BAD_REQUEST, format!("Unknown employee {}", id))
            }
            AppError::Roster(RosterError::Period(e)) | AppError::Period(e) => {
                (StatusCode::BAD_REQUEST, e.to_string())
            }
            AppError::Time(e) => (StatusCode::BAD_REQUEST, e.to_string()),
        };

        if status_code.is_server_error() {
            error!("Error occurred: {:?}", self);
        } else {
            warn!("Rejected request: {}", self);
        }

        (
            status_code,
            Json(serde_json::json!({ "error": error_message })),
        )
            .into_response()
    }
}

// --- Command Line ---

#[derive(Parser, Debug)]
#[command(name = "shiftroll", version, about = "Pay-period shift roster and hours reconciliation", long_about = None)]
struct Cli {
    /// Overrides SHIFTROLL_SERVER_HOST
    #[arg(long, global = true)]
    host: Option<String>,

    /// Overrides SHIFTROLL_SERVER_PORT
    #[arg(long, global = true)]
    port: Option<u16>,

    /// Overrides SHIFTROLL_DATA_FILE
    #[arg(long, global = true, value_name = "PATH")]
    data_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP API (default)
    Serve,
    /// Print a period's weekly and total hours as CSV
    Summary {
        #[arg(long)]
        year: Option<i32>,
        #[arg(long)]
        month: Option<u32>,
    },
}

impl Cli {
    fn apply_to(&self, config: &mut Config) {
        if let Some(host) = &self.host {
            config.server_host = host.clone();
        }
        if let Some(port) = self.port {
            config.server_port = port;
        }
        if let Some(path) = &self.data_file {
            config.data_file = Some(path.clone());
        }
    }
}

// --- Main Application Logic ---

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let mut config = Config::from_env().context("Failed to read SHIFTROLL_* configuration")?;
    cli.apply_to(&mut config);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let store: Arc<dyn RecordStore> = match &config.data_file {
        Some(path) => Arc::new(
            InMemoryStore::open(path)
                .with_context(|| format!("Failed to open store snapshot {}", path.display()))?,
        ),
        None => {
            info!("No data file configured; records live in memory only.");
            Arc::new(InMemoryStore::new())
        }
    };
    let roster = Arc::new(RosterService::new(
        store,
        Arc::new(SystemClock),
        config.weekly_threshold(),
    ));

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(&config, roster).await,
        Command::Summary { year, month } => print_summary(&roster, year, month).await,
    }
}

async fn serve(config: &Config, roster: Arc<RosterService>) -> anyhow::Result<()> {
    let app = routes::router(AppState { roster });

    let addr = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("Starting server on http://{}", addr);
    axum::serve(listener, app).await.context("Server error")?;
    Ok(())
}

async fn print_summary(
    roster: &RosterService,
    year: Option<i32>,
    month: Option<u32>,
) -> anyhow::Result<()> {
    let (year, month) = match (year, month) {
        (Some(year), Some(month)) => (year, month),
        (None, None) => {
            let period: PayPeriod = roster.current_period()?;
            (period.year(), period.month())
        }
        _ => anyhow::bail!("--year and --month must be given together"),
    };
    let csv = roster
        .hours_csv(year, month)
        .await
        .with_context(|| format!("Failed to summarize period {}-{:02}", year, month))?;
    print!("{}", csv);
    Ok(())
}
