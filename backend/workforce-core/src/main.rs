// src/main.rs
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{Datelike, Local};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use workforce_core::cached_source::{CachedTimeTracking, CachedWorkforce};
use workforce_core::config::{EngineConfig, TogglConfig};
use workforce_core::engine::SummaryEngine;
use workforce_core::snapshot::SnapshotSource;
use workforce_core::toggl_client::TogglClient;

#[derive(Parser, Debug)]
#[command(name = "workforce-core", version, about = "Monthly workforce summaries")]
struct Cli {
    /// Directory with the exported workforce JSON files.
    #[arg(long, env = "WORKFORCE_DATA_DIR", default_value = "data", global = true)]
    data_dir: PathBuf,

    /// Pretty-print JSON output.
    #[arg(long, global = true)]
    pretty: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Summaries for one month, optionally for a single employee.
    Summary {
        #[arg(long)]
        year: Option<i32>,
        #[arg(long)]
        month: Option<u32>,
        #[arg(long)]
        employee: Option<String>,
        /// Also print tracked hours from the time tracker.
        #[arg(long)]
        tracked: bool,
    },
    /// All months of a range of years.
    Report {
        #[arg(long)]
        from_year: Option<i32>,
        #[arg(long)]
        to_year: Option<i32>,
    },
}

fn print_json<T: Serialize>(value: &T, pretty: bool) -> Result<()> {
    let out = if pretty {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    }
    .context("Failed to serialize output")?;
    println!("{}", out);
    Ok(())
}

fn build_engine(cli: &Cli, config: EngineConfig) -> Result<SummaryEngine> {
    let workforce = CachedWorkforce::new(SnapshotSource::new(&cli.data_dir), config.clone());
    let mut engine = SummaryEngine::new(Arc::new(workforce), config.clone());

    match TogglConfig::from_env() {
        Some(toggl_config) => {
            let client = TogglClient::new(toggl_config)
                .context("Failed to build time-tracking client")?;
            engine = engine.with_time_tracking(Arc::new(CachedTimeTracking::new(client, config)));
            info!("Time tracking enabled.");
        }
        None => info!("TOGGL_API_TOKEN / TOGGL_WORKSPACE_ID not set, time tracking disabled."),
    }
    Ok(engine)
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Setting default subscriber failed")?;

    let cli = Cli::parse();
    let config = EngineConfig::from_env().context("Invalid WORKFORCE_* configuration")?;
    info!("Reading workforce data from {}", cli.data_dir.display());
    let engine = build_engine(&cli, config)?;
    let today = Local::now().date_naive();

    match &cli.command {
        Command::Summary {
            year,
            month,
            employee,
            tracked,
        } => {
            let year = year.unwrap_or(today.year());
            let month = month.unwrap_or(today.month());
            match employee {
                Some(employee_id) => {
                    let summary = engine
                        .get_employee_monthly_summary(employee_id, year, month)
                        .await?;
                    if summary.is_none() {
                        warn!("No active employee '{}' in {}-{:02}", employee_id, year, month);
                    }
                    print_json(&summary, cli.pretty)?;
                }
                None => {
                    let summaries = engine.generate_monthly_summary(year, month, None).await?;
                    print_json(&summaries, cli.pretty)?;
                }
            }
            if *tracked {
                let hours = engine.tracked_hours(year, month, None).await?;
                print_json(&hours, cli.pretty)?;
            }
        }
        Command::Report { from_year, to_year } => {
            let from_year = from_year.unwrap_or(today.year());
            let to_year = to_year.unwrap_or(from_year);
            let report = engine.generate_period_report(from_year, to_year).await.map_err(|e| {
                if let Some(wait) = e.retry_after() {
                    warn!("Retry possible in {}s", wait.as_secs());
                }
                e
            })?;
            print_json(&report, cli.pretty)?;
        }
    }

    Ok(())
}
