//! # slamonctl
//!
//! Runs one evaluation pass: reads the latest model runs from every
//! configured THREDDS node, decides whether each product is on schedule and
//! brings the statuspage.io components and incidents in line.
//!
//! Meant to be run periodically (cron, systemd timer). Only configuration or
//! board setup failures end with a non-zero exit code; a product that cannot
//! be reconciled is logged and retried on the next run.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use chrono::{DateTime, Utc};
use clap::Parser;
use slamon_config::{ConfigLoad, ConfigLoader, ConfigWarnings};
use slamon_core::evaluation::{EvaluationReport, Evaluator};
use slamon_core::ports::{Board, DryRunBoard};
use slamon_core::providers::{StatusPageClient, ThreddsCatalog};
use slamon_core::schedule::parse_instant;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// CLI entry point
#[derive(Parser, Debug)]
#[command(name = "slamonctl", version)]
#[command(
    about = "Monitor timeliness of weather model runs and report it on statuspage.io"
)]
struct Cli {
    /// Configuration file (TOML, or JSON when ending in .json)
    #[arg(value_name = "CONFIG_FILE")]
    config: Option<PathBuf>,

    /// Log board writes instead of performing them
    #[arg(short = 'n', long = "dry-run")]
    dry_run: bool,

    /// Verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Evaluate as if it were this instant (RFC 3339, offset required)
    #[arg(long, value_name = "RFC3339", value_parser = parse_at)]
    at: Option<DateTime<Utc>>,

    /// Environment file loaded before reading SLAMON_* variables
    #[arg(long, value_name = "PATH")]
    env_file: Option<PathBuf>,
}

fn parse_at(value: &str) -> Result<DateTime<Utc>, String> {
    parse_instant(value).map_err(|err| err.to_string())
}

fn init_tracing(verbose: u8) {
    let default_filter = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn log_warnings(warnings: &ConfigWarnings) {
    for warning in &warnings.items {
        match &warning.hint {
            Some(hint) => {
                warn!(message = %warning.message, hint = %hint, "configuration warning")
            }
            None => warn!(message = %warning.message, "configuration warning"),
        }
    }
}

fn log_report(report: &EvaluationReport) {
    for outcome in &report.outcomes {
        match &outcome.result {
            Ok(plan) => info!(
                "{}: {} (required {}, available {})",
                plan.product,
                plan.assessment,
                plan.required,
                outcome
                    .consensus
                    .map_or_else(|| "nothing".to_string(), |p| p.to_string())
            ),
            Err(err) => error!("{}: not reconciled: {}", outcome.product, err),
        }
    }

    let failed = report.failures().count();
    info!(
        "Evaluated {} products at {}: {} board writes, {} failed",
        report.outcomes.len(),
        report.evaluated_at,
        report.writes(),
        failed
    );
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut loader = ConfigLoader::new();
    if let Some(path) = cli.config.clone() {
        loader = loader.with_config_path(path);
    }
    if let Some(path) = cli.env_file.clone() {
        loader = loader.with_env_file(path);
    }
    let ConfigLoad { config, warnings } =
        loader.load().context("failed to load configuration")?;

    if config.metadata.env_file_loaded {
        info!("loaded .env file");
    }
    if let Some(path) = &config.metadata.config_path {
        debug!(path = %path.display(), "configuration loaded");
    }
    log_warnings(&warnings);

    let dry_run = cli.dry_run || config.dry_run;
    let now = cli.at.unwrap_or_else(Utc::now);

    let catalog = Arc::new(
        ThreddsCatalog::new().context("failed to build catalog client")?,
    );
    let client = StatusPageClient::connect(config.statuspage.clone())
        .await
        .with_context(|| {
            format!(
                "failed to read statuspage {}",
                config.statuspage.page_id
            )
        })?;
    let board: Arc<dyn Board> = if dry_run {
        info!("dry run: board writes are only logged");
        Arc::new(DryRunBoard::new(client))
    } else {
        Arc::new(client)
    };

    let evaluator =
        Evaluator::new(catalog, board, config.products, config.nodes);
    let report = evaluator.evaluate(now).await;
    log_report(&report);

    Ok(())
}
