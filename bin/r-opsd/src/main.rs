//! ---
//! ops_section: "04-runtime"
//! ops_subsection: "binary"
//! ops_type: "source"
//! ops_scope: "code"
//! ops_description: "Binary entrypoint for the R-OPS failover daemon."
//! ops_version: "v0.0.0-prealpha"
//! ops_owner: "tbd"
//! ---
use std::io::Read;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use r_ops_common::{init_tracing, AppConfig, Mode};
use r_ops_metrics::{new_registry, spawn_http_server};
use serde_json::{json, Value};
use tokio::signal;
use tracing::{info, warn};

mod server;
mod wiring;

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "R-OPS disaster-recovery failover daemon",
    long_about = None
)]
struct Cli {
    #[arg(long, value_name = "FILE", help = "Path to configuration file")]
    config: Option<PathBuf>,

    #[arg(
        long,
        help = "Use the in-memory control plane seeded from the [simulation] section"
    )]
    simulate: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    #[command(about = "Run one failover invocation and print the response envelope")]
    Invoke {
        #[arg(
            long,
            value_name = "FILE",
            default_value = "-",
            help = "JSON event file, or '-' for stdin"
        )]
        event: String,
    },
    #[command(about = "Probe primary health and standby readiness without acting")]
    Assess,
    #[command(about = "Serve the failover API and the metrics exporter")]
    Serve,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let mut candidates = Vec::new();
    if let Some(path) = &cli.config {
        candidates.push(path.clone());
    }
    candidates.push(PathBuf::from("configs/example.prod.toml"));
    candidates.push(PathBuf::from("configs/example.sim.toml"));

    let loaded = AppConfig::load_with_source(&candidates)?;
    let mut config = loaded.config;
    if cli.simulate {
        config.mode = Mode::Simulation;
    }

    match cli.command {
        Commands::Invoke { event } => {
            // stdout carries the envelope; diagnostics go to stderr
            r_ops_logging::init();
            info!(config = %loaded.source.display(), mode = ?config.mode, "configuration loaded");
            invoke(&config, &event).await
        }
        Commands::Assess => {
            r_ops_logging::init();
            assess(&config).await
        }
        Commands::Serve => {
            init_tracing("r-opsd", &config.logging)?;
            info!(config = %loaded.source.display(), mode = ?config.mode, "configuration loaded");
            serve(config).await?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn read_event(source: &str) -> Result<Value> {
    let raw = if source == "-" {
        let mut buffer = String::new();
        std::io::stdin()
            .read_to_string(&mut buffer)
            .context("failed to read event from stdin")?;
        buffer
    } else {
        std::fs::read_to_string(source)
            .with_context(|| format!("unable to read event file {}", source))?
    };
    if raw.trim().is_empty() {
        return Ok(json!({}));
    }
    serde_json::from_str(&raw).with_context(|| format!("event {} is not valid JSON", source))
}

async fn invoke(config: &AppConfig, event_source: &str) -> Result<ExitCode> {
    let event = read_event(event_source)?;
    let orchestrator = wiring::build_orchestrator(config, new_registry())?;
    let envelope = orchestrator.handle_json(event).await;
    println!("{}", serde_json::to_string_pretty(&envelope)?);
    Ok(if envelope.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

async fn assess(config: &AppConfig) -> Result<ExitCode> {
    let orchestrator = wiring::build_orchestrator(config, new_registry())?;
    let failover = orchestrator.config();
    let assessor = orchestrator.assessor();
    let primary = assessor
        .assess_primary(&failover.primary_region, &failover.primary_database)
        .await;
    let standby = assessor
        .assess_standby_readiness(
            &failover.standby_region,
            &failover.standby_database,
            &failover.standby_compute,
        )
        .await;
    let ready = standby.is_ready();
    println!(
        "{}",
        serde_json::to_string_pretty(&json!({
            "environment": failover.environment,
            "primary": primary,
            "standby": standby,
        }))?
    );
    Ok(if ready {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

async fn serve(config: AppConfig) -> Result<()> {
    let registry = new_registry();
    let orchestrator = Arc::new(wiring::build_orchestrator(&config, registry.clone())?);

    let metrics_server = if config.metrics.enabled {
        Some(spawn_http_server(registry, config.metrics.listen)?)
    } else {
        info!("metrics exporter disabled by configuration");
        None
    };

    let api_server = if config.api.enabled {
        let server = server::spawn_failover_server(orchestrator, config.api.listen)?;
        info!(address = %server.addr(), "failover api enabled");
        Some(server)
    } else {
        warn!("failover api disabled by configuration; only metrics are served");
        None
    };

    info!(mode = ?config.mode, environment = %config.failover.environment, "daemon running; waiting for termination signal");
    signal::ctrl_c().await?;
    info!("ctrl-c received; shutting down");

    if let Some(server) = api_server {
        server.shutdown().await?;
    }
    if let Some(server) = metrics_server {
        server.shutdown().await?;
    }
    Ok(())
}
