//! connectord - bulk VLAN connection driver
//!
//! Reads a driver request, executes it against the vCenter inventory and
//! prints the action results as JSON on stdout.

use anyhow::Context;
use clap::Parser;
use std::io::Read;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use vcshell_connectord::{ConnectConfig, ConnectionCommandOrchestrator};
use vcshell_network::{InMemoryVCenter, Inventory};

/// Bulk VLAN connect/disconnect driver for vCenter VMs
#[derive(Parser, Debug)]
#[command(name = "connectord")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// YAML configuration file
    #[arg(short = 'c', long)]
    config: PathBuf,

    /// Driver request JSON file (`-` or absent reads stdin)
    #[arg(short = 'r', long)]
    request: Option<PathBuf>,

    /// Inventory JSON served by the in-memory vCenter
    #[arg(short = 'i', long)]
    inventory: PathBuf,

    /// Log level (trace, debug, info, warn, error), overridden by RUST_LOG
    #[arg(short = 'l', long, default_value = "info")]
    log_level: String,

    /// Override the configured number of parallel combined actions
    #[arg(long)]
    max_parallelism: Option<usize>,
}

/// Initializes tracing/logging subsystem
fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}

fn read_request(path: Option<&PathBuf>) -> anyhow::Result<String> {
    match path {
        Some(path) if path.as_os_str() != "-" => std::fs::read_to_string(path)
            .with_context(|| format!("reading request {}", path.display())),
        _ => {
            let mut request = String::new();
            std::io::stdin()
                .read_to_string(&mut request)
                .context("reading request from stdin")?;
            Ok(request)
        }
    }
}

async fn run(args: Args) -> anyhow::Result<()> {
    let mut config = ConnectConfig::from_file(&args.config)?;
    if let Some(max_parallelism) = args.max_parallelism {
        config.max_parallelism = max_parallelism;
        config.validate()?;
    }
    info!("Default dvSwitch: {}", config.default_dvswitch);
    info!("Holding network: {}", config.holding_network);
    info!("Max parallelism: {}", config.max_parallelism);

    let inventory = std::fs::read_to_string(&args.inventory)
        .with_context(|| format!("reading inventory {}", args.inventory.display()))?;
    let inventory = Inventory::from_json(&inventory).context("parsing inventory")?;
    let api = Arc::new(InMemoryVCenter::new(inventory));

    let request = read_request(args.request.as_ref())?;
    let orchestrator = ConnectionCommandOrchestrator::from_api(config, api);

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling in-flight actions");
            on_interrupt.cancel();
        }
    });

    let results = orchestrator.connect_bulk_with_cancel(&request, cancel).await?;
    let failed = results.iter().filter(|r| !r.success).count();
    info!("{} result(s), {} failed", results.len(), failed);

    println!("{}", serde_json::to_string_pretty(&results)?);
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(&args.log_level);

    info!("--- Starting connectord ---");

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("connectord failed: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
