use crate::config::Config;
use crate::display::TerminalDisplay;
use crate::monitor::Monitor;
use std::fs::OpenOptions;
use std::sync::Mutex;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

mod config;
mod display;
mod failure;
mod mesh;
mod meter;
mod monitor;
mod prober;
mod protocol;
mod sim;
mod transport;
mod view;

use clap::{Parser, Subcommand};

/// meshwatch: live monitor for a mesh network coordinator
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the monitor against the simulated mesh
    Run {
        /// Path to the configuration file (defaults apply when omitted)
        #[arg(short, long)]
        config: Option<String>,
    },
    /// Validate configuration file
    Validate {
        /// Path to the configuration file
        #[arg(short, long, default_value = "meshwatch.toml")]
        config: String,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command.unwrap_or(Commands::Run { config: None }) {
        Commands::Run { config } => run_monitor(config.as_deref()).await,
        Commands::Validate { config } => validate_config(&config),
    }
}

fn filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
}

/// The monitor owns the terminal, so its logs go to a file instead.
fn init_file_logging(config: &Config) -> anyhow::Result<()> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&config.log.file)?;
    tracing_subscriber::fmt()
        .with_env_filter(filter(&config.log.level))
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .init();
    Ok(())
}

fn validate_config(path: &str) -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter(filter("info")).init();

    match Config::load(path) {
        Ok(cfg) => {
            info!("Configuration '{}' is valid.", path);
            info!(
                "Probe every {}ms, rate window {}ms, frame {} bytes",
                cfg.monitor.probe_interval_ms, cfg.monitor.rate_window_ms, cfg.monitor.frame_bytes
            );
            info!(
                "Simulated nodes: {}, probe loss {:.0}%",
                cfg.sim.nodes,
                cfg.sim.probe_loss * 100.0
            );
            info!("Logging to {}", cfg.log.file.display());
            Ok(())
        }
        Err(e) => {
            error!("Configuration '{}' is INVALID: {}", path, e);
            Err(anyhow::anyhow!("Invalid config"))
        }
    }
}

async fn run_monitor(config_path: Option<&str>) -> anyhow::Result<()> {
    let config = match config_path {
        Some(path) => Config::load(path)
            .map_err(|e| anyhow::anyhow!("Failed to load config '{}': {}", path, e))?,
        None => Config::default(),
    };
    init_file_logging(&config)?;

    info!(
        "Starting meshwatch with {} simulated nodes",
        config.sim.nodes
    );

    let (mesh, transport) = sim::simulated(&config.sim, config.monitor.frame_bytes);
    let display = TerminalDisplay::stdout()?;
    let mut monitor = Monitor::new(mesh, transport, display, &config.monitor);

    let result = monitor.run().await;
    match &result {
        Ok(()) => info!(
            "Stopped after {} frames received",
            monitor.total_received()
        ),
        Err(e) => error!("Monitor failed: {}", e),
    }
    if let Some(node_id) = monitor.failures().failed() {
        info!("Node {} was unreachable at its last probe", node_id);
    }
    result
}
