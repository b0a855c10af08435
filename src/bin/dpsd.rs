//! DPS SCPI daemon
//!
//! Exposes a DPS bench power supply on the network as a SCPI instrument.
//! Clients connect over raw TCP (port 5025 by default), one at a time, and
//! send newline-terminated SCPI commands.
//!
//! # Usage
//!
//! ```bash
//! # Serve the supply on /dev/ttyUSB0
//! dpsd
//!
//! # Another device and port, with debug logging
//! dpsd -d /dev/ttyACM0 -p 5555 -v
//!
//! # No hardware: serve an in-memory supply
//! dpsd --simulate
//! ```

use std::path::PathBuf;
use std::process;

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use dps_core::{PowerSupply, SimulatedSupply};
use dps_serial::SerialSupply;
use dpsd::config::{Config, Overrides};
use dpsd::lifecycle::{Lifecycle, SystemdNotifier};
use dpsd::server::{build_interpreter, Listener, ScpiServer};

/// DPS SCPI daemon - network control for DPS bench power supplies
#[derive(Parser, Debug)]
#[command(name = "dpsd", version, about)]
struct Args {
    /// Serial device the supply is attached to [default: /dev/ttyUSB0]
    #[arg(short = 'd', long, value_name = "PATH")]
    device: Option<String>,

    /// Serial baud rate [default: 115200]
    #[arg(short = 'b', long = "baud", value_name = "RATE")]
    baud_rate: Option<u32>,

    /// Log at debug level and trace device frames
    #[arg(short = 'v', long)]
    verbose: bool,

    /// TCP port to listen on [default: 5025]
    #[arg(short = 'p', long, value_name = "PORT")]
    port: Option<u16>,

    /// Config file (defaults to <config_dir>/dpsd/config.toml if present)
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    config_path: Option<PathBuf>,

    /// Serve an in-memory supply instead of a serial device
    #[arg(long)]
    simulate: bool,
}

impl Args {
    fn overrides(&self) -> Overrides {
        Overrides {
            device: self.device.clone(),
            baud_rate: self.baud_rate,
            port: self.port,
            verbose: self.verbose,
            simulate: self.simulate,
            config_path: self.config_path.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = Config::load(&args.overrides()).context("Failed to load configuration")?;

    init_logging(config.verbose)?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        pid = process::id(),
        "DPS SCPI daemon starting"
    );

    run(config).await
}

fn init_logging(verbose: bool) -> Result<()> {
    let filter = log_filter(EnvFilter::try_from_default_env().ok(), verbose)?;
    tracing_subscriber::fmt().with_env_filter(filter).init();
    Ok(())
}

/// Uses `RUST_LOG` when it is set, the crate defaults otherwise.
fn log_filter(from_env: Option<EnvFilter>, verbose: bool) -> Result<EnvFilter> {
    if let Some(filter) = from_env {
        return Ok(filter);
    }

    let level = if verbose { "debug" } else { "info" };
    Ok(EnvFilter::default()
        .add_directive(format!("dpsd={level}").parse()?)
        .add_directive(format!("dps_scpi={level}").parse()?)
        .add_directive(format!("dps_serial={level}").parse()?))
}

fn open_supply(config: &Config) -> Result<Box<dyn PowerSupply>> {
    if config.simulate {
        info!("Using simulated supply");
        return Ok(Box::new(SimulatedSupply::new()));
    }

    let supply = SerialSupply::open(&config.device, config.baud_rate, config.verbose)
        .with_context(|| format!("Failed to open supply on {}", config.device))?;
    info!(
        device = %config.device,
        baud_rate = config.baud_rate,
        "Connected to supply"
    );
    Ok(Box::new(supply))
}

async fn run(config: Config) -> Result<()> {
    let cancel_token = CancellationToken::new();

    let shutdown_token = cancel_token.clone();
    tokio::spawn(async move {
        if let Err(e) = wait_for_shutdown_signal().await {
            error!(error = %e, "Error waiting for shutdown signal");
        }
        info!("Shutdown signal received");
        shutdown_token.cancel();
    });

    let supply = open_supply(&config)?;
    let interpreter = build_interpreter(supply, config.identity.clone())
        .context("Failed to build command table")?;

    let listener = Listener::bind(config.port)
        .with_context(|| format!("Failed to listen on port {}", config.port))?;
    info!(port = listener.local_addr().port(), "Listening on port");

    let lifecycle = SystemdNotifier::from_env();
    lifecycle.ready("Accepting SCPI connections");

    let mut server = ScpiServer::new(listener, interpreter, lifecycle, cancel_token);
    server.run().await;

    server.lifecycle().stopping("Shutting down");
    info!("DPS SCPI daemon stopped");
    Ok(())
}

/// Waits for SIGTERM or SIGINT.
async fn wait_for_shutdown_signal() -> Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm = signal(SignalKind::terminate())?;
        let mut sigint = signal(SignalKind::interrupt())?;

        tokio::select! {
            _ = sigterm.recv() => {
                info!("Received SIGTERM");
            }
            _ = sigint.recv() => {
                info!("Received SIGINT");
            }
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
        info!("Received Ctrl+C");
    }

    Ok(())
}
