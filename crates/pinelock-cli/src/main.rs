//! PineLock node entry point.
//!
//! Parses CLI arguments, initializes structured logging and either runs the
//! control loop against simulated peripherals or checks a configuration
//! file.

mod simulator;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use pinelock_core::{DeviceConfig, SystemClock};
use pinelock_engine::{Device, Runtime, prepare_store};
use pinelock_network::{NoopWatchdog, TcpTransport, TcpTransportConfig};
use pinelock_storage::FileKeyValue;
use simulator::Panel;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// PineLock access-control node.
#[derive(Parser, Debug)]
#[command(name = "pinelock")]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the node with a simulated front panel on stdin.
    Run {
        /// Path to the TOML configuration file.
        #[arg(long)]
        config: PathBuf,

        /// Log filter, e.g. "pinelock=debug". Overrides RUST_LOG.
        #[arg(long)]
        log_level: Option<String>,

        /// Behave like a board without a real-time clock.
        #[arg(long, default_value = "false")]
        no_rtc: bool,
    },

    /// Parse and validate a configuration file, then print the effective
    /// settings.
    CheckConfig {
        /// Path to the TOML configuration file.
        #[arg(long)]
        config: PathBuf,
    },
}

fn init_logging(filter: Option<&str>) {
    let filter = match filter {
        Some(directives) => EnvFilter::new(directives),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new("pinelock=info,pinelock_engine=info,pinelock_storage=info,pinelock_network=info")
        }),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn load_config(path: &Path) -> Result<DeviceConfig> {
    DeviceConfig::load(path).with_context(|| format!("loading {}", path.display()))
}

fn check_config(path: &Path) -> Result<()> {
    let config = load_config(path)?;
    let effective = toml::to_string_pretty(&config).context("rendering configuration")?;
    println!("# {} is valid", path.display());
    println!("# client id: {}", config.client_id());
    print!("{effective}");
    Ok(())
}

async fn run(path: &Path, no_rtc: bool) -> Result<()> {
    let config = load_config(path)?;
    let clock = if no_rtc {
        SystemClock::without_rtc()
    } else {
        SystemClock::new()
    };

    let store = prepare_store(
        &config.access,
        Box::new(FileKeyValue::new(config.storage.path.clone())),
    );
    let (panel, peripherals) = Panel::new();
    let device = Device::new(&config, peripherals, store, Box::new(clock))
        .context("starting device")?;

    let transport = TcpTransport::new(TcpTransportConfig::from_device_config(&config));
    let mut runtime = Runtime::new(&config, device, transport, NoopWatchdog);

    info!(
        device = %config.device.id,
        broker = %config.broker.address,
        version = pinelock_core::VERSION,
        "PineLock node starting"
    );

    tokio::spawn(panel.drive_from_stdin());
    runtime.run_until(shutdown_on(tokio::signal::ctrl_c())).await;
    Ok(())
}

/// Resolves when `signal` fires. If the handler cannot be installed the node
/// keeps running rather than stopping at once.
async fn shutdown_on(signal: impl Future<Output = std::io::Result<()>>) {
    match signal.await {
        Ok(()) => info!("Shutdown requested"),
        Err(e) => {
            warn!(error = %e, "Cannot listen for Ctrl-C, running until killed");
            std::future::pending::<()>().await;
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run {
            config,
            log_level,
            no_rtc,
        } => {
            init_logging(log_level.as_deref());
            run(&config, no_rtc).await
        }
        Commands::CheckConfig { config } => {
            init_logging(None);
            check_config(&config)
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::time::Duration;

    #[rstest]
    #[case(&["pinelock", "run", "--config", "node.toml"])]
    #[case(&["pinelock", "run", "--config", "node.toml", "--log-level", "pinelock=debug", "--no-rtc"])]
    #[case(&["pinelock", "check-config", "--config", "node.toml"])]
    fn test_cli_parses(#[case] args: &[&str]) {
        assert!(Cli::try_parse_from(args).is_ok());
    }

    #[test]
    fn test_config_is_required() {
        assert!(Cli::try_parse_from(["pinelock", "run"]).is_err());
    }

    #[tokio::test]
    async fn test_shutdown_on_signal() {
        let stopped = tokio::time::timeout(
            Duration::from_millis(100),
            shutdown_on(std::future::ready(Ok(()))),
        )
        .await;
        assert!(stopped.is_ok());
    }

    #[tokio::test]
    async fn test_failed_signal_handler_keeps_running() {
        let failed = std::future::ready(Err(std::io::Error::other("no signal support")));
        let stopped = tokio::time::timeout(Duration::from_millis(50), shutdown_on(failed)).await;
        assert!(stopped.is_err());
    }
}
