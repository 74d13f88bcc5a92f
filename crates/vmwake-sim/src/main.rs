//! vmwake-sim - VM wake bridge simulator
//!
//! Runs a toy cooperative VM on the threaded software RTOS and reports how the
//! scheduling bridge armed its timer and woke the VM task.

#![deny(static_mut_refs)]
#![deny(unused_must_use)]
#![deny(clippy::unwrap_used)]

mod config;
mod error;
mod output;
mod simulation;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use vmwake_bridge::ShutdownPolicy;

use crate::config::SimConfig;
use crate::error::SimError;

#[derive(Parser)]
#[command(name = "vmwake-sim")]
#[command(about = "Simulate a cooperative VM idling on the RTOS scheduling bridge")]
#[command(version)]
#[command(long_about = "
vmwake-sim runs a small cooperative VM whose green threads sleep until given
deadlines. The VM asks the scheduling bridge to wake it at the earliest deadline,
idles on the wake signal, and resumes whatever is due. An optional external event
source wakes the VM early to exercise the semaphore handshake.

Use --json for machine-readable output.
")]
struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    json: bool,

    /// Verbose logging
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a simulation
    Run(RunArgs),

    /// Print the effective configuration as JSON
    Config {
        /// Configuration file to load
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

#[derive(Args)]
struct RunArgs {
    /// Configuration file to load before applying flags
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Timer service tick rate in Hz
    #[arg(long)]
    tick_rate_hz: Option<u32>,

    /// Green thread sleep durations in milliseconds, comma separated
    #[arg(long, value_delimiter = ',')]
    delays: Vec<i64>,

    /// Period of the external event source in milliseconds
    #[arg(long)]
    external_wake_interval_ms: Option<u64>,

    /// Number of external events to raise
    #[arg(long)]
    external_wakes: Option<u32>,

    /// What shutdown does with the timer and semaphore
    #[arg(long, value_enum)]
    shutdown_policy: Option<PolicyArg>,
}

#[derive(Clone, Copy, ValueEnum)]
enum PolicyArg {
    Retain,
    Release,
}

impl From<PolicyArg> for ShutdownPolicy {
    fn from(arg: PolicyArg) -> Self {
        match arg {
            PolicyArg::Retain => Self::Retain,
            PolicyArg::Release => Self::Release,
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("vmwake_sim={log_level},vmwake_bridge={log_level},vmwake_rtos={log_level}")
                    .into()
            }),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    match execute_command(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if cli.json {
                output::print_error_json(&e);
            } else {
                output::print_error_human(&e);
            }

            let code = e.downcast_ref::<SimError>().map_or(1, SimError::exit_code);
            ExitCode::from(u8::try_from(code).unwrap_or(1))
        }
    }
}

fn execute_command(cli: &Cli) -> Result<()> {
    match &cli.command {
        Commands::Run(args) => {
            let config = resolve_config(args)?;
            let report = simulation::run(&config)?;
            output::print_report(&report, cli.json);
            Ok(())
        }
        Commands::Config { config } => {
            let config = load_config(config.as_deref())?;
            output::print_config(&config).context("failed to render configuration")?;
            Ok(())
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<SimConfig> {
    match path {
        Some(path) => SimConfig::load(path)
            .with_context(|| format!("failed to load configuration from {}", path.display())),
        None => Ok(SimConfig::default()),
    }
}

fn resolve_config(args: &RunArgs) -> Result<SimConfig> {
    let mut config = load_config(args.config.as_deref())?;
    if let Some(hz) = args.tick_rate_hz {
        config.tick_rate_hz = hz;
    }
    if !args.delays.is_empty() {
        config.delays_ms.clone_from(&args.delays);
    }
    if let Some(interval) = args.external_wake_interval_ms {
        config.external_wake_interval_ms = Some(interval);
    }
    if let Some(count) = args.external_wakes {
        config.external_wakes = count;
    }
    if let Some(policy) = args.shutdown_policy {
        config.bridge.shutdown_policy = policy.into();
    }
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    type TestResult = Result<(), Box<dyn std::error::Error>>;

    #[test]
    fn parse_run_defaults() -> TestResult {
        let cli = Cli::try_parse_from(["vmwake-sim", "run"])?;
        assert!(!cli.json);
        assert_eq!(cli.verbose, 0);
        let Commands::Run(args) = cli.command else {
            return Err("expected run".into());
        };
        let config = resolve_config(&args)?;
        assert_eq!(config, SimConfig::default());
        Ok(())
    }

    #[test]
    fn parse_run_overrides() -> TestResult {
        let cli = Cli::try_parse_from([
            "vmwake-sim",
            "run",
            "--tick-rate-hz",
            "100",
            "--delays",
            "5,15,25",
            "--external-wake-interval-ms",
            "3",
            "--external-wakes",
            "2",
            "--shutdown-policy",
            "release",
            "-vv",
            "--json",
        ])?;
        assert!(cli.json);
        assert_eq!(cli.verbose, 2);
        let Commands::Run(args) = cli.command else {
            return Err("expected run".into());
        };
        let config = resolve_config(&args)?;
        assert_eq!(config.tick_rate_hz, 100);
        assert_eq!(config.delays_ms, vec![5, 15, 25]);
        assert_eq!(config.external_wake_interval_ms, Some(3));
        assert_eq!(config.external_wakes, 2);
        assert_eq!(config.bridge.shutdown_policy, ShutdownPolicy::Release);
        Ok(())
    }

    #[test]
    fn parse_rejects_unknown_policy() {
        let result = Cli::try_parse_from(["vmwake-sim", "run", "--shutdown-policy", "destroy"]);
        assert!(matches!(result, Err(_)));
    }

    #[test]
    fn parse_config_command() -> TestResult {
        let cli = Cli::try_parse_from(["vmwake-sim", "config", "--config", "sim.json"])?;
        assert!(matches!(
            cli.command,
            Commands::Config { config: Some(ref path) } if path == Path::new("sim.json")
        ));
        Ok(())
    }
}
