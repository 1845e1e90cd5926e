//! OnusOne Economics CLI
//!
//! Runs the economic engine against the wall clock, replays scenarios
//! against a manual clock, and prints configuration.

mod scenario;

use anyhow::Context;
use clap::{Parser, Subcommand};
use onus_economics::{EconomicCycleScheduler, EconomicEngine, EconomicsConfig, LogFormat, SystemClock};
use onus_economics::config::LoggingConfig;
use parking_lot::Mutex;
use scenario::Scenario;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "onus")]
#[command(author = "OnusOne Contributors")]
#[command(version)]
#[command(about = "OnusOne economic engine - stake decay, treasury tax and payouts", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long, global = true, default_value = "onus.toml", env = "ONUS_CONFIG")]
    config: PathBuf,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the engine against the system clock until interrupted
    Run,

    /// Replay a JSON scenario against a simulated clock
    Simulate {
        /// Scenario file
        #[arg(short, long)]
        scenario: PathBuf,

        /// Override the scenario duration (minutes)
        #[arg(short, long)]
        minutes: Option<u64>,

        /// Write the report to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Print the effective configuration as TOML
    Config {
        /// Ignore the config file and print built-in defaults
        #[arg(long)]
        defaults: bool,
    },

    /// Version information
    Version,
}

fn init_logging(verbose: bool, logging: &LoggingConfig) {
    let default_level = if verbose { "debug" } else { logging.level.as_str() };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let (pretty, json) = match logging.format {
        LogFormat::Pretty => (
            Some(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false),
            ),
            None,
        ),
        LogFormat::Json => (None, Some(tracing_subscriber::fmt::layer().json().with_target(true))),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(pretty)
        .with(json)
        .init();
}

fn load_config(path: &Path) -> anyhow::Result<(EconomicsConfig, bool)> {
    if path.exists() {
        let config = EconomicsConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?;
        Ok((config, true))
    } else {
        Ok((EconomicsConfig::default(), false))
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let (config, from_file) = load_config(&cli.config)?;
    init_logging(cli.verbose, &config.logging);

    match cli.command {
        Commands::Run => {
            if from_file {
                tracing::info!("Config: {:?}", cli.config);
            } else {
                tracing::info!("Config {:?} not found, using defaults", cli.config);
            }

            let engine = EconomicEngine::new(config.clone(), Arc::new(SystemClock))?;
            let engine = Arc::new(Mutex::new(engine));
            let mut scheduler = EconomicCycleScheduler::new(Arc::clone(&engine), &config.scheduler);

            let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    let _ = shutdown_tx.send(()).await;
                }
            });

            scheduler.run(shutdown_rx).await;

            let engine = engine.lock();
            let treasury = engine.treasury();
            tracing::info!(
                collected = treasury.total_collected,
                rewards_paid = treasury.total_rewards_paid,
                expired = treasury.expired_content,
                "Engine stopped"
            );
        }

        Commands::Simulate { scenario, minutes, output } => {
            let scenario = Scenario::load(&scenario)?;
            let report = scenario.replay(&config, minutes)?;
            let json = serde_json::to_string_pretty(&report)?;

            match output {
                Some(path) => {
                    std::fs::write(&path, &json)?;
                    println!("Report written to {:?}", path);
                }
                None => println!("{}", json),
            }
        }

        Commands::Config { defaults } => {
            let config = if defaults { EconomicsConfig::default() } else { config };
            print!("{}", config.to_toml_string()?);
        }

        Commands::Version => {
            println!("onus {}", env!("CARGO_PKG_VERSION"));
            println!();
            println!("Components:");
            println!("  - Network metrics & congestion classification");
            println!("  - Content decay engine with treasury tax");
            println!("  - Logarithmic stake pool multipliers");
            println!("  - Health-adjusted payout tax policy");
        }
    }

    Ok(())
}
