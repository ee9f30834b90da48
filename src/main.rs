//! # Lifecycle CLI Entry Point
//!
//! ## Usage
//!
//! ```bash
//! # Run a replay script through the full tracking pipeline
//! lifecycle replay ./session.json
//!
//! # Show persisted usage, ten most used components per device
//! lifecycle report
//!
//! # Show a single device
//! lifecycle report --device "Xbox Wireless Controller" --top 25
//!
//! # Print resolved config and data locations
//! lifecycle paths
//! ```

use lifecycle::config::Config;
use lifecycle::device::{ExclusionSet, ProfileCatalog};
use lifecycle::platform::MemoryPlatform;
use lifecycle::replay::ReplayScript;
use lifecycle::tracking::TrackingController;
use lifecycle::usage::UsageStore;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{warn, Level};

/// Lifecycle - count how often every button, key and axis gets used
#[derive(Parser, Debug)]
#[command(name = "lifecycle")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Track per-device usage of buttons, keys and axes", long_about = None)]
struct Args {
    /// Path to the config file
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Only log warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Drive the tracker from a JSON replay script and print the result
    Replay {
        /// Replay script
        #[arg(value_name = "FILE")]
        script: PathBuf,
    },

    /// Print persisted usage per device
    Report {
        /// Only show this device
        #[arg(short, long, value_name = "NAME")]
        device: Option<String>,

        /// Number of components to list per device
        #[arg(short, long, default_value_t = 10)]
        top: usize,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Print the config, usage, profile and exclusion locations
    Paths,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose, args.quiet);

    let config_path = match &args.config {
        Some(path) => path.clone(),
        None => Config::config_path()?,
    };
    let config = Config::load_from(&config_path)?;

    match args.command {
        Command::Replay { script } => replay(&config, &script).await,
        Command::Report { device, top, json } => report(&config, device.as_deref(), top, json),
        Command::Paths => paths(&config, &config_path),
    }
}

fn init_logging(verbose: u8, quiet: bool) {
    let level = if quiet {
        Level::WARN
    } else {
        match verbose {
            0 => Level::INFO,
            1 => Level::DEBUG,
            _ => Level::TRACE,
        }
    };

    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

async fn replay(config: &Config, script_path: &Path) -> Result<()> {
    let script = ReplayScript::load(script_path)?;

    let usage_dir = config.usage_dir()?;
    let store = UsageStore::open(&usage_dir)
        .with_context(|| format!("Failed to open usage directory: {}", usage_dir.display()))?;
    let catalog = ProfileCatalog::load_all(&config.profiles_dir()?);
    let exclusions = ExclusionSet::load(&config.exclusions_file()?);

    let platform = Arc::new(MemoryPlatform::new());
    let mut controller = TrackingController::new(
        platform.clone(),
        store,
        catalog,
        exclusions,
        config.tracker_settings(),
    );

    controller.start().await;
    script.run(&platform, &controller).await;

    let devices = controller.list().await;
    controller.shutdown().await;

    let json = serde_json::to_string_pretty(&devices).context("Failed to serialize devices")?;
    println!("{}", json);
    Ok(())
}

fn report(config: &Config, device: Option<&str>, top: usize, json: bool) -> Result<()> {
    let usage_dir = config.usage_dir()?;
    let store = UsageStore::open(&usage_dir)
        .with_context(|| format!("Failed to open usage directory: {}", usage_dir.display()))?;

    let names = match device {
        Some(name) => vec![name.to_string()],
        None => store.stored_devices()?,
    };

    let mut records = Vec::new();
    for name in names {
        match store.load(&name) {
            Ok(Some(record)) => records.push((name, record)),
            Ok(None) => warn!("No usage recorded for '{}'", name),
            Err(err) => warn!("Skipping '{}': {}", name, err),
        }
    }

    if json {
        let map: serde_json::Map<String, serde_json::Value> = records
            .iter()
            .map(|(name, record)| serde_json::to_value(record).map(|v| (name.clone(), v)))
            .collect::<Result<_, _>>()
            .context("Failed to serialize usage")?;
        let json = serde_json::to_string_pretty(&map).context("Failed to serialize usage")?;
        println!("{}", json);
        return Ok(());
    }

    if records.is_empty() {
        eprintln!("No usage data found in {}", usage_dir.display());
        return Ok(());
    }

    for (name, record) in &records {
        println!("{} ({} uses)", name, record.total());
        for (component, count) in record.most_used(top) {
            println!("  {:>10}  {}", count, component);
        }
        println!();
    }
    Ok(())
}

fn paths(config: &Config, config_path: &Path) -> Result<()> {
    println!("config:     {}", config_path.display());
    println!("usage:      {}", config.usage_dir()?.display());
    println!("profiles:   {}", config.profiles_dir()?.display());
    println!("exclusions: {}", config.exclusions_file()?.display());
    Ok(())
}
