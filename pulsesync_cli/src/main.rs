//! pulsesync command entry point.

use clap::Parser;
use eyre::{Result, WrapErr, ensure};
use pulsesync_cli::{Config, PulseListLoader, loader::list_records, report};
use pulsesync_core::{RecordMatcher, align_sessions_concurrent};
use std::{path::PathBuf, sync::Arc};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "pulsesync")]
#[command(about = "Align behaviour and physiology recordings through their sync pulses")]
#[command(version)]
struct Args {
    /// Path to the YAML configuration file
    #[arg(long)]
    config: PathBuf,

    /// Number of sessions aligned at once (overrides the config file)
    #[arg(long)]
    jobs: Option<usize>,

    /// Write a YAML report of the fitted clock models to this path
    #[arg(long)]
    report: Option<PathBuf>,
}

fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    info!(config_file = %args.config.display(), "Loading configuration");
    let config = Config::load(&args.config)?;
    let jobs = args.jobs.unwrap_or(config.jobs);
    ensure!(jobs > 0, "--jobs must be greater than zero");

    info!(
        behaviour_dir = %config.behaviour_dir.display(),
        physiology_dir = %config.physiology_dir.display(),
        sampling_rate_hz = config.physiology.sampling_rate_hz,
        jobs,
        "Configuration loaded"
    );

    // Pair records of the same session
    let behaviour = list_records(&config.behaviour_dir, &config.behaviour_extension)?;
    let physiology = list_records(&config.physiology_dir, &config.physiology_extension)?;
    let pairing = RecordMatcher::default()
        .with_policy(config.records.ambiguity)
        .pair(behaviour, physiology)
        .wrap_err("Failed to pair behaviour and physiology records")?;

    let loader = Arc::new(PulseListLoader::from_config(&config)?);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .wrap_err("Failed to create tokio runtime")?;

    let batch = runtime.block_on(align_sessions_concurrent(
        pairing,
        loader,
        config.to_align_config(),
        jobs,
    ))?;

    println!("{batch}");

    if let Some(path) = &args.report {
        report::write(&batch, path)?;
        info!(report = %path.display(), "Report written");
    }

    Ok(())
}
