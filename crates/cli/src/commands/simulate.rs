//! `simulate` command implementation.

use anyhow::{Context, Result};
use contracts::{CollectionRequest, HubConfig, Slot};
use std::collections::HashSet;
use std::time::Duration;
use tracing::{info, warn};

use crate::cli::SimulateArgs;
use crate::error::CliError;
use crate::simulation::{Simulation, SimulationConfig};

/// Execute the `simulate` command
pub async fn run_simulate(args: &SimulateArgs) -> Result<()> {
    let mut config = load_config(args)?;

    // Apply CLI overrides
    if let Some(ref dir) = args.output_dir {
        info!(output_dir = %dir.display(), "Overriding output directory from CLI");
        config.persistence.output_dir = dir.clone();
    }
    if args.no_persist {
        config.persistence.enabled = false;
    }
    config_loader::ConfigLoader::validate(&config).context("Invalid configuration")?;

    check_slots(&args.slots)?;

    if args.metrics_port != 0 {
        observability::init_metrics_only(args.metrics_port)?;
    }

    info!(
        slots = ?args.slots,
        persistence = config.persistence.enabled,
        output_dir = %config.persistence.output_dir.display(),
        "Configuration loaded"
    );

    let simulation = Simulation::new(SimulationConfig {
        hub: config,
        slots: args.slots.clone(),
        duration: Duration::from_secs(args.duration_secs),
        batch_size: args.batch_size,
        frequency_hz: args.frequency_hz,
        request: CollectionRequest::new(args.activity.clone(), args.location.into()),
    });

    info!("Starting simulated session...");
    let stats = simulation.run(setup_shutdown_signal()).await?;
    stats.print_summary();

    Ok(())
}

/// A missing config file falls back to defaults
fn load_config(args: &SimulateArgs) -> Result<HubConfig> {
    if !args.config.exists() {
        warn!(config = %args.config.display(), "Configuration file not found, using defaults");
        return Ok(HubConfig::default());
    }

    info!(config = %args.config.display(), "Loading configuration");
    config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))
}

fn check_slots(slots: &[Slot]) -> Result<(), CliError> {
    if slots.is_empty() {
        return Err(CliError::invalid_slots("at least one slot is required"));
    }
    let mut seen = HashSet::new();
    for slot in slots {
        if !seen.insert(*slot) {
            return Err(CliError::invalid_slots(format!("slot '{slot}' listed twice")));
        }
    }
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM
///
/// A handler that cannot be installed never resolves.
async fn setup_shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
