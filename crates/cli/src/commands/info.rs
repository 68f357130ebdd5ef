//! `info` command implementation.

use anyhow::{Context, Result};
use contracts::HubConfig;
use serde::Serialize;
use tracing::info;

use crate::cli::InfoArgs;
use crate::error::CliError;

/// Configuration info for JSON output
#[derive(Serialize)]
struct ConfigInfo {
    version: String,
    session: SessionInfo,
    persistence: PersistenceInfo,
    reconnect: ReconnectInfo,
    #[serde(skip_serializing_if = "Option::is_none")]
    requirements: Option<RequirementsInfo>,
    exclusive_devices: Vec<String>,
}

#[derive(Serialize)]
struct SessionInfo {
    auto_reactivate: bool,
}

#[derive(Serialize)]
struct PersistenceInfo {
    enabled: bool,
    flush_threshold: usize,
    queue_capacity: usize,
    output_dir: String,
}

#[derive(Serialize)]
struct ReconnectInfo {
    interval_ms: u64,
    max_attempts: u32,
    /// Upper bound on how long one poller runs
    max_duration_ms: u64,
}

#[derive(Serialize)]
struct RequirementsInfo {
    slots: Vec<String>,
    mask: u8,
    allowed_devices: Vec<String>,
}

/// Execute the `info` command
pub fn run_info(args: &InfoArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration info");

    if !args.config.exists() {
        return Err(CliError::config_not_found(args.config.display().to_string()).into());
    }

    let config = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    if args.json {
        let info = build_config_info(&config);
        let json =
            serde_json::to_string_pretty(&info).context("Failed to serialize config info")?;
        println!("{}", json);
    } else {
        print_config_info(&config);
    }

    Ok(())
}

fn build_config_info(config: &HubConfig) -> ConfigInfo {
    let reconnect = &config.reconnect;

    ConfigInfo {
        version: format!("{:?}", config.version),
        session: SessionInfo {
            auto_reactivate: config.session.auto_reactivate,
        },
        persistence: PersistenceInfo {
            enabled: config.persistence.enabled,
            flush_threshold: config.persistence.flush_threshold,
            queue_capacity: config.persistence.queue_capacity,
            output_dir: config.persistence.output_dir.display().to_string(),
        },
        reconnect: ReconnectInfo {
            interval_ms: reconnect.interval_ms,
            max_attempts: reconnect.max_attempts,
            max_duration_ms: reconnect.interval_ms * u64::from(reconnect.max_attempts),
        },
        requirements: config.requirements.as_ref().map(|req| RequirementsInfo {
            slots: req.slots.iter().map(|s| s.to_string()).collect(),
            mask: req.mask().bits(),
            allowed_devices: req.allowed_devices.clone(),
        }),
        exclusive_devices: config.exclusive_devices.clone(),
    }
}

fn print_config_info(config: &HubConfig) {
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║                Wearable Hub Configuration                    ║");
    println!("╚══════════════════════════════════════════════════════════════╝\n");

    println!("📡 Session");
    println!("   ├─ Version: {:?}", config.version);
    println!("   └─ Auto re-activate: {}", config.session.auto_reactivate);

    let persistence = &config.persistence;
    println!("\n💾 Persistence");
    if persistence.enabled {
        println!("   ├─ Output dir: {}", persistence.output_dir.display());
        println!("   ├─ Flush threshold: {} samples", persistence.flush_threshold);
        println!("   └─ Queue capacity: {} batches", persistence.queue_capacity);
    } else {
        println!("   └─ Disabled");
    }

    let reconnect = &config.reconnect;
    println!("\n🔁 Reconnect");
    println!("   ├─ Interval: {} ms", reconnect.interval_ms);
    println!("   └─ Max attempts: {}", reconnect.max_attempts);

    println!("\n🦴 Requirements");
    match &config.requirements {
        Some(req) => {
            let slots: Vec<String> = req.slots.iter().map(|s| s.to_string()).collect();
            println!("   ├─ Slots: {}", slots.join(", "));
            println!("   └─ Allowed devices: {}", req.allowed_devices.join(", "));
        }
        None => println!("   └─ (none)"),
    }

    if !config.exclusive_devices.is_empty() {
        println!("\n🔒 Exclusive devices ({})", config.exclusive_devices.len());
        for (i, name) in config.exclusive_devices.iter().enumerate() {
            let is_last = i == config.exclusive_devices.len() - 1;
            let prefix = if is_last { "└─" } else { "├─" };
            println!("   {} {}", prefix, name);
        }
    }

    println!();
}
