//! `validate` command implementation.

use anyhow::{Context, Result};
use contracts::HubConfig;
use serde::Serialize;
use tracing::info;

use crate::cli::ValidateArgs;

/// Validation result for JSON output
#[derive(Serialize)]
struct ValidationResult {
    valid: bool,
    config_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    warnings: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<ConfigSummary>,
}

#[derive(Serialize)]
struct ConfigSummary {
    version: String,
    persistence_enabled: bool,
    flush_threshold: usize,
    reconnect_attempts: u32,
    required_slots: Vec<String>,
    exclusive_devices: Vec<String>,
}

/// Execute the `validate` command
pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    info!(config = %args.config.display(), "Validating configuration");

    let result = validate_config(args);

    if args.json {
        let json = serde_json::to_string_pretty(&result)
            .context("Failed to serialize validation result")?;
        println!("{}", json);
    } else {
        print_validation_result(&result);
    }

    if result.valid {
        Ok(())
    } else {
        anyhow::bail!("Configuration validation failed")
    }
}

fn validate_config(args: &ValidateArgs) -> ValidationResult {
    let config_path = args.config.display().to_string();

    if !args.config.exists() {
        return ValidationResult {
            valid: false,
            config_path,
            error: Some(format!("File not found: {}", args.config.display())),
            warnings: None,
            summary: None,
        };
    }

    match config_loader::ConfigLoader::load_from_path(&args.config) {
        Ok(config) => {
            let warnings = collect_warnings(&config);

            ValidationResult {
                valid: true,
                config_path,
                error: None,
                warnings: if warnings.is_empty() {
                    None
                } else {
                    Some(warnings)
                },
                summary: Some(ConfigSummary {
                    version: format!("{:?}", config.version),
                    persistence_enabled: config.persistence.enabled,
                    flush_threshold: config.persistence.flush_threshold,
                    reconnect_attempts: config.reconnect.max_attempts,
                    required_slots: config
                        .requirements
                        .as_ref()
                        .map(|r| r.slots.iter().map(|s| s.to_string()).collect())
                        .unwrap_or_default(),
                    exclusive_devices: config.exclusive_devices.clone(),
                }),
            }
        }
        Err(e) => ValidationResult {
            valid: false,
            config_path,
            error: Some(e.to_string()),
            warnings: None,
            summary: None,
        },
    }
}

/// Collect configuration warnings (non-fatal issues)
fn collect_warnings(config: &HubConfig) -> Vec<String> {
    let mut warnings = Vec::new();

    if !config.persistence.enabled {
        warnings.push("persistence is disabled - samples will not be recorded".to_string());
    }

    match &config.requirements {
        None => {
            warnings.push("no slot requirements configured - any binding may start".to_string());
        }
        Some(req) => {
            // Only one unit of an exclusive device can be bound at a time
            let all_exclusive = !req.allowed_devices.is_empty()
                && req
                    .allowed_devices
                    .iter()
                    .all(|name| config.exclusive_devices.contains(name));
            if all_exclusive && req.mask().len() > 1 {
                warnings.push(format!(
                    "requirements need {} slots but every allowed device is exclusive - \
                     they can never be satisfied",
                    req.mask().len()
                ));
            }
        }
    }

    warnings
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Configuration is valid: {}", result.config_path);

        if let Some(ref summary) = result.summary {
            println!("\n  Version: {}", summary.version);
            println!("  Persistence: {}", summary.persistence_enabled);
            println!("  Flush threshold: {}", summary.flush_threshold);
            println!("  Reconnect attempts: {}", summary.reconnect_attempts);
            if !summary.required_slots.is_empty() {
                println!("  Required slots: {}", summary.required_slots.join(", "));
            }
            println!("  Exclusive devices: {}", summary.exclusive_devices.join(", "));
        }

        if let Some(ref warnings) = result.warnings {
            println!("\n⚠ Warnings:");
            for warning in warnings {
                println!("  - {}", warning);
            }
        }
    } else {
        println!("✗ Configuration is invalid: {}", result.config_path);
        if let Some(ref error) = result.error {
            println!("\n  Error: {}", error);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{Slot, SlotRequirements};
    use std::io::Write;

    fn args_for(content: &str) -> (tempfile::NamedTempFile, ValidateArgs) {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        let args = ValidateArgs {
            config: file.path().to_path_buf(),
            json: true,
        };
        (file, args)
    }

    #[test]
    fn test_missing_file_is_invalid() {
        let args = ValidateArgs {
            config: "/nonexistent/hub.toml".into(),
            json: false,
        };
        let result = validate_config(&args);
        assert!(!result.valid);
        assert!(result.error.unwrap().contains("File not found"));
    }

    #[test]
    fn test_valid_config_summary() {
        let (_file, args) = args_for(
            r#"
[requirements]
slots = ["chest"]
allowed_devices = ["Apple Watch"]
"#,
        );
        let result = validate_config(&args);
        assert!(result.valid, "{:?}", result.error);
        let summary = result.summary.unwrap();
        assert_eq!(summary.required_slots, vec!["chest".to_string()]);
        assert!(result.warnings.is_none());
    }

    #[test]
    fn test_invalid_threshold_reported() {
        let (_file, args) = args_for("[persistence]\nflush_threshold = 0\n");
        let result = validate_config(&args);
        assert!(!result.valid);
        assert!(result.error.unwrap().contains("flush_threshold"));
    }

    #[test]
    fn test_unsatisfiable_requirements_warning() {
        let config = HubConfig {
            requirements: Some(SlotRequirements {
                slots: vec![Slot::Chest, Slot::LeftHand],
                allowed_devices: vec!["Apple Watch".into()],
            }),
            ..HubConfig::default()
        };
        let warnings = collect_warnings(&config);
        assert!(warnings.iter().any(|w| w.contains("never be satisfied")));
    }

    #[test]
    fn test_disabled_persistence_warning() {
        let mut config = HubConfig::default();
        config.persistence.enabled = false;
        let warnings = collect_warnings(&config);
        assert!(warnings.iter().any(|w| w.contains("persistence is disabled")));
        assert!(warnings.iter().any(|w| w.contains("no slot requirements")));
    }
}
