//! 配置解析模块
//!
//! 支持 TOML (主要) 和 JSON (可选) 格式。

use contracts::{ContractError, HubConfig};

/// 配置文件格式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// TOML 格式 (推荐)
    Toml,
    /// JSON 格式
    Json,
}

impl ConfigFormat {
    /// 从文件扩展名推断格式
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "toml" => Some(Self::Toml),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

/// 解析 TOML 格式配置
pub fn parse_toml(content: &str) -> Result<HubConfig, ContractError> {
    toml::from_str(content).map_err(|e| ContractError::ConfigParse {
        message: format!("TOML parse error: {e}"),
        source: Some(Box::new(e)),
    })
}

/// 解析 JSON 格式配置
pub fn parse_json(content: &str) -> Result<HubConfig, ContractError> {
    serde_json::from_str(content).map_err(|e| ContractError::ConfigParse {
        message: format!("JSON parse error: {e}"),
        source: Some(Box::new(e)),
    })
}

/// 根据格式解析配置
pub fn parse(content: &str, format: ConfigFormat) -> Result<HubConfig, ContractError> {
    match format {
        ConfigFormat::Toml => parse_toml(content),
        ConfigFormat::Json => parse_json(content),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::Slot;

    #[test]
    fn test_parse_toml_full() {
        let content = r#"
exclusive_devices = ["Apple Watch"]

[session]
auto_reactivate = false

[persistence]
enabled = true
flush_threshold = 100
queue_capacity = 4
output_dir = "/tmp/recordings"

[reconnect]
interval_ms = 250
max_attempts = 3

[requirements]
slots = ["chest", "left_hand"]
allowed_devices = ["Apple Watch", "Simulated IMU"]
"#;
        let result = parse_toml(content);
        assert!(result.is_ok(), "Failed: {:?}", result.err());
        let config = result.unwrap();
        assert!(!config.session.auto_reactivate);
        assert_eq!(config.persistence.flush_threshold, 100);
        assert_eq!(config.reconnect.max_attempts, 3);
        let req = config.requirements.unwrap();
        assert_eq!(req.slots, vec![Slot::Chest, Slot::LeftHand]);
    }

    #[test]
    fn test_parse_toml_empty_is_default() {
        let config = parse_toml("").unwrap();
        assert_eq!(config.persistence.flush_threshold, 500);
        assert_eq!(config.reconnect.interval_ms, 1000);
    }

    #[test]
    fn test_parse_json_minimal() {
        let content = r#"{
            "persistence": { "flush_threshold": 8 },
            "reconnect": { "max_attempts": 2 }
        }"#;
        let result = parse_json(content);
        assert!(result.is_ok(), "Failed: {:?}", result.err());
        let config = result.unwrap();
        assert_eq!(config.persistence.flush_threshold, 8);
        assert!(config.persistence.enabled);
        assert_eq!(config.reconnect.max_attempts, 2);
    }

    #[test]
    fn test_parse_unknown_slot() {
        let content = r#"
[requirements]
slots = ["tail"]
allowed_devices = ["x"]
"#;
        assert!(parse_toml(content).is_err());
    }

    #[test]
    fn test_parse_toml_syntax_error() {
        let content = "invalid toml [[[";
        let result = parse_toml(content);
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert!(matches!(err, ContractError::ConfigParse { .. }));
    }

    #[test]
    fn test_format_from_extension() {
        assert_eq!(
            ConfigFormat::from_extension("toml"),
            Some(ConfigFormat::Toml)
        );
        assert_eq!(
            ConfigFormat::from_extension("TOML"),
            Some(ConfigFormat::Toml)
        );
        assert_eq!(
            ConfigFormat::from_extension("json"),
            Some(ConfigFormat::Json)
        );
        assert_eq!(ConfigFormat::from_extension("yaml"), None);
    }
}
