//! 配置校验模块
//!
//! 校验规则：
//! - persistence.flush_threshold / queue_capacity > 0
//! - persistence.output_dir 非空
//! - reconnect.interval_ms / max_attempts > 0
//! - requirements.slots 不重复，且 allowed_devices 非空
//! - exclusive_devices 名称非空

use std::collections::HashSet;

use contracts::{ContractError, HubConfig};

/// 校验 HubConfig 配置
///
/// 返回第一个遇到的错误，或 Ok(())。
pub fn validate(config: &HubConfig) -> Result<(), ContractError> {
    validate_persistence(config)?;
    validate_reconnect(config)?;
    validate_requirements(config)?;
    validate_exclusive_devices(config)?;
    Ok(())
}

/// 校验持久化配置
fn validate_persistence(config: &HubConfig) -> Result<(), ContractError> {
    let persistence = &config.persistence;

    if persistence.flush_threshold == 0 {
        return Err(ContractError::config_validation(
            "persistence.flush_threshold",
            "flush_threshold must be > 0",
        ));
    }

    if persistence.queue_capacity == 0 {
        return Err(ContractError::config_validation(
            "persistence.queue_capacity",
            "queue_capacity must be > 0",
        ));
    }

    if persistence.output_dir.as_os_str().is_empty() {
        return Err(ContractError::config_validation(
            "persistence.output_dir",
            "output_dir cannot be empty",
        ));
    }

    Ok(())
}

/// 校验重连轮询配置
fn validate_reconnect(config: &HubConfig) -> Result<(), ContractError> {
    let reconnect = &config.reconnect;

    if reconnect.interval_ms == 0 {
        return Err(ContractError::config_validation(
            "reconnect.interval_ms",
            "interval_ms must be > 0",
        ));
    }

    if reconnect.max_attempts == 0 {
        return Err(ContractError::config_validation(
            "reconnect.max_attempts",
            "max_attempts must be > 0",
        ));
    }

    Ok(())
}

/// 校验槽位需求
fn validate_requirements(config: &HubConfig) -> Result<(), ContractError> {
    let Some(requirements) = &config.requirements else {
        return Ok(());
    };

    let mut seen = HashSet::new();
    for slot in &requirements.slots {
        if !seen.insert(*slot) {
            return Err(ContractError::config_validation(
                format!("requirements.slots[{slot}]"),
                "duplicate slot",
            ));
        }
    }

    if !requirements.slots.is_empty() && requirements.allowed_devices.is_empty() {
        return Err(ContractError::config_validation(
            "requirements.allowed_devices",
            "allowed_devices cannot be empty when slots are required",
        ));
    }

    Ok(())
}

/// 校验独占设备名称
fn validate_exclusive_devices(config: &HubConfig) -> Result<(), ContractError> {
    for (idx, name) in config.exclusive_devices.iter().enumerate() {
        if name.trim().is_empty() {
            return Err(ContractError::config_validation(
                format!("exclusive_devices[{idx}]"),
                "device name cannot be empty",
            ));
        }
    }
    Ok(())
}
