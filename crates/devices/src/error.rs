//! Device 错误类型

use thiserror::Error;
use transport::ReadinessError;

/// Device 错误
#[derive(Debug, Error)]
pub enum DeviceError {
    /// 连接前置条件不满足
    #[error("device {device_id} not ready: {reason}")]
    NotReady {
        /// 设备 ID
        device_id: String,
        /// 首个失败的检查项
        reason: ReadinessError,
    },

    /// 模拟设备注入的连接失败
    #[error("device {device_id} refused connection")]
    ConnectRefused {
        /// 设备 ID
        device_id: String,
    },

    /// 采集线程异常退出
    #[error("generator thread of {device_id} panicked")]
    GeneratorPanicked {
        /// 设备 ID
        device_id: String,
    },
}

impl DeviceError {
    /// 面向用户的提示文本
    pub fn user_message(&self) -> String {
        match self {
            DeviceError::NotReady { reason, .. } => reason.user_message().to_string(),
            other => other.to_string(),
        }
    }

    /// 指标标签
    pub fn reason_label(&self) -> &'static str {
        match self {
            DeviceError::NotReady { reason, .. } => match reason {
                ReadinessError::NotPaired => "not_paired",
                ReadinessError::AppNotInstalled => "app_not_installed",
                ReadinessError::SessionInactive => "session_inactive",
            },
            DeviceError::ConnectRefused { .. } => "refused",
            DeviceError::GeneratorPanicked { .. } => "generator_panicked",
        }
    }
}

/// Device Result 类型别名
pub type Result<T> = std::result::Result<T, DeviceError>;
