//! Transport error types

use contracts::ContractError;
use thiserror::Error;

/// Session-level failure (send, context push, wake, activation)
#[derive(Debug, Error)]
pub enum TransportError {
    /// Session not usable for the operation
    #[error("session unavailable: {message}")]
    Unavailable { message: String },

    /// Companion rejected or could not process the request
    #[error("companion rejected {operation}: {message}")]
    Rejected { operation: String, message: String },

    /// Wrapped ContractError
    #[error(transparent)]
    Contract(#[from] ContractError),
}

impl TransportError {
    /// Create unavailable error
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }

    /// Create rejected error
    pub fn rejected(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Rejected {
            operation: operation.into(),
            message: message.into(),
        }
    }
}

/// Precondition failure of a connect attempt
///
/// Checked in declaration order; the first failing check is reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ReadinessError {
    #[error("companion device is not paired")]
    NotPaired,

    #[error("companion app is not installed")]
    AppNotInstalled,

    #[error("session is not activated")]
    SessionInactive,
}

impl ReadinessError {
    /// Short advisory text for the user-facing notice
    pub fn user_message(self) -> &'static str {
        match self {
            ReadinessError::NotPaired => "Pair your watch with this phone first.",
            ReadinessError::AppNotInstalled => "Install the companion app on your watch.",
            ReadinessError::SessionInactive => "Watch connection is not ready yet. Try again.",
        }
    }
}

/// Result alias
pub type Result<T> = std::result::Result<T, TransportError>;
