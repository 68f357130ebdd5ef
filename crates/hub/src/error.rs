//! Hub error types

use contracts::Slot;
use persistence::PersistenceError;
use thiserror::Error;

/// Hub error
#[derive(Debug, Error)]
pub enum HubError {
    /// Hub task has stopped
    #[error("device hub is not running")]
    Closed,

    /// Another unit of an exclusive hardware class is already bound
    #[error("'{device_name}' is already bound to {slot}")]
    ExclusiveDeviceBound { device_name: String, slot: Slot },

    /// Store creation failed while building the hub
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

/// Result alias
pub type Result<T> = std::result::Result<T, HubError>;
