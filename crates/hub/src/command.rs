//! Commands executed on the hub's main context

use contracts::{CollectionRequest, DeviceKind, Slot, SlotMask};
use devices::{Device, IngestionStats};
use tokio::sync::oneshot;

use crate::error::Result;

/// Snapshot of one bound device
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceSummary {
    pub slot: Slot,
    pub device_id: String,
    pub device_name: String,
    pub kind: DeviceKind,
    pub connected: bool,
    pub can_receive_data: bool,
    pub enable_imu: bool,
    pub buffered: usize,
    pub stats: IngestionStats,
}

impl DeviceSummary {
    pub(crate) fn of(device: &dyn Device) -> Self {
        Self {
            slot: device.slot(),
            device_id: device.device_id().to_string(),
            device_name: device.device_name().to_string(),
            kind: device.kind(),
            connected: device.is_connected(),
            can_receive_data: device.can_receive_data(),
            enable_imu: device.enable_imu(),
            buffered: device.buffered_len(),
            stats: device.stats(),
        }
    }
}

pub(crate) enum HubCommand {
    Bind {
        device: Box<dyn Device>,
        slot: Slot,
        reply: oneshot::Sender<Result<Option<String>>>,
    },
    BindWithReconnect {
        device: Box<dyn Device>,
        slot: Slot,
        reply: oneshot::Sender<Result<()>>,
    },
    Unbind {
        slot: Slot,
        reply: oneshot::Sender<bool>,
    },
    Connect {
        slot: Slot,
        reply: oneshot::Sender<bool>,
    },
    Disconnect {
        slot: Slot,
        reply: oneshot::Sender<bool>,
    },
    StartCollection {
        request: CollectionRequest,
        reply: oneshot::Sender<SlotMask>,
    },
    StopCollection {
        reply: oneshot::Sender<SlotMask>,
    },
    SetEnableImu {
        slot: Slot,
        enabled: bool,
        reply: oneshot::Sender<bool>,
    },
    ResetAllEnableImu {
        reply: oneshot::Sender<()>,
    },
    CheckRequiredSlots {
        required: SlotMask,
        allowed_device_names: Vec<String>,
        reply: oneshot::Sender<bool>,
    },
    CheckRequirements {
        reply: oneshot::Sender<bool>,
    },
    HasExclusiveDeviceBound {
        device_name: String,
        reply: oneshot::Sender<bool>,
    },
    IsReconnecting {
        slot: Slot,
        reply: oneshot::Sender<bool>,
    },
    BoundMask {
        reply: oneshot::Sender<SlotMask>,
    },
    Devices {
        reply: oneshot::Sender<Vec<DeviceSummary>>,
    },
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}
