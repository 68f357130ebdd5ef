//! HubHandle - cloneable front end of the hub task

use contracts::{CollectionRequest, Slot, SlotMask};
use devices::Device;
use tokio::sync::{mpsc, oneshot};

use crate::command::{DeviceSummary, HubCommand};
use crate::error::{HubError, Result};
use crate::factory::DeviceFactory;

/// Application-facing handle
///
/// Every call is serialized onto the hub's main context and answered there.
/// Calls fail with [`HubError::Closed`] once the hub has shut down.
#[derive(Clone)]
pub struct HubHandle {
    tx: mpsc::Sender<HubCommand>,
    factory: DeviceFactory,
}

impl HubHandle {
    pub(crate) fn new(tx: mpsc::Sender<HubCommand>, factory: DeviceFactory) -> Self {
        Self { tx, factory }
    }

    /// Builds drivers wired to this hub
    pub fn factory(&self) -> &DeviceFactory {
        &self.factory
    }

    async fn request<T>(&self, make: impl FnOnce(oneshot::Sender<T>) -> HubCommand) -> Result<T> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(make(reply))
            .await
            .map_err(|_| HubError::Closed)?;
        rx.await.map_err(|_| HubError::Closed)
    }

    /// Bind `device` to `slot` as is
    ///
    /// # Returns
    /// The id of the device this binding replaced, which is dropped without
    /// being disconnected
    pub async fn bind(&self, device: impl Device + 'static, slot: Slot) -> Result<Option<String>> {
        let device: Box<dyn Device> = Box::new(device);
        self.request(|reply| HubCommand::Bind {
            device,
            slot,
            reply,
        })
        .await?
    }

    /// Poll `device` until it connects, then bind it to `slot`
    ///
    /// Returns once polling has started. On exhaustion a notice is emitted
    /// and the slot stays unbound.
    pub async fn bind_with_reconnect(&self, device: impl Device + 'static, slot: Slot) -> Result<()> {
        let device: Box<dyn Device> = Box::new(device);
        self.request(|reply| HubCommand::BindWithReconnect {
            device,
            slot,
            reply,
        })
        .await?
    }

    /// Disconnect and remove the device at `slot`
    ///
    /// # Returns
    /// `false` when the slot was empty
    pub async fn unbind(&self, slot: Slot) -> Result<bool> {
        self.request(|reply| HubCommand::Unbind { slot, reply }).await
    }

    pub async fn connect(&self, slot: Slot) -> Result<bool> {
        self.request(|reply| HubCommand::Connect { slot, reply }).await
    }

    pub async fn disconnect(&self, slot: Slot) -> Result<bool> {
        self.request(|reply| HubCommand::Disconnect { slot, reply }).await
    }

    /// Start collection on every connected device
    ///
    /// # Returns
    /// Slots whose device opened a session
    pub async fn start_collection(&self, request: CollectionRequest) -> Result<SlotMask> {
        self.request(|reply| HubCommand::StartCollection { request, reply })
            .await
    }

    /// Stop collection on every device with an open session
    pub async fn stop_collection(&self) -> Result<SlotMask> {
        self.request(|reply| HubCommand::StopCollection { reply }).await
    }

    pub async fn set_enable_imu(&self, slot: Slot, enabled: bool) -> Result<bool> {
        self.request(|reply| HubCommand::SetEnableImu {
            slot,
            enabled,
            reply,
        })
        .await
    }

    pub async fn reset_all_enable_imu(&self) -> Result<()> {
        self.request(|reply| HubCommand::ResetAllEnableImu { reply })
            .await
    }

    pub async fn check_required_slots(
        &self,
        required: SlotMask,
        allowed_device_names: Vec<String>,
    ) -> Result<bool> {
        self.request(|reply| HubCommand::CheckRequiredSlots {
            required,
            allowed_device_names,
            reply,
        })
        .await
    }

    /// Check the requirements from the hub configuration
    ///
    /// `true` when none are configured.
    pub async fn check_requirements(&self) -> Result<bool> {
        self.request(|reply| HubCommand::CheckRequirements { reply })
            .await
    }

    pub async fn has_exclusive_device_bound(&self, device_name: impl Into<String>) -> Result<bool> {
        let device_name = device_name.into();
        self.request(|reply| HubCommand::HasExclusiveDeviceBound { device_name, reply })
            .await
    }

    /// Whether a reconnection poller is pending for `slot`
    pub async fn is_reconnecting(&self, slot: Slot) -> Result<bool> {
        self.request(|reply| HubCommand::IsReconnecting { slot, reply })
            .await
    }

    pub async fn bound_mask(&self) -> Result<SlotMask> {
        self.request(|reply| HubCommand::BoundMask { reply }).await
    }

    pub async fn is_bound(&self, slot: Slot) -> Result<bool> {
        Ok(self.bound_mask().await?.contains(slot))
    }

    /// Snapshot of every bound device in slot order
    pub async fn devices(&self) -> Result<Vec<DeviceSummary>> {
        self.request(|reply| HubCommand::Devices { reply }).await
    }

    pub async fn device(&self, slot: Slot) -> Result<Option<DeviceSummary>> {
        Ok(self.devices().await?.into_iter().find(|d| d.slot == slot))
    }

    /// Stop collections, unbind every slot, cancel pollers and close stores
    pub async fn shutdown(&self) -> Result<()> {
        self.request(|reply| HubCommand::Shutdown { reply }).await
    }
}
