//! WatchDriver - companion smartwatch reached through the session adapter

use std::sync::Arc;

use contracts::{
    CollectionRequest, CompanionMessage, ContextCommand, ContextPayload, DeviceKind, Notifier, Slot,
};
use tracing::{debug, info, instrument, warn};
use transport::{ActivationState, SessionAdapter};

use crate::collector::SampleCollector;
use crate::device::{Device, DriverContext};
use crate::error::{DeviceError, Result};
use crate::stats::IngestionStats;

/// Notice shown when the companion app could not be launched
pub const WAKE_FAILED_NOTICE: &str =
    "Couldn't open the app on your watch. Open it manually to start recording.";

/// Watch driver
///
/// Inbound batches reach [`Device::handle_inbound`] through the adapter's
/// delegate once the registry hands the companion channel to its slot.
pub struct WatchDriver {
    device_id: String,
    device_name: String,
    adapter: Arc<SessionAdapter>,
    notifier: Arc<dyn Notifier>,
    collector: SampleCollector,
    active_request: Option<CollectionRequest>,
    connected: bool,
}

impl WatchDriver {
    pub const DEVICE_NAME: &'static str = "Apple Watch";

    pub fn new(
        device_id: impl Into<String>,
        slot: Slot,
        adapter: Arc<SessionAdapter>,
        ctx: &DriverContext,
    ) -> Self {
        Self {
            device_id: device_id.into(),
            device_name: Self::DEVICE_NAME.to_string(),
            adapter,
            notifier: Arc::clone(&ctx.notifier),
            collector: SampleCollector::new(DeviceKind::Watch, slot, ctx),
            active_request: None,
            connected: false,
        }
    }

    /// Override the reported hardware name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.device_name = name.into();
        self
    }

    fn push_context(&self, command: ContextCommand, enable_imu: bool, request: &CollectionRequest) {
        let payload = ContextPayload {
            command,
            enable_imu,
            activity: request.activity.clone(),
            location: request.location.to_string(),
            timestamp: self.adapter.next_context_timestamp(),
        };
        let accepted = self.adapter.push_context(&payload);
        observability::record_context_push(command.as_str(), accepted);
    }
}

impl Device for WatchDriver {
    fn device_id(&self) -> &str {
        &self.device_id
    }

    fn device_name(&self) -> &str {
        &self.device_name
    }

    fn slot(&self) -> Slot {
        self.collector.slot()
    }

    fn assign_slot(&mut self, slot: Slot) {
        self.collector.set_slot(slot);
    }

    fn kind(&self) -> DeviceKind {
        DeviceKind::Watch
    }

    fn can_receive_data(&self) -> bool {
        self.collector.can_receive_data()
    }

    fn enable_imu(&self) -> bool {
        self.collector.enable_imu()
    }

    fn set_enable_imu(&mut self, enabled: bool) {
        self.collector.set_enable_imu(enabled);
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn uses_companion_channel(&self) -> bool {
        true
    }

    #[instrument(name = "watch_try_connect", skip(self), fields(device_id = %self.device_id))]
    fn try_connect(&mut self) -> Result<()> {
        if matches!(
            self.adapter.activation_state(),
            ActivationState::NotActivated | ActivationState::Deactivated
        ) {
            self.adapter.activate();
        }

        match self.adapter.check_ready() {
            Ok(()) => {
                if !self.connected {
                    info!(slot = %self.slot(), "watch connected");
                }
                self.connected = true;
                Ok(())
            }
            Err(reason) => {
                let err = DeviceError::NotReady {
                    device_id: self.device_id.clone(),
                    reason,
                };
                warn!(reason = %reason, "watch not ready");
                observability::record_connect_failure(DeviceKind::Watch, err.reason_label());
                Err(err)
            }
        }
    }

    fn connect(&mut self) -> bool {
        match self.try_connect() {
            Ok(()) => true,
            Err(e) => {
                self.notifier.emit(&e.user_message());
                false
            }
        }
    }

    #[instrument(name = "watch_disconnect", skip(self), fields(device_id = %self.device_id))]
    fn disconnect(&mut self) -> Result<()> {
        if self.collector.can_receive_data() {
            self.stop_collection();
        } else {
            self.collector.end();
        }

        if self.connected {
            info!(slot = %self.slot(), "watch disconnected");
        }
        self.connected = false;
        Ok(())
    }

    #[instrument(
        name = "watch_start_collection",
        skip(self, request),
        fields(device_id = %self.device_id, activity = %request.activity)
    )]
    fn start_collection(&mut self, request: &CollectionRequest) {
        if !self.connected {
            debug!("starting collection before connect completed");
        }

        self.collector.begin();
        self.active_request = Some(request.clone());

        if let Err(e) = self.adapter.wake_companion(request) {
            warn!(error = %e, "failed to wake companion app");
            self.notifier.emit(WAKE_FAILED_NOTICE);
        }

        self.push_context(
            ContextCommand::StartCollection,
            self.collector.enable_imu(),
            request,
        );
        info!(slot = %self.slot(), enable_imu = self.collector.enable_imu(), "collection started");
    }

    #[instrument(name = "watch_stop_collection", skip(self), fields(device_id = %self.device_id))]
    fn stop_collection(&mut self) {
        let request = self.active_request.take().unwrap_or_else(|| {
            CollectionRequest::new(String::new(), Default::default())
        });

        self.push_context(ContextCommand::StopCollection, false, &request);
        self.collector.end();
        info!(slot = %self.slot(), "collection stopped");
    }

    fn handle_inbound(&mut self, message: CompanionMessage) {
        match message {
            CompanionMessage::ImuBatch(entries) => self.collector.ingest_batch(&entries),
            CompanionMessage::Status(payload) => self.collector.ingest_status(payload),
        }
    }

    fn buffered_len(&self) -> usize {
        self.collector.buffered_len()
    }

    fn stats(&self) -> IngestionStats {
        self.collector.stats()
    }
}
