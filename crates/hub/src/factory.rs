//! DeviceFactory - builds drivers wired to the hub's collaborators

use std::sync::Arc;

use contracts::{DeviceKind, FusionConsumer, Notifier, Slot};
use devices::{DriverContext, InboundCallback, SimulatedConfig, SimulatedDevice, WatchDriver};
use persistence::StoreSender;
use tracing::warn;
use transport::{RoutedMessage, SessionAdapter};

/// Device factory
///
/// Cheap to clone; every driver it builds shares the session adapter, the
/// fusion consumer, the notifier and the per-class store queue.
#[derive(Clone)]
pub struct DeviceFactory {
    adapter: Arc<SessionAdapter>,
    fusion: Arc<dyn FusionConsumer>,
    notifier: Arc<dyn Notifier>,
    stores: Vec<(DeviceKind, StoreSender)>,
    flush_threshold: usize,
    inbound: async_channel::Sender<RoutedMessage>,
}

impl DeviceFactory {
    pub(crate) fn new(
        adapter: Arc<SessionAdapter>,
        fusion: Arc<dyn FusionConsumer>,
        notifier: Arc<dyn Notifier>,
        stores: Vec<(DeviceKind, StoreSender)>,
        flush_threshold: usize,
        inbound: async_channel::Sender<RoutedMessage>,
    ) -> Self {
        Self {
            adapter,
            fusion,
            notifier,
            stores,
            flush_threshold,
            inbound,
        }
    }

    /// Shared companion session adapter
    ///
    /// Platform integrations report inbound payloads and activation changes
    /// through it.
    pub fn adapter(&self) -> Arc<SessionAdapter> {
        Arc::clone(&self.adapter)
    }

    pub fn notifier(&self) -> Arc<dyn Notifier> {
        Arc::clone(&self.notifier)
    }

    /// Collaborators for a driver of class `kind`
    pub fn context(&self, kind: DeviceKind) -> DriverContext {
        let ctx = DriverContext::new(Arc::clone(&self.fusion), Arc::clone(&self.notifier));
        match self.stores.iter().find(|(k, _)| *k == kind) {
            Some((_, store)) => ctx.with_store(store.clone(), self.flush_threshold),
            None => ctx,
        }
    }

    /// Callback delivering batches onto the hub's main context
    ///
    /// Safe to call from any thread.
    pub fn inbound_callback(&self) -> InboundCallback {
        let tx = self.inbound.clone();
        Arc::new(move |routed: RoutedMessage| {
            if tx.try_send(routed).is_err() {
                warn!("device hub stopped, inbound batch dropped");
            }
        })
    }

    pub fn watch(&self, device_id: impl Into<String>, slot: Slot) -> WatchDriver {
        WatchDriver::new(
            device_id,
            slot,
            self.adapter(),
            &self.context(DeviceKind::Watch),
        )
    }

    pub fn simulated(
        &self,
        device_id: impl Into<String>,
        slot: Slot,
        config: SimulatedConfig,
    ) -> SimulatedDevice {
        SimulatedDevice::new(
            device_id,
            slot,
            config,
            self.inbound_callback(),
            &self.context(DeviceKind::Simulated),
        )
    }
}
