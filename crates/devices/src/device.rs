//! Device capability interface

use std::sync::Arc;

use contracts::{CollectionRequest, CompanionMessage, DeviceKind, FusionConsumer, Notifier, Slot};
use persistence::StoreSender;

use crate::error::Result;
use crate::stats::IngestionStats;

/// Body-worn sensor device
///
/// 所有设备实现都必须实现此 trait。设备由 hub 的主任务独占，
/// 所有方法都在主上下文中被调用。
pub trait Device: Send {
    /// Stable opaque identifier
    fn device_id(&self) -> &str;

    /// Hardware model name, used for exclusivity and requirement checks
    fn device_name(&self) -> &str;

    /// Slot the device currently occupies
    fn slot(&self) -> Slot;

    /// Record the slot assigned by the registry
    fn assign_slot(&mut self, slot: Slot);

    fn kind(&self) -> DeviceKind;

    /// Whether a collection session is open
    fn can_receive_data(&self) -> bool;

    fn enable_imu(&self) -> bool;

    fn set_enable_imu(&mut self, enabled: bool);

    fn is_connected(&self) -> bool;

    /// Whether inbound data arrives through the companion session delegate
    fn uses_companion_channel(&self) -> bool {
        false
    }

    /// Single connection attempt without user-facing side effects
    ///
    /// Used by reconnection polling.
    fn try_connect(&mut self) -> Result<()>;

    /// Connect, surfacing a notice on failure
    ///
    /// # Returns
    /// `false` on any precondition failure
    fn connect(&mut self) -> bool;

    /// Release transport use; safe to call when never connected
    fn disconnect(&mut self) -> Result<()>;

    /// Open a collection session
    fn start_collection(&mut self, request: &CollectionRequest);

    /// Close the session and flush buffered samples
    fn stop_collection(&mut self);

    /// Message routed from the transport onto the main context
    fn handle_inbound(&mut self, message: CompanionMessage);

    /// Samples currently held by the persistence buffer
    fn buffered_len(&self) -> usize;

    fn stats(&self) -> IngestionStats;
}

/// Shared collaborators handed to every driver
#[derive(Clone)]
pub struct DriverContext {
    /// Downstream fusion consumer
    pub fusion: Arc<dyn FusionConsumer>,
    /// User-facing notice surface
    pub notifier: Arc<dyn Notifier>,
    /// Store queue (None = persistence disabled)
    pub store: Option<StoreSender>,
    /// Samples buffered before a flush
    pub flush_threshold: usize,
}

impl DriverContext {
    pub fn new(fusion: Arc<dyn FusionConsumer>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            fusion,
            notifier,
            store: None,
            flush_threshold: 500,
        }
    }

    /// Enable persistence through `store`
    pub fn with_store(mut self, store: StoreSender, flush_threshold: usize) -> Self {
        self.store = Some(store);
        self.flush_threshold = flush_threshold;
        self
    }
}
