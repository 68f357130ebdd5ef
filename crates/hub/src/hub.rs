//! DeviceHub - main context owning the registry
//!
//! One tokio task serializes every mutation: application commands, inbound
//! companion messages and reconnection results. Inbound traffic is drained
//! before commands so a command observes every message queued ahead of it,
//! up to a burst of [`MAX_INBOUND_BURST`] messages; after that a pending
//! command gets its turn.

use std::sync::Arc;

use contracts::{
    CollectionRequest, DeviceKind, FusionConsumer, HubConfig, Notifier, Slot, SlotMask,
};
use devices::{exclusive_conflict_notice, reconnect, Device, LogFusionConsumer, LogNotifier, ReconnectOutcome, ReconnectResult};
use persistence::StoreHandle;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};
use transport::{RoutedMessage, SessionAdapter, SessionTransport};

use crate::command::{DeviceSummary, HubCommand};
use crate::error::{HubError, Result};
use crate::factory::DeviceFactory;
use crate::handle::HubHandle;
use crate::registry::DeviceRegistry;

const COMMAND_QUEUE_CAPACITY: usize = 64;

/// Inbound messages handled back to back before a queued command is served
pub const MAX_INBOUND_BURST: usize = 256;

/// Builder for creating a DeviceHub
pub struct HubBuilder {
    config: HubConfig,
    transport: Arc<dyn SessionTransport>,
    fusion: Arc<dyn FusionConsumer>,
    notifier: Arc<dyn Notifier>,
}

impl HubBuilder {
    pub fn new(config: HubConfig, transport: Arc<dyn SessionTransport>) -> Self {
        Self {
            config,
            transport,
            fusion: Arc::new(LogFusionConsumer),
            notifier: Arc::new(LogNotifier),
        }
    }

    pub fn fusion(mut self, fusion: Arc<dyn FusionConsumer>) -> Self {
        self.fusion = fusion;
        self
    }

    pub fn notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    /// Build the hub and its handle
    ///
    /// Must run inside a tokio runtime when persistence is enabled, since the
    /// store workers are spawned here.
    #[instrument(name = "hub_builder_build", skip(self))]
    pub fn build(self) -> Result<(DeviceHub, HubHandle)> {
        let adapter = Arc::new(SessionAdapter::new(
            self.transport,
            self.config.session.clone(),
        ));
        // freshly created adapter, its receiver is always present
        let companion_rx = adapter
            .take_receiver()
            .unwrap_or_else(|| async_channel::unbounded().1);

        let mut stores = Vec::new();
        if self.config.persistence.enabled {
            for kind in [DeviceKind::Watch, DeviceKind::Simulated] {
                stores.push((
                    kind,
                    StoreHandle::spawn_csv(
                        &self.config.persistence.output_dir,
                        kind,
                        self.config.persistence.queue_capacity,
                    )?,
                ));
            }
            info!(
                output_dir = %self.config.persistence.output_dir.display(),
                flush_threshold = self.config.persistence.flush_threshold,
                "persistence enabled"
            );
        }

        let (local_tx, local_rx) = async_channel::unbounded();
        let factory = DeviceFactory::new(
            Arc::clone(&adapter),
            self.fusion,
            self.notifier,
            stores
                .iter()
                .map(|(kind, handle)| (*kind, handle.sender()))
                .collect(),
            self.config.persistence.flush_threshold,
            local_tx,
        );

        let (tx, commands) = mpsc::channel(COMMAND_QUEUE_CAPACITY);
        let (reconnect_tx, reconnect_rx) = mpsc::unbounded_channel();

        let hub = DeviceHub {
            registry: DeviceRegistry::new(adapter.delegate()),
            config: self.config,
            factory: factory.clone(),
            stores: stores.into_iter().map(|(_, handle)| handle).collect(),
            commands,
            companion_rx,
            local_rx,
            reconnect_tx,
            reconnect_rx,
            pollers: std::array::from_fn(|_| None),
            next_poller_id: 0,
        };

        Ok((hub, HubHandle::new(tx, factory)))
    }
}

struct Poller {
    id: u64,
    device_name: String,
    task: JoinHandle<()>,
}

/// The main context
pub struct DeviceHub {
    config: HubConfig,
    registry: DeviceRegistry,
    factory: DeviceFactory,
    stores: Vec<StoreHandle>,
    commands: mpsc::Receiver<HubCommand>,
    companion_rx: async_channel::Receiver<RoutedMessage>,
    local_rx: async_channel::Receiver<RoutedMessage>,
    reconnect_tx: mpsc::UnboundedSender<(u64, ReconnectResult)>,
    reconnect_rx: mpsc::UnboundedReceiver<(u64, ReconnectResult)>,
    pollers: [Option<Poller>; Slot::COUNT],
    next_poller_id: u64,
}

impl DeviceHub {
    pub fn builder(config: HubConfig, transport: Arc<dyn SessionTransport>) -> HubBuilder {
        HubBuilder::new(config, transport)
    }

    /// Spawn the hub task
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Run the main loop
    ///
    /// Returns after shutdown, or when every handle has been dropped.
    #[instrument(name = "hub_run", skip(self))]
    pub async fn run(mut self) {
        info!(persistence = !self.stores.is_empty(), "device hub started");

        let mut burst = 0usize;
        loop {
            if burst >= MAX_INBOUND_BURST {
                burst = 0;
                match self.commands.try_recv() {
                    Ok(command) => {
                        if self.on_command(Some(command)).await {
                            break;
                        }
                        continue;
                    }
                    Err(TryRecvError::Empty) => {}
                    Err(TryRecvError::Disconnected) => {
                        self.on_command(None).await;
                        break;
                    }
                }
            }

            tokio::select! {
                biased;

                Ok(routed) = self.companion_rx.recv() => {
                    burst += 1;
                    self.dispatch_inbound(routed);
                }
                Ok(routed) = self.local_rx.recv() => {
                    burst += 1;
                    self.dispatch_inbound(routed);
                }
                Some((id, result)) = self.reconnect_rx.recv() => self.on_reconnect_finished(id, result),
                command = self.commands.recv() => {
                    burst = 0;
                    if self.on_command(command).await {
                        break;
                    }
                }
            }
        }

        info!("device hub stopped");
    }

    /// Returns `true` when the loop must stop
    async fn on_command(&mut self, command: Option<HubCommand>) -> bool {
        match command {
            Some(HubCommand::Shutdown { reply }) => {
                self.shutdown().await;
                let _ = reply.send(());
                true
            }
            Some(command) => {
                self.handle_command(command);
                false
            }
            None => {
                self.shutdown().await;
                true
            }
        }
    }

    fn handle_command(&mut self, command: HubCommand) {
        match command {
            HubCommand::Bind {
                device,
                slot,
                reply,
            } => {
                let _ = reply.send(self.bind(device, slot));
            }
            HubCommand::BindWithReconnect {
                device,
                slot,
                reply,
            } => {
                let _ = reply.send(self.bind_with_reconnect(device, slot));
            }
            HubCommand::Unbind { slot, reply } => {
                self.abort_poller(slot);
                let _ = reply.send(self.registry.unbind(slot).is_some());
            }
            HubCommand::Connect { slot, reply } => {
                let _ = reply.send(self.registry.connect(slot));
            }
            HubCommand::Disconnect { slot, reply } => {
                let _ = reply.send(self.registry.disconnect(slot));
            }
            HubCommand::StartCollection { request, reply } => {
                let _ = reply.send(self.start_collection(&request));
            }
            HubCommand::StopCollection { reply } => {
                let _ = reply.send(self.stop_collection());
            }
            HubCommand::SetEnableImu {
                slot,
                enabled,
                reply,
            } => {
                let found = match self.registry.get_mut(slot) {
                    Some(device) => {
                        device.set_enable_imu(enabled);
                        true
                    }
                    None => false,
                };
                let _ = reply.send(found);
            }
            HubCommand::ResetAllEnableImu { reply } => {
                self.registry.reset_all_enable_imu();
                let _ = reply.send(());
            }
            HubCommand::CheckRequiredSlots {
                required,
                allowed_device_names,
                reply,
            } => {
                let _ = reply.send(
                    self.registry
                        .check_required_slots(required, &allowed_device_names),
                );
            }
            HubCommand::CheckRequirements { reply } => {
                let satisfied = match &self.config.requirements {
                    Some(req) => self
                        .registry
                        .check_required_slots(req.mask(), &req.allowed_devices),
                    None => true,
                };
                let _ = reply.send(satisfied);
            }
            HubCommand::HasExclusiveDeviceBound { device_name, reply } => {
                let _ = reply.send(self.registry.has_exclusive_device_bound(&device_name));
            }
            HubCommand::IsReconnecting { slot, reply } => {
                let _ = reply.send(self.pollers[slot.index()].is_some());
            }
            HubCommand::BoundMask { reply } => {
                let _ = reply.send(self.registry.bound_mask());
            }
            HubCommand::Devices { reply } => {
                let summaries = self
                    .registry
                    .bound_slots()
                    .into_iter()
                    .filter_map(|slot| self.registry.get(slot).map(DeviceSummary::of))
                    .collect();
                let _ = reply.send(summaries);
            }
            // handled by the main loop
            HubCommand::Shutdown { reply } => {
                let _ = reply.send(());
            }
        }
    }

    fn dispatch_inbound(&mut self, routed: RoutedMessage) {
        match self.registry.get_mut(routed.slot) {
            Some(device) => device.handle_inbound(routed.message),
            None => debug!(slot = %routed.slot, kind = routed.message.kind(), "inbound for empty slot dropped"),
        }
    }

    fn is_exclusive(&self, device: &dyn Device) -> bool {
        device.kind().is_exclusive()
            || self
                .config
                .exclusive_devices
                .iter()
                .any(|name| name == device.device_name())
    }

    /// Exclusive hardware may occupy one slot, counting pending pollers
    fn check_exclusive(&self, device: &dyn Device, slot: Slot) -> Result<()> {
        if !self.is_exclusive(device) {
            return Ok(());
        }
        let name = device.device_name();
        let bound = self.registry.find_by_name(name).filter(|bound| *bound != slot);
        let polling = || {
            Slot::ALL.into_iter().find(|other| {
                *other != slot
                    && self.pollers[other.index()]
                        .as_ref()
                        .is_some_and(|p| p.device_name == name)
            })
        };
        match bound.or_else(polling) {
            Some(bound) => Err(HubError::ExclusiveDeviceBound {
                device_name: name.to_string(),
                slot: bound,
            }),
            None => Ok(()),
        }
    }

    fn bind(&mut self, device: Box<dyn Device>, slot: Slot) -> Result<Option<String>> {
        self.check_exclusive(device.as_ref(), slot)?;
        self.abort_poller(slot);

        let displaced = self.registry.bind(device, slot);
        Ok(displaced.map(|d| d.device_id().to_string()))
    }

    fn bind_with_reconnect(&mut self, mut device: Box<dyn Device>, slot: Slot) -> Result<()> {
        self.check_exclusive(device.as_ref(), slot)?;
        self.abort_poller(slot);
        device.assign_slot(slot);

        self.next_poller_id += 1;
        let id = self.next_poller_id;
        let policy = self.config.reconnect.clone();
        let notifier = self.factory.notifier();
        let tx = self.reconnect_tx.clone();
        let device_name = device.device_name().to_string();

        info!(
            slot = %slot,
            device_id = device.device_id(),
            max_attempts = policy.max_attempts,
            "reconnection polling started"
        );

        let task = tokio::spawn(async move {
            let result = reconnect(device, slot, policy, notifier).await;
            let _ = tx.send((id, result));
        });
        self.pollers[slot.index()] = Some(Poller {
            id,
            device_name,
            task,
        });
        Ok(())
    }

    fn on_reconnect_finished(&mut self, id: u64, result: ReconnectResult) {
        let slot = result.slot;
        let current = self.pollers[slot.index()].as_ref().map(|p| p.id);
        if current != Some(id) {
            debug!(slot = %slot, "stale reconnection result dropped");
            return;
        }
        self.pollers[slot.index()] = None;

        match result.outcome {
            ReconnectOutcome::Connected { attempts } => {
                let mut device = result.device;
                if let Err(HubError::ExclusiveDeviceBound { device_name, slot: bound }) =
                    self.check_exclusive(device.as_ref(), slot)
                {
                    warn!(slot = %slot, bound = %bound, device_name = %device_name, "reconnected exclusive device rejected");
                    let _ = device.disconnect();
                    self.factory
                        .notifier()
                        .emit(&exclusive_conflict_notice(&device_name, bound));
                    return;
                }
                info!(slot = %slot, attempts, "reconnected, binding device");
                if let Some(displaced) = self.registry.bind(device, slot) {
                    warn!(slot = %slot, replaced = displaced.device_id(), "reconnected device replaced binding");
                }
            }
            ReconnectOutcome::Exhausted { attempts } => {
                debug!(slot = %slot, attempts, "slot stays unbound");
            }
        }
    }

    fn abort_poller(&mut self, slot: Slot) {
        if let Some(poller) = self.pollers[slot.index()].take() {
            poller.task.abort();
            debug!(slot = %slot, poller = poller.id, "reconnection polling cancelled");
        }
    }

    #[instrument(name = "hub_start_collection", skip(self, request), fields(activity = %request.activity))]
    fn start_collection(&mut self, request: &CollectionRequest) -> SlotMask {
        let mut started = SlotMask::empty();
        for slot in self.registry.bound_slots() {
            let Some(device) = self.registry.get_mut(slot) else {
                continue;
            };
            if !device.is_connected() {
                warn!(slot = %slot, device_id = device.device_id(), "skipping disconnected device");
                continue;
            }
            device.start_collection(request);
            started.insert(slot);
        }
        info!(slots = ?started, "collection started");
        started
    }

    #[instrument(name = "hub_stop_collection", skip(self))]
    fn stop_collection(&mut self) -> SlotMask {
        let mut stopped = SlotMask::empty();
        for slot in self.registry.bound_slots() {
            let Some(device) = self.registry.get_mut(slot) else {
                continue;
            };
            if device.can_receive_data() {
                device.stop_collection();
                stopped.insert(slot);
            }
        }
        info!(slots = ?stopped, "collection stopped");
        stopped
    }

    #[instrument(name = "hub_shutdown", skip(self))]
    async fn shutdown(&mut self) {
        for slot in Slot::ALL {
            self.abort_poller(slot);
        }
        self.stop_collection();
        for slot in Slot::ALL {
            self.registry.unbind(slot);
        }
        for store in self.stores.drain(..) {
            store.shutdown().await;
        }
        info!("device hub shut down");
    }
}
