//! DeviceRegistry - slot table and occupancy bitmask
//!
//! Single source of truth for which device occupies which slot. Owned by the
//! hub task; every mutation happens on the main context. The registry is the
//! only writer of the companion [`DelegateSlot`].

use std::sync::Arc;

use contracts::{Slot, SlotMask};
use devices::Device;
use tracing::{debug, info, warn};
use transport::DelegateSlot;

/// Slot-indexed device table
pub struct DeviceRegistry {
    slots: [Option<Box<dyn Device>>; Slot::COUNT],
    mask: SlotMask,
    delegate: Arc<DelegateSlot>,
}

impl DeviceRegistry {
    pub fn new(delegate: Arc<DelegateSlot>) -> Self {
        Self {
            slots: std::array::from_fn(|_| None),
            mask: SlotMask::empty(),
            delegate,
        }
    }

    /// Bind `device` to `slot`
    ///
    /// An existing binding is overwritten without disconnecting the old
    /// device; it is handed back to the caller untouched.
    pub fn bind(&mut self, mut device: Box<dyn Device>, slot: Slot) -> Option<Box<dyn Device>> {
        device.assign_slot(slot);

        if device.is_connected() && device.uses_companion_channel() {
            self.claim_delegate(slot);
        } else if self.delegate.current() == Some(slot) {
            self.delegate.release(slot);
        }

        info!(
            slot = %slot,
            device_id = device.device_id(),
            device_name = device.device_name(),
            "device bound"
        );

        let previous = self.slots[slot.index()].replace(device);
        self.mask.insert(slot);
        observability::record_bound_slots(self.mask.len());

        if let Some(prev) = &previous {
            warn!(slot = %slot, replaced = prev.device_id(), "binding overwritten");
        }
        previous
    }

    /// Disconnect and remove the device bound to `slot`
    ///
    /// No-op on an empty slot. Disconnect failures are logged only.
    pub fn unbind(&mut self, slot: Slot) -> Option<Box<dyn Device>> {
        let mut device = self.slots[slot.index()].take()?;

        if let Err(e) = device.disconnect() {
            warn!(slot = %slot, device_id = device.device_id(), error = %e, "disconnect failed during unbind");
        }
        self.delegate.release(slot);
        self.mask.remove(slot);
        observability::record_bound_slots(self.mask.len());

        info!(slot = %slot, device_id = device.device_id(), "device unbound");
        Some(device)
    }

    pub fn is_bound(&self, slot: Slot) -> bool {
        self.mask.contains(slot)
    }

    pub fn get(&self, slot: Slot) -> Option<&dyn Device> {
        match &self.slots[slot.index()] {
            Some(device) => Some(&**device),
            None => None,
        }
    }

    pub fn get_mut(&mut self, slot: Slot) -> Option<&mut dyn Device> {
        match &mut self.slots[slot.index()] {
            Some(device) => Some(&mut **device),
            None => None,
        }
    }

    /// Connect the device at `slot`
    ///
    /// On success a companion-channel device takes over the inbound delegate.
    pub fn connect(&mut self, slot: Slot) -> bool {
        let Some(device) = self.slots[slot.index()].as_mut() else {
            debug!(slot = %slot, "connect on empty slot");
            return false;
        };

        if !device.connect() {
            return false;
        }
        if device.uses_companion_channel() {
            self.claim_delegate(slot);
        }
        true
    }

    /// Disconnect the device at `slot` but keep it bound
    ///
    /// # Returns
    /// `false` when the slot is empty
    pub fn disconnect(&mut self, slot: Slot) -> bool {
        let Some(device) = self.slots[slot.index()].as_mut() else {
            return false;
        };

        if let Err(e) = device.disconnect() {
            warn!(slot = %slot, device_id = device.device_id(), error = %e, "disconnect failed");
        }
        self.delegate.release(slot);
        true
    }

    /// Every slot in `required` is bound to a device whose name is allowed
    ///
    /// Fail-closed: stops at the first slot that does not qualify.
    pub fn check_required_slots(&self, required: SlotMask, allowed_device_names: &[String]) -> bool {
        for slot in required.iter() {
            let Some(device) = self.get(slot) else {
                debug!(slot = %slot, "required slot unbound");
                return false;
            };
            if !allowed_device_names
                .iter()
                .any(|name| name == device.device_name())
            {
                debug!(slot = %slot, device_name = device.device_name(), "device not allowed for slot");
                return false;
            }
        }
        true
    }

    /// Turn the IMU toggle off on every bound device
    pub fn reset_all_enable_imu(&mut self) {
        for device in self.slots.iter_mut().flatten() {
            device.set_enable_imu(false);
        }
    }

    /// Whether any slot holds a device named `device_name`
    pub fn has_exclusive_device_bound(&self, device_name: &str) -> bool {
        self.find_by_name(device_name).is_some()
    }

    /// First slot holding a device named `device_name`
    pub fn find_by_name(&self, device_name: &str) -> Option<Slot> {
        Slot::ALL.into_iter().find(|slot| {
            self.get(*slot)
                .is_some_and(|device| device.device_name() == device_name)
        })
    }

    pub fn bound_mask(&self) -> SlotMask {
        self.mask
    }

    /// Bound slots in bit order
    pub fn bound_slots(&self) -> Vec<Slot> {
        self.mask.iter().collect()
    }

    pub fn len(&self) -> usize {
        self.mask.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mask.is_empty()
    }

    fn claim_delegate(&self, slot: Slot) {
        if let Some(previous) = self.delegate.claim(slot) {
            if previous != slot {
                debug!(from = %previous, to = %slot, "companion delegate moved");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::SessionConfig;
    use devices::{
        DriverContext, LogFusionConsumer, LogNotifier, SimulatedConfig, SimulatedDevice,
        WatchDriver,
    };
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use transport::{MockSession, SessionAdapter};

    fn ctx() -> DriverContext {
        DriverContext::new(Arc::new(LogFusionConsumer), Arc::new(LogNotifier))
    }

    fn simulated(id: &str) -> Box<dyn Device> {
        Box::new(SimulatedDevice::new(
            id,
            Slot::Chest,
            SimulatedConfig::default(),
            Arc::new(|_| {}),
            &ctx(),
        ))
    }

    fn named(id: &str, name: &str) -> Box<dyn Device> {
        Box::new(
            SimulatedDevice::new(id, Slot::Chest, SimulatedConfig::default(), Arc::new(|_| {}), &ctx())
                .with_name(name),
        )
    }

    fn watch_setup() -> (Arc<SessionAdapter>, DeviceRegistry) {
        let adapter = Arc::new(SessionAdapter::new(
            Arc::new(MockSession::new()),
            SessionConfig::default(),
        ));
        let registry = DeviceRegistry::new(adapter.delegate());
        (adapter, registry)
    }

    fn expected_mask(slots: &[Option<()>; Slot::COUNT]) -> u8 {
        slots
            .iter()
            .enumerate()
            .filter(|(_, s)| s.is_some())
            .fold(0u8, |acc, (i, _)| acc | (1 << i))
    }

    #[test]
    fn test_mask_matches_occupancy_under_random_ops() {
        let mut rng = StdRng::seed_from_u64(0x5eed);
        let (_adapter, mut registry) = watch_setup();
        let mut model: [Option<()>; Slot::COUNT] = [None; Slot::COUNT];

        for step in 0..2_000 {
            let slot = Slot::ALL[rng.random_range(0..Slot::COUNT)];
            if rng.random_bool(0.5) {
                registry.bind(simulated(&format!("dev-{step}")), slot);
                model[slot.index()] = Some(());
            } else {
                registry.unbind(slot);
                model[slot.index()] = None;
            }

            assert_eq!(registry.bound_mask().bits(), expected_mask(&model), "step {step}");
            for s in Slot::ALL {
                assert_eq!(registry.is_bound(s), registry.get(s).is_some());
            }
        }
    }

    #[test]
    fn test_unbind_empty_slot_is_noop() {
        let (_adapter, mut registry) = watch_setup();
        registry.bind(simulated("a"), Slot::LeftFoot);

        assert!(registry.unbind(Slot::RightFoot).is_none());
        assert_eq!(registry.bound_slots(), vec![Slot::LeftFoot]);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_bind_assigns_slot() {
        let (_adapter, mut registry) = watch_setup();
        registry.bind(simulated("a"), Slot::RightHand);
        assert_eq!(registry.get(Slot::RightHand).unwrap().slot(), Slot::RightHand);
    }

    #[test]
    fn test_overwrite_does_not_disconnect_previous() {
        let (_adapter, mut registry) = watch_setup();
        let mut d1 = simulated("d1");
        assert!(d1.connect());
        registry.bind(d1, Slot::Chest);

        let previous = registry.bind(simulated("d2"), Slot::Chest).unwrap();
        assert_eq!(previous.device_id(), "d1");
        assert!(previous.is_connected());
        assert_eq!(registry.get(Slot::Chest).unwrap().device_id(), "d2");
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_unbind_disconnects() {
        let (_adapter, mut registry) = watch_setup();
        let mut d = simulated("d");
        d.connect();
        registry.bind(d, Slot::Chest);

        let removed = registry.unbind(Slot::Chest).unwrap();
        assert!(!removed.is_connected());
        assert!(!registry.is_bound(Slot::Chest));
    }

    #[test]
    fn test_check_required_slots_truth_table() {
        let (_adapter, mut registry) = watch_setup();
        let allowed = vec!["Apple Watch".to_string()];
        let chest: SlotMask = [Slot::Chest].into_iter().collect();
        let chest_and_hand: SlotMask = [Slot::Chest, Slot::LeftHand].into_iter().collect();

        // nothing required
        assert!(registry.check_required_slots(SlotMask::empty(), &allowed));
        // required but unbound
        assert!(!registry.check_required_slots(chest, &allowed));

        // bound with a disallowed name
        registry.bind(named("x", "Other Band"), Slot::Chest);
        assert!(!registry.check_required_slots(chest, &allowed));

        // bound and allowed
        registry.bind(named("w", "Apple Watch"), Slot::Chest);
        assert!(registry.check_required_slots(chest, &allowed));

        // one of two required slots missing
        assert!(!registry.check_required_slots(chest_and_hand, &allowed));

        // empty allow-list never qualifies
        assert!(!registry.check_required_slots(chest, &[]));
    }

    #[test]
    fn test_reset_all_enable_imu() {
        let (_adapter, mut registry) = watch_setup();
        for (i, slot) in [Slot::LeftHand, Slot::Chest].into_iter().enumerate() {
            let mut d = simulated(&format!("d{i}"));
            d.set_enable_imu(true);
            registry.bind(d, slot);
        }

        registry.reset_all_enable_imu();
        assert!(!registry.get(Slot::LeftHand).unwrap().enable_imu());
        assert!(!registry.get(Slot::Chest).unwrap().enable_imu());
    }

    #[test]
    fn test_exclusive_device_lookup() {
        let (_adapter, mut registry) = watch_setup();
        assert!(!registry.has_exclusive_device_bound("Apple Watch"));

        registry.bind(named("w", "Apple Watch"), Slot::RightHand);
        assert!(registry.has_exclusive_device_bound("Apple Watch"));
        assert_eq!(registry.find_by_name("Apple Watch"), Some(Slot::RightHand));
        assert!(!registry.has_exclusive_device_bound("Simulated IMU"));
    }

    #[test]
    fn test_connect_claims_and_unbind_releases_delegate() {
        let (adapter, mut registry) = watch_setup();
        let watch = WatchDriver::new("watch", Slot::Chest, Arc::clone(&adapter), &ctx());
        registry.bind(Box::new(watch), Slot::Chest);
        assert_eq!(adapter.delegate().current(), None);

        assert!(registry.connect(Slot::Chest));
        assert_eq!(adapter.delegate().current(), Some(Slot::Chest));

        registry.unbind(Slot::Chest);
        assert_eq!(adapter.delegate().current(), None);
    }

    #[test]
    fn test_bind_connected_watch_claims_delegate() {
        let (adapter, mut registry) = watch_setup();
        let mut watch = WatchDriver::new("watch", Slot::Chest, Arc::clone(&adapter), &ctx());
        assert!(watch.connect());

        registry.bind(Box::new(watch), Slot::LeftHand);
        assert_eq!(adapter.delegate().current(), Some(Slot::LeftHand));

        // a non-companion device replacing the owner releases the delegate
        registry.bind(simulated("sim"), Slot::LeftHand);
        assert_eq!(adapter.delegate().current(), None);
    }

    #[test]
    fn test_disconnect_keeps_binding() {
        let (adapter, mut registry) = watch_setup();
        let watch = WatchDriver::new("watch", Slot::Chest, Arc::clone(&adapter), &ctx());
        registry.bind(Box::new(watch), Slot::Chest);
        registry.connect(Slot::Chest);

        assert!(registry.disconnect(Slot::Chest));
        assert!(registry.is_bound(Slot::Chest));
        assert!(!registry.get(Slot::Chest).unwrap().is_connected());
        assert_eq!(adapter.delegate().current(), None);
        assert!(!registry.disconnect(Slot::LeftFoot));
    }
}
