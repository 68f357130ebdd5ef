//! Simulated device implementation
//!
//! Generates synthetic IMU batches in a background thread while a collection
//! session is open. Batches are handed to an [`InboundCallback`] which
//! re-dispatches them onto the hub's main context, the same path watch
//! batches take. Used for demos and testing without hardware.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use contracts::{
    CollectionRequest, CompanionMessage, DeviceKind, Notifier, SensorSample, Slot, Vector3,
};
use tracing::{debug, info, trace, warn};
use transport::RoutedMessage;

use crate::collector::SampleCollector;
use crate::device::{Device, DriverContext};
use crate::error::{DeviceError, Result};
use crate::stats::IngestionStats;

/// Receives generated batches, called from the generator thread
pub type InboundCallback = Arc<dyn Fn(RoutedMessage) + Send + Sync>;

/// Simulated device configuration
#[derive(Debug, Clone)]
pub struct SimulatedConfig {
    /// Sample rate (Hz)
    pub frequency_hz: f64,
    /// Samples per emitted batch
    pub batch_size: usize,
    /// Connection attempts refused before the device comes up
    pub refuse_connects: u32,
}

impl Default for SimulatedConfig {
    fn default() -> Self {
        Self {
            frequency_hz: 100.0,
            batch_size: 25,
            refuse_connects: 0,
        }
    }
}

/// Simulated device
pub struct SimulatedDevice {
    device_id: String,
    device_name: String,
    config: SimulatedConfig,
    callback: InboundCallback,
    notifier: Arc<dyn Notifier>,
    collector: SampleCollector,
    running: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
    refusals_left: u32,
    connected: bool,
}

impl SimulatedDevice {
    pub const DEVICE_NAME: &'static str = "Simulated IMU";

    pub fn new(
        device_id: impl Into<String>,
        slot: Slot,
        config: SimulatedConfig,
        callback: InboundCallback,
        ctx: &DriverContext,
    ) -> Self {
        Self {
            device_id: device_id.into(),
            device_name: Self::DEVICE_NAME.to_string(),
            refusals_left: config.refuse_connects,
            config,
            callback,
            notifier: Arc::clone(&ctx.notifier),
            collector: SampleCollector::new(DeviceKind::Simulated, slot, ctx),
            running: Arc::new(AtomicBool::new(false)),
            worker: None,
            connected: false,
        }
    }

    /// Override the reported hardware name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.device_name = name.into();
        self
    }

    /// Whether the generator thread is producing batches
    pub fn is_generating(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    /// Synthetic reading at `t` seconds, phase-shifted per slot
    pub fn generate_sample(slot: Slot, t: f64) -> SensorSample {
        let phase = slot.index() as f64 * 0.4;
        let w = 2.0 * std::f64::consts::PI * 1.5;

        SensorSample {
            timestamp: t,
            acc: Vector3::new(
                0.8 * (w * t + phase).sin(),
                0.3 * (w * t + phase).cos(),
                9.81 + 0.5 * (2.0 * w * t).sin(),
            ),
            gyro: Vector3::new(
                0.2 * (w * t + phase).cos(),
                0.1 * (w * t).sin(),
                0.05,
            ),
            mag: None,
        }
    }

    fn spawn_generator(&mut self) {
        if self.running.swap(true, Ordering::SeqCst) {
            return;
        }

        let slot = self.slot();
        let device_id = self.device_id.clone();
        let callback = Arc::clone(&self.callback);
        let running = Arc::clone(&self.running);
        let batch_size = self.config.batch_size.max(1);
        let frequency_hz = if self.config.frequency_hz > 0.0 {
            self.config.frequency_hz
        } else {
            SimulatedConfig::default().frequency_hz
        };
        let period = 1.0 / frequency_hz;
        let interval = Duration::from_secs_f64(period * batch_size as f64);

        self.worker = Some(thread::spawn(move || {
            let start = Instant::now();
            let mut emitted: u64 = 0;

            debug!(device_id = %device_id, slot = %slot, frequency_hz, batch_size, "generator started");

            while running.load(Ordering::Relaxed) {
                thread::sleep(interval);
                if !running.load(Ordering::Relaxed) {
                    break;
                }

                let samples: Vec<_> = (0..batch_size as u64)
                    .map(|i| Self::generate_sample(slot, (emitted + i) as f64 * period))
                    .collect();
                emitted += batch_size as u64;

                callback(RoutedMessage {
                    slot,
                    message: CompanionMessage::imu_batch(&samples),
                });

                trace!(
                    device_id = %device_id,
                    emitted,
                    elapsed = start.elapsed().as_secs_f64(),
                    "simulated batch sent"
                );
            }

            debug!(device_id = %device_id, emitted, "generator stopped");
        }));
    }

    fn stop_generator(&mut self) -> Result<()> {
        self.running.store(false, Ordering::SeqCst);
        let Some(worker) = self.worker.take() else {
            return Ok(());
        };

        worker.join().map_err(|_| DeviceError::GeneratorPanicked {
            device_id: self.device_id.clone(),
        })
    }
}

impl Device for SimulatedDevice {
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
        DeviceKind::Simulated
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

    fn try_connect(&mut self) -> Result<()> {
        if self.refusals_left > 0 {
            self.refusals_left -= 1;
            observability::record_connect_failure(DeviceKind::Simulated, "refused");
            return Err(DeviceError::ConnectRefused {
                device_id: self.device_id.clone(),
            });
        }
        self.connected = true;
        Ok(())
    }

    fn connect(&mut self) -> bool {
        match self.try_connect() {
            Ok(()) => {
                info!(device_id = %self.device_id, slot = %self.slot(), "simulated device connected");
                true
            }
            Err(e) => {
                warn!(device_id = %self.device_id, error = %e, "simulated connect failed");
                self.notifier.emit(&e.user_message());
                false
            }
        }
    }

    fn disconnect(&mut self) -> Result<()> {
        let joined = self.stop_generator();
        self.collector.end();
        self.connected = false;
        joined
    }

    fn start_collection(&mut self, request: &CollectionRequest) {
        self.collector.begin();
        self.spawn_generator();
        info!(
            device_id = %self.device_id,
            slot = %self.slot(),
            activity = %request.activity,
            "simulated collection started"
        );
    }

    fn stop_collection(&mut self) {
        if let Err(e) = self.stop_generator() {
            warn!(error = %e, "generator did not stop cleanly");
        }
        self.collector.end();
        info!(device_id = %self.device_id, slot = %self.slot(), "simulated collection stopped");
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

impl Drop for SimulatedDevice {
    fn drop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
    }
}
