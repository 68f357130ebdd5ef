//! Companion watch emulator
//!
//! Plays the role of the watch app on the far side of a [`MockSession`]:
//! streams `imu_batch` payloads (and an occasional `status`) into the
//! session adapter from its own thread, exactly as a platform callback would.
//!
//! [`MockSession`]: transport::MockSession

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::{Context, Result};
use contracts::{CompanionMessage, KeyValueMap, Slot};
use devices::SimulatedDevice;
use serde_json::Value;
use tracing::{debug, info};
use transport::SessionAdapter;

/// Batches between two status messages
const STATUS_EVERY: u64 = 20;

pub struct CompanionEmulator {
    running: Arc<AtomicBool>,
    sent: Arc<AtomicU64>,
    worker: Option<JoinHandle<()>>,
}

impl CompanionEmulator {
    /// Start streaming; `slot` only shapes the synthetic waveform
    pub fn spawn(
        adapter: Arc<SessionAdapter>,
        slot: Slot,
        frequency_hz: f64,
        batch_size: usize,
    ) -> Result<Self> {
        let running = Arc::new(AtomicBool::new(true));
        let sent = Arc::new(AtomicU64::new(0));
        let batch_size = batch_size.max(1);
        let frequency_hz = if frequency_hz > 0.0 { frequency_hz } else { 50.0 };
        let period = Duration::from_secs_f64(batch_size as f64 / frequency_hz);

        let worker = {
            let running = Arc::clone(&running);
            let sent = Arc::clone(&sent);
            thread::Builder::new()
                .name("companion-emulator".into())
                .spawn(move || {
                    let mut t = 0.0;
                    while running.load(Ordering::Relaxed) {
                        let samples: Vec<_> = (0..batch_size)
                            .map(|i| {
                                SimulatedDevice::generate_sample(slot, t + i as f64 / frequency_hz)
                            })
                            .collect();
                        t += batch_size as f64 / frequency_hz;

                        adapter.on_inbound(CompanionMessage::imu_batch_payload(&samples));
                        let count = sent.fetch_add(1, Ordering::Relaxed) + 1;
                        if count % STATUS_EVERY == 0 {
                            adapter.on_inbound(status_payload(count));
                        }

                        thread::sleep(period);
                    }
                    debug!("companion emulator exiting");
                })
                .context("Failed to spawn companion emulator thread")?
        };

        info!(slot = %slot, frequency_hz, batch_size, "companion emulator streaming");

        Ok(Self {
            running,
            sent,
            worker: Some(worker),
        })
    }

    pub fn batches_sent(&self) -> u64 {
        self.sent.load(Ordering::Relaxed)
    }

    /// Stop streaming and return the number of batches sent
    pub fn stop(mut self) -> u64 {
        self.running.store(false, Ordering::Relaxed);
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
        self.batches_sent()
    }
}

impl Drop for CompanionEmulator {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Relaxed);
    }
}

fn status_payload(batches: u64) -> KeyValueMap {
    let mut map = KeyValueMap::new();
    map.insert("type".into(), Value::String("status".into()));
    map.insert("batches_sent".into(), Value::from(batches));
    map.insert("battery".into(), Value::from(0.87));
    map
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::SessionConfig;
    use transport::MockSession;

    #[test]
    fn test_emulator_streams_to_owner() {
        let adapter = Arc::new(SessionAdapter::new(
            Arc::new(MockSession::new()),
            SessionConfig::default(),
        ));
        let rx = adapter.take_receiver().unwrap();
        adapter.delegate().claim(Slot::Chest);

        let emulator = CompanionEmulator::spawn(Arc::clone(&adapter), Slot::Chest, 1000.0, 5).unwrap();
        thread::sleep(Duration::from_millis(50));
        let sent = emulator.stop();

        assert!(sent > 0);
        let routed = rx.try_recv().unwrap();
        assert_eq!(routed.slot, Slot::Chest);
        match routed.message {
            CompanionMessage::ImuBatch(entries) => assert_eq!(entries.len(), 5),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_status_payload_decodes() {
        let message = CompanionMessage::from_map(status_payload(20)).unwrap();
        match message {
            CompanionMessage::Status(map) => {
                assert_eq!(map.get("batches_sent"), Some(&Value::from(20)));
                assert!(!map.contains_key("type"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
