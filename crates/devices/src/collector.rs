//! SampleCollector - per-device ingestion path
//!
//! Decodes inbound batches, forwards them to the fusion consumer and feeds
//! the persistence buffer. Every driver embeds one collector; the session
//! flags it holds gate every inbound message.

use std::sync::Arc;

use contracts::{DeviceKind, FusionConsumer, KeyValueMap, SensorSample, Slot, WireSample};
use persistence::{PersistenceBuffer, StoreSender};
use serde_json::Value;
use tracing::{debug, trace, warn};

use crate::device::DriverContext;
use crate::stats::IngestionStats;

struct Persistence {
    buffer: PersistenceBuffer,
    store: StoreSender,
}

/// Ingestion state of one device
pub struct SampleCollector {
    kind: DeviceKind,
    slot: Slot,
    fusion: Arc<dyn FusionConsumer>,
    persistence: Option<Persistence>,
    can_receive_data: bool,
    enable_imu: bool,
    stats: IngestionStats,
}

impl SampleCollector {
    pub fn new(kind: DeviceKind, slot: Slot, ctx: &DriverContext) -> Self {
        let persistence = ctx.store.clone().map(|store| Persistence {
            buffer: PersistenceBuffer::new(ctx.flush_threshold),
            store,
        });

        Self {
            kind,
            slot,
            fusion: Arc::clone(&ctx.fusion),
            persistence,
            can_receive_data: false,
            enable_imu: false,
            stats: IngestionStats::default(),
        }
    }

    pub fn slot(&self) -> Slot {
        self.slot
    }

    pub fn set_slot(&mut self, slot: Slot) {
        self.slot = slot;
    }

    pub fn can_receive_data(&self) -> bool {
        self.can_receive_data
    }

    pub fn enable_imu(&self) -> bool {
        self.enable_imu
    }

    pub fn set_enable_imu(&mut self, enabled: bool) {
        self.enable_imu = enabled;
    }

    pub fn stats(&self) -> IngestionStats {
        self.stats
    }

    pub fn buffered_len(&self) -> usize {
        self.persistence.as_ref().map_or(0, |p| p.buffer.len())
    }

    /// Open a session: accept data, start from an empty buffer
    pub fn begin(&mut self) {
        self.can_receive_data = true;
        if let Some(p) = self.persistence.as_mut() {
            p.buffer.clear();
        }
    }

    /// Close the session: final flush, then clear both flags
    pub fn end(&mut self) {
        self.flush_remaining();
        self.can_receive_data = false;
        self.enable_imu = false;
    }

    /// Hand any buffered samples to the store
    pub fn flush_remaining(&mut self) {
        let Some(batch) = self.persistence.as_mut().and_then(|p| p.buffer.drain()) else {
            return;
        };
        self.flush(batch);
    }

    /// Handle the entries of one `imu_batch`
    pub fn ingest_batch(&mut self, entries: &[Value]) {
        if !self.can_receive_data {
            self.stats.batches_discarded += 1;
            observability::record_batch_discarded(self.slot);
            trace!(slot = %self.slot, entries = entries.len(), "no open session, batch discarded");
            return;
        }

        self.stats.batches_received += 1;

        let mut samples = Vec::with_capacity(entries.len());
        let mut decode_errors = 0usize;
        for entry in entries {
            match WireSample::decode(entry) {
                Ok(sample) => samples.push(sample),
                Err(e) => {
                    decode_errors += 1;
                    debug!(slot = %self.slot, error = %e, "skipping malformed entry");
                }
            }
        }

        self.stats.decode_errors += decode_errors as u64;
        observability::record_batch_ingested(self.slot, samples.len(), decode_errors);

        if samples.is_empty() {
            return;
        }

        self.persist(&samples);

        self.stats.samples_forwarded += samples.len() as u64;
        self.fusion.on_batch(self.slot, samples);
    }

    /// Handle a companion status payload
    pub fn ingest_status(&mut self, payload: KeyValueMap) {
        if !self.can_receive_data {
            trace!(slot = %self.slot, "no open session, status discarded");
            return;
        }
        self.stats.status_forwarded += 1;
        self.fusion.on_status(payload);
    }

    fn persist(&mut self, samples: &[SensorSample]) {
        let Some(p) = self.persistence.as_mut() else {
            return;
        };

        let mut ready = Vec::new();
        for sample in samples {
            if let Some(batch) = p.buffer.push(*sample) {
                ready.push(batch);
            }
        }

        for batch in ready {
            self.flush(batch);
        }
    }

    fn flush(&mut self, batch: Vec<SensorSample>) {
        let Some(p) = self.persistence.as_ref() else {
            return;
        };

        let rows = batch.len();
        let accepted = p.store.try_send(batch);
        observability::record_persistence_flush(self.kind, rows, accepted);

        if accepted {
            self.stats.flushes += 1;
            debug!(slot = %self.slot, store = p.store.name(), rows, "buffer flushed");
        } else {
            self.stats.flushes_dropped += 1;
            warn!(slot = %self.slot, store = p.store.name(), rows, "flush refused by store queue");
        }
    }
}
