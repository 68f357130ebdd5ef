//! 每设备采集统计

/// Ingestion counters of one device
///
/// Accumulated across collection sessions; read through
/// [`Device::stats`](crate::Device::stats).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestionStats {
    /// Inbound `imu_batch` messages handled
    pub batches_received: u64,
    /// Batches discarded because no session was open
    pub batches_discarded: u64,
    /// Samples handed to the fusion consumer
    pub samples_forwarded: u64,
    /// Entries skipped because they failed to decode
    pub decode_errors: u64,
    /// Status payloads handed to the fusion consumer
    pub status_forwarded: u64,
    /// Batches queued for the store
    pub flushes: u64,
    /// Batches the store queue refused
    pub flushes_dropped: u64,
}

impl IngestionStats {
    /// Decode error ratio over all received entries
    pub fn decode_error_rate(&self) -> f64 {
        let total = self.samples_forwarded + self.decode_errors;
        if total == 0 {
            0.0
        } else {
            self.decode_errors as f64 / total as f64
        }
    }
}
