//! Session statistics.

use std::time::Duration;

use hub::DeviceSummary;
use observability::IngestionAggregator;

/// Statistics from a simulated session
#[derive(Debug, Clone, Default)]
pub struct SessionStats {
    /// Wall time between start and stop of collection
    pub duration: Duration,

    /// Batches the companion emulator pushed into the session
    pub companion_batches: u64,

    /// Status messages forwarded to fusion
    pub status_events: u64,

    /// Whether the configured slot requirements held at start
    pub requirements_met: bool,

    /// Bound devices as they stood after stop
    pub devices: Vec<DeviceSummary>,

    /// Fusion-side aggregation
    pub ingestion: IngestionAggregator,
}

impl SessionStats {
    /// Forwarded samples per second
    pub fn throughput(&self) -> f64 {
        if self.duration.as_secs_f64() > 0.0 {
            self.ingestion.total_samples as f64 / self.duration.as_secs_f64()
        } else {
            0.0
        }
    }

    pub fn print_summary(&self) {
        println!("\n╔══════════════════════════════════════════════════════════════╗");
        println!("║                    Session Statistics                        ║");
        println!("╚══════════════════════════════════════════════════════════════╝\n");

        println!("📊 Overview");
        println!("   ├─ Duration: {:.2}s", self.duration.as_secs_f64());
        println!("   ├─ Companion batches: {}", self.companion_batches);
        println!("   ├─ Status events: {}", self.status_events);
        println!("   ├─ Samples/s: {:.1}", self.throughput());
        println!("   └─ Requirements met: {}", self.requirements_met);

        println!("\n{}", self.ingestion.summary());

        if !self.devices.is_empty() {
            println!("⌚ Devices ({})", self.devices.len());
            for (i, device) in self.devices.iter().enumerate() {
                let is_last = i == self.devices.len() - 1;
                let prefix = if is_last { "└─" } else { "├─" };
                let stats = &device.stats;
                println!(
                    "   {} {} [{}] {} ({}): forwarded={}, discarded={}, decode_errors={} ({:.1}%), flushes={}",
                    prefix,
                    device.slot,
                    device.kind,
                    device.device_name,
                    device.device_id,
                    stats.samples_forwarded,
                    stats.batches_discarded,
                    stats.decode_errors,
                    stats.decode_error_rate() * 100.0,
                    stats.flushes,
                );
            }
        }

        println!();
    }
}
