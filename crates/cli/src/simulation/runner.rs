//! Simulation orchestrator
//!
//! Wires a [`DeviceHub`] to a [`MockSession`], binds a watch on the first
//! requested slot and simulated devices on the rest, then runs one
//! collection session.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use contracts::{CollectionRequest, HubConfig, Slot};
use devices::{ChannelFusionConsumer, FusionEvent, SimulatedConfig};
use hub::{DeviceHub, HubHandle};
use observability::IngestionAggregator;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{info, warn};
use transport::MockSession;

use super::companion::CompanionEmulator;
use super::stats::SessionStats;
use crate::error::CliError;

/// Simulation configuration
#[derive(Debug, Clone)]
pub struct SimulationConfig {
    pub hub: HubConfig,
    /// Non-empty, duplicate-free; the first slot gets the watch
    pub slots: Vec<Slot>,
    pub duration: Duration,
    pub batch_size: usize,
    pub frequency_hz: f64,
    pub request: CollectionRequest,
}

pub struct Simulation {
    config: SimulationConfig,
}

impl Simulation {
    pub fn new(config: SimulationConfig) -> Self {
        Self { config }
    }

    /// Run one session, stopping early when `shutdown` resolves
    pub async fn run<F>(self, shutdown: F) -> Result<SessionStats>
    where
        F: Future<Output = ()>,
    {
        let config = self.config;
        let Some((&watch_slot, others)) = config.slots.split_first() else {
            return Err(CliError::invalid_slots("at least one slot is required").into());
        };

        let session = Arc::new(MockSession::new());
        let (fusion, mut events) = ChannelFusionConsumer::new();
        let (hub, handle) = DeviceHub::builder(config.hub.clone(), session)
            .fusion(Arc::new(fusion))
            .build()
            .context("Failed to build device hub")?;
        let hub_task = hub.spawn();

        // 1. Bind through reconnection polling
        let factory = handle.factory().clone();
        handle
            .bind_with_reconnect(factory.watch("watch-0", watch_slot), watch_slot)
            .await?;
        let simulated = SimulatedConfig {
            frequency_hz: config.frequency_hz,
            batch_size: config.batch_size,
            refuse_connects: 0,
        };
        for (i, &slot) in others.iter().enumerate() {
            let device = factory.simulated(format!("sim-{i}"), slot, simulated.clone());
            handle.bind_with_reconnect(device, slot).await?;
        }

        let poll_budget = config.hub.reconnect.interval() * config.hub.reconnect.max_attempts
            + Duration::from_secs(1);
        wait_for_pollers(&handle, &config.slots, poll_budget).await?;

        let bound = handle.bound_mask().await?;
        if bound.is_empty() {
            let _ = handle.shutdown().await;
            let _ = hub_task.await;
            return Err(CliError::simulation("no device could be connected").into());
        }
        for slot in config.slots.iter().filter(|s| !bound.contains(**s)) {
            warn!(slot = %slot, "slot left unbound");
        }

        let requirements_met = handle.check_requirements().await?;
        if !requirements_met {
            warn!("slot requirements not satisfied, collecting anyway");
        }

        // 2. Collect
        for slot in bound.iter() {
            handle.set_enable_imu(slot, true).await?;
        }
        let started = handle.start_collection(config.request.clone()).await?;
        info!(slots = ?started, duration_secs = config.duration.as_secs(), "session running");

        let emulator = if bound.contains(watch_slot) {
            Some(CompanionEmulator::spawn(
                factory.adapter(),
                watch_slot,
                config.frequency_hz,
                config.batch_size,
            )?)
        } else {
            None
        };

        let mut ingestion = IngestionAggregator::new();
        let mut status_events = 0;
        let collect_start = Instant::now();

        let deadline = tokio::time::sleep(config.duration);
        tokio::pin!(deadline);
        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                _ = &mut deadline => {
                    info!("session duration reached");
                    break;
                }
                _ = &mut shutdown => {
                    info!("shutdown requested, stopping session");
                    break;
                }
                Some(event) = events.recv() => {
                    record_event(&mut ingestion, &mut status_events, event);
                }
            }
        }

        // 3. Stop; batches still in flight are discarded by the drivers
        handle.stop_collection().await?;
        let duration = collect_start.elapsed();
        let companion_batches = emulator.map(CompanionEmulator::stop).unwrap_or(0);
        handle.reset_all_enable_imu().await?;

        let devices = handle.devices().await?;
        handle.shutdown().await?;
        if let Err(e) = hub_task.await {
            warn!(error = %e, "hub task ended abnormally");
        }
        drain_events(&mut events, &mut ingestion, &mut status_events);

        Ok(SessionStats {
            duration,
            companion_batches,
            status_events,
            requirements_met,
            devices,
            ingestion,
        })
    }
}

async fn wait_for_pollers(handle: &HubHandle, slots: &[Slot], budget: Duration) -> Result<()> {
    let deadline = Instant::now() + budget;
    loop {
        let mut pending = 0;
        for &slot in slots {
            if handle.is_reconnecting(slot).await? {
                pending += 1;
            }
        }
        if pending == 0 {
            return Ok(());
        }
        if Instant::now() >= deadline {
            warn!(pending, "reconnection still polling, continuing without");
            return Ok(());
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

fn record_event(ingestion: &mut IngestionAggregator, status_events: &mut u64, event: FusionEvent) {
    match event {
        FusionEvent::Batch { slot, samples } => {
            ingestion.update(slot, samples.iter().map(|s| s.timestamp));
        }
        FusionEvent::Status(_) => *status_events += 1,
    }
}

fn drain_events(
    events: &mut UnboundedReceiver<FusionEvent>,
    ingestion: &mut IngestionAggregator,
    status_events: &mut u64,
) {
    while let Ok(event) = events.try_recv() {
        record_event(ingestion, status_events, event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{LocationKind, ReconnectPolicy};

    fn config(slots: Vec<Slot>) -> SimulationConfig {
        let mut hub = HubConfig::default();
        hub.persistence.enabled = false;
        hub.reconnect = ReconnectPolicy::new(Duration::from_millis(5), 3);
        SimulationConfig {
            hub,
            slots,
            duration: Duration::from_millis(200),
            batch_size: 10,
            frequency_hz: 500.0,
            request: CollectionRequest::new("walking", LocationKind::Indoor),
        }
    }

    #[tokio::test]
    async fn test_simulation_collects_from_every_slot() {
        let stats = Simulation::new(config(vec![Slot::Chest, Slot::LeftFoot]))
            .run(std::future::pending())
            .await
            .unwrap();

        assert_eq!(stats.devices.len(), 2);
        assert!(stats.companion_batches > 0);
        assert!(stats.ingestion.samples_per_slot[Slot::Chest.index()] > 0);
        assert!(stats.ingestion.samples_per_slot[Slot::LeftFoot.index()] > 0);
        assert!(stats.requirements_met);
        for device in &stats.devices {
            assert!(!device.can_receive_data);
            assert_eq!(device.buffered, 0);
        }
    }

    #[tokio::test]
    async fn test_shutdown_signal_stops_early() {
        let mut cfg = config(vec![Slot::RightHand]);
        cfg.duration = Duration::from_secs(30);

        let started = Instant::now();
        let stats = Simulation::new(cfg)
            .run(tokio::time::sleep(Duration::from_millis(100)))
            .await
            .unwrap();

        assert!(started.elapsed() < Duration::from_secs(10));
        assert!(stats.duration < Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_empty_slots_rejected() {
        let err = Simulation::new(config(Vec::new()))
            .run(std::future::pending())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("at least one slot"));
    }
}
