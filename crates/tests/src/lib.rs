//! # Integration Tests
//!
//! 集成测试与端到端测试。
//!
//! 负责：
//! - 合约快照测试
//! - 模拟 e2e 测试（MockSession，无需真实手表）
//! - 配置文件驱动的 hub 与采集摘要

#[cfg(test)]
mod contract_tests {
    use contracts::{CompanionMessage, Slot, SlotMask};

    #[test]
    fn test_contracts_compile() {
        // 验证 contracts crate 可编译
        let _ = contracts::ConfigVersion::V1;
    }

    #[test]
    fn test_slot_bit_layout_is_stable() {
        let bits: Vec<u8> = Slot::ALL
            .iter()
            .map(|s| SlotMask::from_iter([*s]).bits())
            .collect();
        assert_eq!(bits, vec![0b00001, 0b00010, 0b00100, 0b01000, 0b10000]);
    }

    #[test]
    fn test_imu_batch_payload_shape() {
        let payload = CompanionMessage::imu_batch_payload(&[]);
        assert_eq!(payload.get("type"), Some(&serde_json::json!("imu_batch")));
        assert_eq!(payload.get("samples"), Some(&serde_json::json!([])));
    }
}

#[cfg(test)]
mod e2e_tests {
    use std::sync::Arc;
    use std::time::Duration;

    use contracts::{
        CollectionRequest, CompanionMessage, HubConfig, KeyValueMap, LocationKind,
        ReconnectPolicy, SensorSample, Slot, SlotRequirements, Vector3,
    };
    use devices::{
        exhausted_notice, ChannelFusionConsumer, FusionEvent, RecordingNotifier, SimulatedConfig,
        SimulatedDevice, WatchDriver,
    };
    use config_loader::{ConfigFormat, ConfigLoader};
    use hub::{DeviceHub, HubError, HubHandle};
    use observability::IngestionAggregator;
    use persistence::CSV_HEADER;
    use serde_json::{json, Value};
    use tokio::sync::mpsc::UnboundedReceiver;
    use tokio::task::JoinHandle;
    use transport::MockSession;

    struct Harness {
        handle: HubHandle,
        session: Arc<MockSession>,
        notifier: Arc<RecordingNotifier>,
        events: UnboundedReceiver<FusionEvent>,
        task: JoinHandle<()>,
    }

    fn config() -> HubConfig {
        let mut config = HubConfig::default();
        config.persistence.enabled = false;
        config.reconnect = ReconnectPolicy::new(Duration::from_millis(2), 3);
        config
    }

    fn start(config: HubConfig) -> Harness {
        let session = Arc::new(MockSession::new());
        let notifier = Arc::new(RecordingNotifier::new());
        let (fusion, events) = ChannelFusionConsumer::new();
        let (hub, handle) = DeviceHub::builder(config, session.clone())
            .fusion(Arc::new(fusion))
            .notifier(notifier.clone())
            .build()
            .unwrap();

        Harness {
            handle,
            session,
            notifier,
            events,
            task: hub.spawn(),
        }
    }

    fn sample(ts: f64) -> SensorSample {
        SensorSample {
            timestamp: ts,
            acc: Vector3::new(ts, -ts, 9.81),
            gyro: Vector3::new(0.1, 0.2, 0.3),
            mag: None,
        }
    }

    /// Batch of valid samples followed by one entry with a non-numeric field
    fn batch_with_malformed(timestamps: &[f64]) -> KeyValueMap {
        let samples: Vec<_> = timestamps.iter().map(|t| sample(*t)).collect();
        let mut payload = CompanionMessage::imu_batch_payload(&samples);
        if let Some(Value::Array(entries)) = payload.get_mut("samples") {
            entries.push(json!({
                "timestamp": "not-a-number",
                "acc_x": 0.0, "acc_y": 0.0, "acc_z": 0.0,
                "gyro_x": 0.0, "gyro_y": 0.0, "gyro_z": 0.0
            }));
        }
        payload
    }

    fn connected_watch(h: &Harness, id: &str, slot: Slot) -> WatchDriver {
        let mut watch = h.handle.factory().watch(id, slot);
        assert!(devices::Device::connect(&mut watch));
        watch
    }

    fn drain(events: &mut UnboundedReceiver<FusionEvent>) -> Vec<FusionEvent> {
        let mut out = Vec::new();
        while let Ok(event) = events.try_recv() {
            out.push(event);
        }
        out
    }

    async fn wait_until_idle(handle: &HubHandle, slot: Slot) {
        for _ in 0..500 {
            if !handle.is_reconnecting(slot).await.unwrap() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("poller for {slot} never finished");
    }

    /// Chest watch: start, stream one batch with a malformed entry, stop
    ///
    /// 验证完整的数据流：
    /// 1. 上下文推送 start（enable_imu = true）
    /// 2. 合法样本转发到 fusion，非法条目被计数
    /// 3. 上下文推送 stop（enable_imu = false）
    #[tokio::test]
    async fn test_e2e_chest_watch_session() {
        let mut h = start(config());
        let watch = connected_watch(&h, "watch-1", Slot::Chest);
        assert_eq!(h.handle.bind(watch, Slot::Chest).await.unwrap(), None);
        assert!(h.handle.set_enable_imu(Slot::Chest, true).await.unwrap());

        let request = CollectionRequest::new("running", LocationKind::Outdoor);
        let started = h.handle.start_collection(request).await.unwrap();
        assert!(started.contains(Slot::Chest));

        h.handle
            .factory()
            .adapter()
            .on_inbound(batch_with_malformed(&[1.0, 1.01]));

        let summary = h.handle.device(Slot::Chest).await.unwrap().unwrap();
        assert_eq!(summary.stats.samples_forwarded, 2);
        assert_eq!(summary.stats.decode_errors, 1);

        match drain(&mut h.events).as_slice() {
            [FusionEvent::Batch { slot, samples }] => {
                assert_eq!(*slot, Slot::Chest);
                let ts: Vec<f64> = samples.iter().map(|s| s.timestamp).collect();
                assert_eq!(ts, vec![1.0, 1.01]);
            }
            other => panic!("unexpected events {other:?}"),
        }

        let stopped = h.handle.stop_collection().await.unwrap();
        assert!(stopped.contains(Slot::Chest));

        let contexts = h.session.contexts();
        assert_eq!(contexts.len(), 2);
        assert_eq!(contexts[0].get("command"), Some(&json!("start_collection")));
        assert_eq!(contexts[0].get("enable_imu"), Some(&json!(true)));
        assert_eq!(contexts[0].get("activity"), Some(&json!("running")));
        assert_eq!(contexts[0].get("location"), Some(&json!("outdoor")));
        assert_eq!(contexts[1].get("command"), Some(&json!("stop_collection")));
        assert_eq!(contexts[1].get("enable_imu"), Some(&json!(false)));

        let t0 = contexts[0].get("timestamp").and_then(Value::as_f64).unwrap();
        let t1 = contexts[1].get("timestamp").and_then(Value::as_f64).unwrap();
        assert!(t1 > t0);
        assert_eq!(h.session.wake_calls(), 1);

        h.handle.shutdown().await.unwrap();
        h.task.await.unwrap();
    }

    #[tokio::test]
    async fn test_e2e_late_batch_after_stop_is_discarded() {
        let mut h = start(config());
        let watch = connected_watch(&h, "watch-1", Slot::Chest);
        h.handle.bind(watch, Slot::Chest).await.unwrap();
        h.handle
            .start_collection(CollectionRequest::new("walking", LocationKind::Indoor))
            .await
            .unwrap();
        h.handle.stop_collection().await.unwrap();

        h.handle
            .factory()
            .adapter()
            .on_inbound(CompanionMessage::imu_batch_payload(&[sample(5.0)]));

        let summary = h.handle.device(Slot::Chest).await.unwrap().unwrap();
        assert_eq!(summary.stats.batches_discarded, 1);
        assert_eq!(summary.stats.samples_forwarded, 0);
        assert!(drain(&mut h.events).is_empty());
    }

    #[tokio::test]
    async fn test_e2e_overwrite_returns_displaced_device() {
        let h = start(config());
        let first = h.handle.factory().simulated("d1", Slot::LeftHand, SimulatedConfig::default());
        let second = h.handle.factory().simulated("d2", Slot::LeftHand, SimulatedConfig::default());

        assert_eq!(h.handle.bind(first, Slot::LeftHand).await.unwrap(), None);
        assert_eq!(
            h.handle.bind(second, Slot::LeftHand).await.unwrap(),
            Some("d1".to_string())
        );

        let devices = h.handle.devices().await.unwrap();
        assert_eq!(devices.len(), 1);
        assert_eq!(devices[0].device_id, "d2");
        assert_eq!(h.handle.bound_mask().await.unwrap().bits(), 0b00001);
    }

    #[tokio::test]
    async fn test_e2e_inbound_follows_delegate_owner() {
        let mut h = start(config());
        let watch = connected_watch(&h, "watch-1", Slot::Chest);
        h.handle.bind(watch, Slot::Chest).await.unwrap();

        // non-companion device over the owner's slot releases the channel
        let sim = h.handle.factory().simulated("sim", Slot::Chest, SimulatedConfig::default());
        h.handle.bind(sim, Slot::Chest).await.unwrap();
        assert_eq!(h.handle.factory().adapter().delegate().current(), None);

        h.handle
            .factory()
            .adapter()
            .on_inbound(CompanionMessage::imu_batch_payload(&[sample(1.0)]));
        let summary = h.handle.device(Slot::Chest).await.unwrap().unwrap();
        assert_eq!(summary.stats.batches_received + summary.stats.batches_discarded, 0);
        assert!(drain(&mut h.events).is_empty());
    }

    #[tokio::test]
    async fn test_e2e_threshold_flush_writes_csv() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = config();
        cfg.persistence.enabled = true;
        cfg.persistence.flush_threshold = 2;
        cfg.persistence.output_dir = dir.path().to_path_buf();

        let h = start(cfg);
        let watch = connected_watch(&h, "watch-1", Slot::Chest);
        h.handle.bind(watch, Slot::Chest).await.unwrap();
        h.handle
            .start_collection(CollectionRequest::new("walking", LocationKind::Indoor))
            .await
            .unwrap();

        h.handle
            .factory()
            .adapter()
            .on_inbound(CompanionMessage::imu_batch_payload(&[
                sample(1.0),
                sample(2.0),
                sample(3.0),
            ]));

        let summary = h.handle.device(Slot::Chest).await.unwrap().unwrap();
        assert_eq!(summary.stats.flushes, 1);
        assert_eq!(summary.buffered, 1);

        // stop flushes the remainder, shutdown drains the store queue
        h.handle.stop_collection().await.unwrap();
        h.handle.shutdown().await.unwrap();
        h.task.await.unwrap();

        let content = std::fs::read_to_string(dir.path().join("watch.csv")).unwrap();
        let lines: Vec<_> = content.lines().collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0], CSV_HEADER);
        assert!(lines[1].starts_with("1,1,-1,9.81,0.1,0.2,0.3"));
        assert!(lines[3].starts_with("3,"));
        assert!(lines[3].ends_with(",,,"));
    }

    #[tokio::test]
    async fn test_e2e_simulated_devices_stream_into_fusion() {
        let mut h = start(config());
        let sim_cfg = SimulatedConfig {
            frequency_hz: 1000.0,
            batch_size: 10,
            refuse_connects: 0,
        };
        for (id, slot) in [("left", Slot::LeftFoot), ("right", Slot::RightFoot)] {
            let device = h.handle.factory().simulated(id, slot, sim_cfg.clone());
            h.handle.bind_with_reconnect(device, slot).await.unwrap();
            wait_until_idle(&h.handle, slot).await;
        }

        let started = h
            .handle
            .start_collection(CollectionRequest::new("cycling", LocationKind::Outdoor))
            .await
            .unwrap();
        assert_eq!(started.len(), 2);

        tokio::time::sleep(Duration::from_millis(100)).await;
        h.handle.stop_collection().await.unwrap();

        let mut per_slot = [0usize; Slot::COUNT];
        for event in drain(&mut h.events) {
            if let FusionEvent::Batch { slot, samples } = event {
                per_slot[slot.index()] += samples.len();
            }
        }
        assert!(per_slot[Slot::LeftFoot.index()] > 0);
        assert!(per_slot[Slot::RightFoot.index()] > 0);
        assert_eq!(per_slot[Slot::Chest.index()], 0);
    }

    #[tokio::test]
    async fn test_e2e_reconnect_exhaustion_notifies_once() {
        let h = start(config());
        let dead = h.handle.factory().simulated(
            "dead",
            Slot::RightHand,
            SimulatedConfig {
                refuse_connects: u32::MAX,
                ..Default::default()
            },
        );
        h.handle.bind_with_reconnect(dead, Slot::RightHand).await.unwrap();
        wait_until_idle(&h.handle, Slot::RightHand).await;

        assert!(!h.handle.is_bound(Slot::RightHand).await.unwrap());
        assert_eq!(
            h.notifier.messages(),
            vec![exhausted_notice(SimulatedDevice::DEVICE_NAME, 3)]
        );
    }

    #[tokio::test]
    async fn test_e2e_requirements_and_exclusivity() {
        let mut cfg = config();
        cfg.requirements = Some(SlotRequirements {
            slots: vec![Slot::Chest],
            allowed_devices: vec!["Apple Watch".into()],
        });
        let h = start(cfg);
        assert!(!h.handle.check_requirements().await.unwrap());

        let watch = connected_watch(&h, "watch-1", Slot::Chest);
        h.handle.bind(watch, Slot::Chest).await.unwrap();
        assert!(h.handle.check_requirements().await.unwrap());

        let second = connected_watch(&h, "watch-2", Slot::LeftHand);
        let err = h.handle.bind(second, Slot::LeftHand).await.unwrap_err();
        assert!(matches!(err, HubError::ExclusiveDeviceBound { slot: Slot::Chest, .. }));
        assert!(!h.handle.is_bound(Slot::LeftHand).await.unwrap());
    }

    #[tokio::test]
    async fn test_e2e_shutdown_closes_handle() {
        let h = start(config());
        let watch = connected_watch(&h, "watch-1", Slot::Chest);
        h.handle.bind(watch, Slot::Chest).await.unwrap();
        h.handle
            .start_collection(CollectionRequest::new("walking", LocationKind::Indoor))
            .await
            .unwrap();

        h.handle.shutdown().await.unwrap();
        h.task.await.unwrap();

        // shutdown stopped the open session before tearing down
        let contexts = h.session.contexts();
        assert_eq!(contexts.last().and_then(|c| c.get("command")), Some(&json!("stop_collection")));
        assert!(matches!(h.handle.bound_mask().await, Err(HubError::Closed)));
    }

    #[tokio::test]
    async fn test_e2e_hub_from_toml_config() {
        const HUB_TOML: &str = r#"
[persistence]
enabled = false

[reconnect]
interval_ms = 2
max_attempts = 2

[requirements]
slots = ["chest"]
allowed_devices = ["Apple Watch"]
"#;
        let cfg = ConfigLoader::load_from_str(HUB_TOML, ConfigFormat::Toml).unwrap();
        let h = start(cfg);
        assert!(!h.handle.check_requirements().await.unwrap());

        let watch = connected_watch(&h, "watch-1", Slot::Chest);
        h.handle.bind(watch, Slot::Chest).await.unwrap();
        assert!(h.handle.check_requirements().await.unwrap());

        // reconnect policy comes from the file
        let dead = h.handle.factory().simulated(
            "dead",
            Slot::LeftFoot,
            SimulatedConfig {
                refuse_connects: u32::MAX,
                ..Default::default()
            },
        );
        h.handle.bind_with_reconnect(dead, Slot::LeftFoot).await.unwrap();
        wait_until_idle(&h.handle, Slot::LeftFoot).await;
        assert_eq!(
            h.notifier.messages(),
            vec![exhausted_notice(SimulatedDevice::DEVICE_NAME, 2)]
        );
    }

    /// 会话结束时由 fusion 事件生成采集摘要
    #[tokio::test]
    async fn test_e2e_ingestion_summary_from_fusion_events() {
        let mut h = start(config());
        let watch = connected_watch(&h, "watch-1", Slot::Chest);
        h.handle.bind(watch, Slot::Chest).await.unwrap();
        h.handle
            .start_collection(CollectionRequest::new("walking", LocationKind::Indoor))
            .await
            .unwrap();

        let adapter = h.handle.factory().adapter();
        adapter.on_inbound(CompanionMessage::imu_batch_payload(&[
            sample(1.0),
            sample(1.01),
            sample(1.02),
        ]));
        adapter.on_inbound(CompanionMessage::imu_batch_payload(&[sample(1.03)]));
        h.handle.stop_collection().await.unwrap();

        let mut aggregator = IngestionAggregator::new();
        for event in drain(&mut h.events) {
            if let FusionEvent::Batch { slot, samples } = event {
                aggregator.update(slot, samples.iter().map(|s| s.timestamp));
            }
        }

        let summary = aggregator.summary();
        assert_eq!(summary.total_batches, 2);
        assert_eq!(summary.total_samples, 4);
        assert_eq!(summary.samples_per_slot, vec![(Slot::Chest, 4)]);
        assert_eq!(summary.sample_interval_ms.count, 3);
    }

    #[tokio::test]
    async fn test_e2e_exclusive_watch_not_bound_twice_through_reconnect() {
        let mut cfg = config();
        cfg.reconnect = ReconnectPolicy::new(Duration::from_millis(5), 200);
        let h = start(cfg);
        h.session.set_app_installed(false);

        let first = h.handle.factory().watch("watch-1", Slot::Chest);
        h.handle.bind_with_reconnect(first, Slot::Chest).await.unwrap();
        let second = h.handle.factory().watch("watch-2", Slot::LeftHand);
        let err = h
            .handle
            .bind_with_reconnect(second, Slot::LeftHand)
            .await
            .unwrap_err();
        assert!(matches!(err, HubError::ExclusiveDeviceBound { slot: Slot::Chest, .. }));

        h.session.set_app_installed(true);
        wait_until_idle(&h.handle, Slot::Chest).await;

        let watches = h
            .handle
            .devices()
            .await
            .unwrap()
            .into_iter()
            .filter(|d| d.device_name == WatchDriver::DEVICE_NAME)
            .count();
        assert_eq!(watches, 1);
        assert!(h.handle.has_exclusive_device_bound(WatchDriver::DEVICE_NAME).await.unwrap());
    }
}
