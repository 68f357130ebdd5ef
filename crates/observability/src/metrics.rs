//! Hub 指标收集模块
//!
//! 记录采集会话、设备绑定与持久化的运行指标。没有安装 recorder 时
//! 所有调用都是空操作，测试中可以直接调用。

use contracts::{DeviceKind, Slot};
use metrics::{counter, gauge, histogram};

/// 记录一批已解码并转发的样本
pub fn record_batch_ingested(slot: Slot, forwarded: usize, decode_errors: usize) {
    counter!("wearable_hub_batches_total", "slot" => slot.as_str()).increment(1);
    counter!("wearable_hub_samples_forwarded_total", "slot" => slot.as_str())
        .increment(forwarded as u64);
    histogram!("wearable_hub_batch_size", "slot" => slot.as_str()).record(forwarded as f64);

    if decode_errors > 0 {
        counter!("wearable_hub_decode_errors_total", "slot" => slot.as_str())
            .increment(decode_errors as u64);
    }
}

/// 记录采集会话未激活时被丢弃的批次
pub fn record_batch_discarded(slot: Slot) {
    counter!("wearable_hub_batches_discarded_total", "slot" => slot.as_str()).increment(1);
}

/// 记录持久化缓冲区刷写
pub fn record_persistence_flush(kind: DeviceKind, rows: usize, accepted: bool) {
    let status = if accepted { "accepted" } else { "dropped" };
    counter!(
        "wearable_hub_persistence_flushes_total",
        "device_kind" => kind.as_str(),
        "status" => status
    )
    .increment(1);
    histogram!("wearable_hub_persistence_flush_rows", "device_kind" => kind.as_str())
        .record(rows as f64);
}

/// 记录连接失败 (含轮询重连中的单次失败)
pub fn record_connect_failure(kind: DeviceKind, reason: &str) {
    counter!(
        "wearable_hub_connect_failures_total",
        "device_kind" => kind.as_str(),
        "reason" => reason.to_string()
    )
    .increment(1);
}

/// 记录重连轮询结束
pub fn record_reconnect_finished(slot: Slot, attempts: u32, connected: bool) {
    let outcome = if connected { "connected" } else { "exhausted" };
    counter!(
        "wearable_hub_reconnects_total",
        "slot" => slot.as_str(),
        "outcome" => outcome
    )
    .increment(1);
    histogram!("wearable_hub_reconnect_attempts").record(attempts as f64);
}

/// 记录上下文同步结果
pub fn record_context_push(command: &str, accepted: bool) {
    let status = if accepted { "accepted" } else { "failed" };
    counter!(
        "wearable_hub_context_pushes_total",
        "command" => command.to_string(),
        "status" => status
    )
    .increment(1);
}

/// 记录当前已绑定槽位数
pub fn record_bound_slots(count: usize) {
    gauge!("wearable_hub_bound_slots").set(count as f64);
}

/// 采集指标聚合器
///
/// 在内存中聚合指标，便于会话结束时输出摘要。
#[derive(Debug, Clone, Default)]
pub struct IngestionAggregator {
    /// 收到的批次数
    pub total_batches: u64,

    /// 转发的样本数
    pub total_samples: u64,

    /// 各槽位样本数
    pub samples_per_slot: [u64; Slot::COUNT],

    /// 批次大小统计
    pub batch_stats: RunningStats,

    /// 相邻样本时间间隔统计 (毫秒)
    pub interval_stats: RunningStats,

    last_timestamp: [Option<f64>; Slot::COUNT],
}

impl IngestionAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// 用一批样本的时间戳更新统计
    pub fn update(&mut self, slot: Slot, timestamps: impl IntoIterator<Item = f64>) {
        let mut count = 0u64;
        for ts in timestamps {
            if let Some(prev) = self.last_timestamp[slot.index()] {
                self.interval_stats.push((ts - prev) * 1000.0);
            }
            self.last_timestamp[slot.index()] = Some(ts);
            count += 1;
        }

        self.total_batches += 1;
        self.total_samples += count;
        self.samples_per_slot[slot.index()] += count;
        self.batch_stats.push(count as f64);
    }

    /// 生成摘要报告
    pub fn summary(&self) -> IngestionSummary {
        IngestionSummary {
            total_batches: self.total_batches,
            total_samples: self.total_samples,
            samples_per_slot: Slot::ALL
                .iter()
                .filter(|slot| self.samples_per_slot[slot.index()] > 0)
                .map(|slot| (*slot, self.samples_per_slot[slot.index()]))
                .collect(),
            batch_size: StatsSummary::from(&self.batch_stats),
            sample_interval_ms: StatsSummary::from(&self.interval_stats),
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// 采集摘要
#[derive(Debug, Clone, Default)]
pub struct IngestionSummary {
    pub total_batches: u64,
    pub total_samples: u64,
    pub samples_per_slot: Vec<(Slot, u64)>,
    pub batch_size: StatsSummary,
    pub sample_interval_ms: StatsSummary,
}

impl std::fmt::Display for IngestionSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Ingestion Summary ===")?;
        writeln!(f, "Batches: {}", self.total_batches)?;
        writeln!(f, "Samples: {}", self.total_samples)?;
        writeln!(f, "Batch size: {}", self.batch_size)?;
        writeln!(f, "Sample interval (ms): {}", self.sample_interval_ms)?;

        if !self.samples_per_slot.is_empty() {
            writeln!(f, "Samples per slot:")?;
            for (slot, count) in &self.samples_per_slot {
                writeln!(f, "  {slot}: {count}")?;
            }
        }

        Ok(())
    }
}

/// 统计摘要
#[derive(Debug, Clone, Default)]
pub struct StatsSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
}

impl From<&RunningStats> for StatsSummary {
    fn from(stats: &RunningStats) -> Self {
        Self {
            count: stats.count,
            min: stats.min,
            max: stats.max,
            mean: stats.mean(),
        }
    }
}

impl std::fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.count == 0 {
            write!(f, "N/A")
        } else {
            write!(
                f,
                "min={:.3}, max={:.3}, mean={:.3} (n={})",
                self.min, self.max, self.mean, self.count
            )
        }
    }
}

/// 在线均值/极值统计
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    pub fn push(&mut self, value: f64) {
        self.count += 1;

        if self.count == 1 {
            self.min = value;
            self.max = value;
            self.mean = value;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);
            self.mean += (value - self.mean) / self.count as f64;
        }
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 { 0.0 } else { self.mean }
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }
}
