//! 追踪初始化与进程级计数指标。

use std::sync::OnceLock;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing_subscriber::{EnvFilter, fmt};

/// 计数指标快照。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub raw_messages: u64,
    pub outbound_messages: u64,
    pub dropped_no_gateway: u64,
    pub decode_failures: u64,
    pub transport_failures: u64,
    pub sensor_values_written: u64,
    pub double_samples: u64,
    pub binary_samples: u64,
    pub samples_dropped: u64,
    pub rule_evaluations: u64,
    pub rule_triggers: u64,
    pub backpressure: u64,
    pub firmware_blocks_served: u64,
    pub reconnect_attempts: u64,
}

/// 进程级计数指标。
#[derive(Default)]
pub struct TelemetryMetrics {
    raw_messages: AtomicU64,
    outbound_messages: AtomicU64,
    dropped_no_gateway: AtomicU64,
    decode_failures: AtomicU64,
    transport_failures: AtomicU64,
    sensor_values_written: AtomicU64,
    double_samples: AtomicU64,
    binary_samples: AtomicU64,
    samples_dropped: AtomicU64,
    rule_evaluations: AtomicU64,
    rule_triggers: AtomicU64,
    backpressure: AtomicU64,
    firmware_blocks_served: AtomicU64,
    reconnect_attempts: AtomicU64,
}

impl TelemetryMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            raw_messages: self.raw_messages.load(Ordering::Relaxed),
            outbound_messages: self.outbound_messages.load(Ordering::Relaxed),
            dropped_no_gateway: self.dropped_no_gateway.load(Ordering::Relaxed),
            decode_failures: self.decode_failures.load(Ordering::Relaxed),
            transport_failures: self.transport_failures.load(Ordering::Relaxed),
            sensor_values_written: self.sensor_values_written.load(Ordering::Relaxed),
            double_samples: self.double_samples.load(Ordering::Relaxed),
            binary_samples: self.binary_samples.load(Ordering::Relaxed),
            samples_dropped: self.samples_dropped.load(Ordering::Relaxed),
            rule_evaluations: self.rule_evaluations.load(Ordering::Relaxed),
            rule_triggers: self.rule_triggers.load(Ordering::Relaxed),
            backpressure: self.backpressure.load(Ordering::Relaxed),
            firmware_blocks_served: self.firmware_blocks_served.load(Ordering::Relaxed),
            reconnect_attempts: self.reconnect_attempts.load(Ordering::Relaxed),
        }
    }
}

static METRICS: OnceLock<TelemetryMetrics> = OnceLock::new();

/// 获取全局指标实例。
pub fn metrics() -> &'static TelemetryMetrics {
    METRICS.get_or_init(TelemetryMetrics::new)
}

/// 初始化 tracing（默认 info，可由 RUST_LOG 覆盖）。
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).try_init();
}

/// 生成单条消息处理的 trace_id。
pub fn new_trace_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// 记录入队处理的原始消息次数。
pub fn record_raw_message() {
    metrics().raw_messages.fetch_add(1, Ordering::Relaxed);
}

/// 记录写入网关的出站消息次数。
pub fn record_outbound_message() {
    metrics().outbound_messages.fetch_add(1, Ordering::Relaxed);
}

/// 记录因网关不存在而丢弃的消息次数。
pub fn record_dropped_no_gateway() {
    metrics().dropped_no_gateway.fetch_add(1, Ordering::Relaxed);
}

/// 记录解码失败次数。
pub fn record_decode_failure() {
    metrics().decode_failures.fetch_add(1, Ordering::Relaxed);
}

/// 记录传输失败次数。
pub fn record_transport_failure() {
    metrics().transport_failures.fetch_add(1, Ordering::Relaxed);
}

/// 记录 SensorValue 写入次数。
pub fn record_sensor_value_written() {
    metrics().sensor_values_written.fetch_add(1, Ordering::Relaxed);
}

/// 记录数值样本写入次数。
pub fn record_double_sample() {
    metrics().double_samples.fetch_add(1, Ordering::Relaxed);
}

/// 记录二值样本写入次数。
pub fn record_binary_sample() {
    metrics().binary_samples.fetch_add(1, Ordering::Relaxed);
}

/// 记录未分类样本丢弃次数。
pub fn record_sample_dropped() {
    metrics().samples_dropped.fetch_add(1, Ordering::Relaxed);
}

/// 记录规则评估次数。
pub fn record_rule_evaluation() {
    metrics().rule_evaluations.fetch_add(1, Ordering::Relaxed);
}

/// 记录规则触发次数。
pub fn record_rule_trigger() {
    metrics().rule_triggers.fetch_add(1, Ordering::Relaxed);
}

/// 记录工作池背压次数。
pub fn record_backpressure() {
    metrics().backpressure.fetch_add(1, Ordering::Relaxed);
}

/// 记录固件块下发次数。
pub fn record_firmware_block_served() {
    metrics()
        .firmware_blocks_served
        .fetch_add(1, Ordering::Relaxed);
}

/// 记录网关重连尝试次数。
pub fn record_reconnect_attempt() {
    metrics().reconnect_attempts.fetch_add(1, Ordering::Relaxed);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate() {
        let before = metrics().snapshot();
        record_raw_message();
        record_raw_message();
        record_backpressure();
        let after = metrics().snapshot();
        assert!(after.raw_messages >= before.raw_messages + 2);
        assert!(after.backpressure > before.backpressure);
    }

    #[test]
    fn trace_ids_are_unique() {
        assert_ne!(new_trace_id(), new_trace_id());
    }
}
