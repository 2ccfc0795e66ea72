//! 节点存活检查与节点发现
//!
//! 存活检查按周期向全部已知节点发送心跳请求，等待宽限期后把最近
//! 上报时间早于检查间隔的节点标记为 DOWN。间隔下限一分钟。
//!
//! 节点发现向网关广播 I_DISCOVER，在等待期内打开该网关的发现标记，
//! 解码器据此记录 discover 响应。

use domain::{
    BROADCAST_NODE_ID, GATEWAY_NODE_ID, InternalType, MessageType, NODE_SENSOR_ID_BROADCAST,
    NodeState, RawMessage, ResourceRef, now_epoch_ms,
};
use hc_ingest::RawMessageQueue;
use hc_protocol::GatewayRegistry;
use hc_rules::{ValueChangedEvent, ValueChangedListener};
use hc_storage::{DeviceRegistry, NodeRecord, NodeUpdate, StorageError};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub const MIN_ALIVE_CHECK_INTERVAL: Duration = Duration::from_secs(60);

/// 存活检查参数。
#[derive(Debug, Clone)]
pub struct AliveCheckConfig {
    pub interval: Duration,
    /// 发出心跳请求后的等待时间
    pub heartbeat_wait: Duration,
}

impl Default for AliveCheckConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(15 * 60),
            heartbeat_wait: Duration::from_secs(30),
        }
    }
}

impl AliveCheckConfig {
    fn sanitized(mut self) -> Self {
        self.interval = self.interval.max(MIN_ALIVE_CHECK_INTERVAL);
        self.heartbeat_wait = self.heartbeat_wait.min(self.interval);
        self
    }
}

/// 节点存活监视。
pub struct NodeAliveMonitor {
    registry: Arc<dyn DeviceRegistry>,
    gateways: Arc<GatewayRegistry>,
    queue: Arc<RawMessageQueue>,
    listener: Arc<dyn ValueChangedListener>,
    config: AliveCheckConfig,
}

impl NodeAliveMonitor {
    pub fn new(
        registry: Arc<dyn DeviceRegistry>,
        gateways: Arc<GatewayRegistry>,
        queue: Arc<RawMessageQueue>,
        listener: Arc<dyn ValueChangedListener>,
        config: AliveCheckConfig,
    ) -> Self {
        Self {
            registry,
            gateways,
            queue,
            listener,
            config: config.sanitized(),
        }
    }

    pub fn config(&self) -> &AliveCheckConfig {
        &self.config
    }

    /// 向各网关下的节点发送心跳请求，返回请求数。
    pub async fn request_heartbeats(&self) -> Result<usize, StorageError> {
        let mut sent = 0;
        for gateway_id in self.gateways.ids() {
            for node in self.registry.list_nodes(gateway_id).await? {
                if node.key.node_id == GATEWAY_NODE_ID || node.key.node_id == BROADCAST_NODE_ID {
                    continue;
                }
                self.queue.put(RawMessage::outbound(
                    gateway_id,
                    node.key.node_id,
                    NODE_SENSOR_ID_BROADCAST,
                    MessageType::Internal,
                    InternalType::Heartbeat.code(),
                    "",
                ));
                sent += 1;
            }
        }
        debug!(target: "hc.alive", sent, "heartbeat_requests_sent");
        Ok(sent)
    }

    /// 把超时未上报的 UP 节点标记为 DOWN，返回被标记的节点。
    pub async fn mark_stale(&self, now_ms: i64) -> Result<Vec<NodeRecord>, StorageError> {
        let threshold = now_ms - self.config.interval.as_millis() as i64;
        let mut marked = Vec::new();
        for gateway_id in self.gateways.ids() {
            for node in self.registry.list_nodes(gateway_id).await? {
                if node.state != NodeState::Up {
                    continue;
                }
                if node.last_seen_ms.is_some_and(|seen| seen >= threshold) {
                    continue;
                }
                let update = NodeUpdate {
                    state: Some(NodeState::Down),
                    ..NodeUpdate::default()
                };
                let record = self.registry.upsert_node(node.key, update).await?;
                warn!(
                    target: "hc.alive",
                    gateway_id,
                    node_id = record.key.node_id,
                    last_seen_ms = ?record.last_seen_ms,
                    "node_marked_down"
                );
                self.listener
                    .on_value_changed(ValueChangedEvent::new(
                        ResourceRef::NodeState { id: record.id },
                        now_ms,
                    ))
                    .await;
                marked.push(record);
            }
        }
        Ok(marked)
    }

    /// 周期执行，直到取消。
    pub async fn run(&self, cancel: CancellationToken) {
        info!(
            target: "hc.alive",
            interval_ms = self.config.interval.as_millis() as u64,
            "alive_check_started"
        );
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(self.config.interval) => {}
            }
            if let Err(err) = self.request_heartbeats().await {
                warn!(target: "hc.alive", error = %err, "heartbeat_request_failed");
                continue;
            }
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(self.config.heartbeat_wait) => {}
            }
            if let Err(err) = self.mark_stale(now_epoch_ms()).await {
                warn!(target: "hc.alive", error = %err, "alive_check_failed");
            }
        }
        debug!(target: "hc.alive", "alive_check_stopped");
    }

    /// 在网关上执行一次节点发现；等待期内发现标记保持打开，取消时提前结束。
    pub async fn discover(&self, gateway_id: u32, wait: Duration, cancel: &CancellationToken) {
        self.gateways.set_discovering(gateway_id, true);
        info!(target: "hc.alive", gateway_id, "node_discovery_started");
        self.queue.put(RawMessage::outbound(
            gateway_id,
            BROADCAST_NODE_ID,
            NODE_SENSOR_ID_BROADCAST,
            MessageType::Internal,
            InternalType::Discover.code(),
            "0",
        ));
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {}
            _ = tokio::time::sleep(wait) => {}
        }
        self.gateways.set_discovering(gateway_id, false);
        info!(target: "hc.alive", gateway_id, "node_discovery_finished");
    }
}
