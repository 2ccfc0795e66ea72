//! 网关连接抽象与注册表

use crate::error::ProtocolError;
use async_trait::async_trait;
use dashmap::DashMap;
use domain::{NetworkType, RawMessage};
use std::sync::Arc;
use tracing::info;

/// 连接状态。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    /// 尚未启动
    Idle,
    Connected,
    /// 连接丢失，正在重连
    Reconnecting,
    /// 终态：已关闭
    Closed,
}

/// 连接状态快照。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionStatus {
    pub state: LinkState,
    pub message: String,
}

impl ConnectionStatus {
    pub fn new(state: LinkState, message: impl Into<String>) -> Self {
        Self {
            state,
            message: message.into(),
        }
    }
}

/// 网关连接：一条物理/逻辑连接的控制器端点。
#[async_trait]
pub trait GatewayConnection: Send + Sync {
    fn gateway_id(&self) -> u32;

    fn network_type(&self) -> NetworkType;

    /// 写出一条出站消息
    async fn write(&self, message: &RawMessage) -> Result<(), ProtocolError>;

    fn status(&self) -> ConnectionStatus;

    /// 停止读循环与重连，释放连接
    async fn close(&self);
}

/// 网关注册表：网关 ID → 连接，以及按网关的发现中标志。
#[derive(Default)]
pub struct GatewayRegistry {
    connections: DashMap<u32, Arc<dyn GatewayConnection>>,
    discovering: DashMap<u32, bool>,
}

impl GatewayRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, connection: Arc<dyn GatewayConnection>) {
        let gateway_id = connection.gateway_id();
        self.connections.insert(gateway_id, connection);
        info!(target: "hc.gateway", gateway_id, "gateway_registered");
    }

    pub fn get(&self, gateway_id: u32) -> Option<Arc<dyn GatewayConnection>> {
        self.connections
            .get(&gateway_id)
            .map(|entry| entry.value().clone())
    }

    pub fn ids(&self) -> Vec<u32> {
        let mut ids: Vec<u32> = self.connections.iter().map(|entry| *entry.key()).collect();
        ids.sort_unstable();
        ids
    }

    /// 注销并关闭网关
    pub async fn remove(&self, gateway_id: u32) -> bool {
        self.discovering.remove(&gateway_id);
        match self.connections.remove(&gateway_id) {
            Some((_, connection)) => {
                connection.close().await;
                info!(target: "hc.gateway", gateway_id, "gateway_removed");
                true
            }
            None => false,
        }
    }

    /// 关闭全部网关
    pub async fn close_all(&self) {
        for gateway_id in self.ids() {
            self.remove(gateway_id).await;
        }
    }

    pub fn set_discovering(&self, gateway_id: u32, running: bool) {
        self.discovering.insert(gateway_id, running);
    }

    pub fn is_discovering(&self, gateway_id: u32) -> bool {
        self.discovering
            .get(&gateway_id)
            .map(|entry| *entry.value())
            .unwrap_or(false)
    }
}
