//! 网关重连状态机
//!
//! 状态：Connected → (连接丢失) → Reconnecting → Connected | Closed。
//! 丢失连接时先将网关标记为 DOWN 并持久化诊断信息，然后按固定间隔重试；
//! 取消令牌触发后立即退出且不再上报 UP，即使同一时刻的连接尝试已成功；
//! 关闭时持久化 DOWN。

use crate::error::ProtocolError;
use crate::gateway::{ConnectionStatus, LinkState};
use async_trait::async_trait;
use domain::GatewayState;
use hc_storage::GatewayStore;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// 默认重连间隔。
pub const DEFAULT_RECONNECT_BACKOFF: Duration = Duration::from_secs(5);

/// 可重连的底层连接。
#[async_trait]
pub trait Connector: Send + Sync {
    /// 建立连接
    async fn connect(&self) -> Result<(), ProtocolError>;

    /// 释放连接（幂等）
    async fn disconnect(&self);
}

/// 重连结果。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconnectOutcome {
    Connected,
    /// 被取消，连接已释放
    Cancelled,
}

/// 单个网关的重连状态机。
pub struct Reconnector {
    gateway_id: u32,
    connector: Arc<dyn Connector>,
    gateways: Arc<dyn GatewayStore>,
    backoff: Duration,
    cancel: CancellationToken,
    status: Mutex<ConnectionStatus>,
}

impl Reconnector {
    pub fn new(
        gateway_id: u32,
        connector: Arc<dyn Connector>,
        gateways: Arc<dyn GatewayStore>,
        backoff: Duration,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            gateway_id,
            connector,
            gateways,
            backoff,
            cancel,
            status: Mutex::new(ConnectionStatus::new(LinkState::Idle, "not started")),
        }
    }

    pub fn status(&self) -> ConnectionStatus {
        self.status
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// 首次建立连接；失败时进入重连循环。
    pub async fn establish(&self) -> ReconnectOutcome {
        if self.cancel.is_cancelled() {
            self.set_status(LinkState::Closed, "closed");
            return ReconnectOutcome::Cancelled;
        }
        match self.attempt().await {
            Some(Ok(())) => self.on_connected().await,
            Some(Err(err)) => self.recover(&err.to_string()).await,
            None => self.release().await,
        }
    }

    /// 连接丢失后的恢复循环。
    pub async fn recover(&self, reason: &str) -> ReconnectOutcome {
        self.set_status(LinkState::Reconnecting, reason);
        self.persist(GatewayState::Down, reason).await;
        warn!(
            target: "hc.gateway",
            gateway_id = self.gateway_id,
            reason,
            "gateway_connection_lost"
        );
        self.connector.disconnect().await;

        loop {
            if self.cancel.is_cancelled() {
                return self.release().await;
            }
            hc_telemetry::record_reconnect_attempt();
            match self.attempt().await {
                Some(Ok(())) => return self.on_connected().await,
                Some(Err(err)) => {
                    warn!(
                        target: "hc.gateway",
                        gateway_id = self.gateway_id,
                        error = %err,
                        backoff_ms = self.backoff.as_millis() as u64,
                        "gateway_reconnect_failed"
                    );
                    self.set_status(LinkState::Reconnecting, err.to_string());
                }
                None => return self.release().await,
            }
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return self.release().await,
                _ = tokio::time::sleep(self.backoff) => {}
            }
        }
    }

    /// 单次连接尝试；取消时返回 None。
    async fn attempt(&self) -> Option<Result<(), ProtocolError>> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => None,
            result = self.connector.connect() => Some(result),
        }
    }

    async fn on_connected(&self) -> ReconnectOutcome {
        // 成功与取消同时发生时以取消为准
        if self.cancel.is_cancelled() {
            return self.release().await;
        }
        self.set_status(LinkState::Connected, "connected");
        self.persist(GatewayState::Up, "connected").await;
        // 上报 UP 期间到达的取消同样以取消为准
        if self.cancel.is_cancelled() {
            return self.release().await;
        }
        info!(target: "hc.gateway", gateway_id = self.gateway_id, "gateway_connected");
        ReconnectOutcome::Connected
    }

    /// 取消后的收尾：释放连接、进入 Closed 并将网关记为 DOWN
    pub(crate) async fn release(&self) -> ReconnectOutcome {
        self.connector.disconnect().await;
        self.set_status(LinkState::Closed, "closed");
        self.persist(GatewayState::Down, "closed").await;
        info!(target: "hc.gateway", gateway_id = self.gateway_id, "gateway_link_closed");
        ReconnectOutcome::Cancelled
    }

    async fn persist(&self, state: GatewayState, message: &str) {
        if let Err(err) = self
            .gateways
            .update_status(self.gateway_id, state, message, domain::now_epoch_ms())
            .await
        {
            error!(
                target: "hc.gateway",
                gateway_id = self.gateway_id,
                error = %err,
                "gateway_status_persist_failed"
            );
        }
    }

    fn set_status(&self, state: LinkState, message: impl Into<String>) {
        *self.status.lock().unwrap_or_else(PoisonError::into_inner) =
            ConnectionStatus::new(state, message);
    }
}
