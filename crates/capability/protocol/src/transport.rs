//! 传输层抽象与通用网关读循环

use crate::error::ProtocolError;
use crate::gateway::{ConnectionStatus, GatewayConnection};
use crate::reconnect::{Connector, ReconnectOutcome, Reconnector};
use async_trait::async_trait;
use domain::{NetworkType, RawMessage};
use hc_ingest::RawMessageQueue;
use hc_storage::GatewayStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// 一种网关传输（串口、以太网、MQTT）。
///
/// `receive` 与 `send` 会被不同任务并发调用，实现需拆分读写两端。
#[async_trait]
pub trait Transport: Connector {
    fn describe(&self) -> String;

    /// 等待下一条入站消息；`Ok(None)` 表示本轮无完整帧（超时或跳过的坏帧）
    async fn receive(&self, gateway_id: u32) -> Result<Option<RawMessage>, ProtocolError>;

    async fn send(&self, message: &RawMessage) -> Result<(), ProtocolError>;
}

/// 基于 [`Transport`] 的网关连接：读循环 + 重连状态机。
pub struct TransportGateway<T: Transport + 'static> {
    gateway_id: u32,
    transport: Arc<T>,
    queue: Arc<RawMessageQueue>,
    reconnector: Arc<Reconnector>,
    reader: Mutex<Option<JoinHandle<()>>>,
}

impl<T: Transport + 'static> TransportGateway<T> {
    pub fn new(
        gateway_id: u32,
        transport: T,
        queue: Arc<RawMessageQueue>,
        gateways: Arc<dyn GatewayStore>,
        backoff: Duration,
    ) -> Self {
        let transport = Arc::new(transport);
        let connector: Arc<dyn Connector> = transport.clone();
        let reconnector = Arc::new(Reconnector::new(
            gateway_id,
            connector,
            gateways,
            backoff,
            CancellationToken::new(),
        ));
        Self {
            gateway_id,
            transport,
            queue,
            reconnector,
            reader: Mutex::new(None),
        }
    }

    /// 启动读循环（首次连接在后台进行）
    pub async fn start(&self) {
        let mut reader = self.reader.lock().await;
        if reader.is_some() {
            return;
        }
        let gateway_id = self.gateway_id;
        let transport = self.transport.clone();
        let queue = self.queue.clone();
        let reconnector = self.reconnector.clone();
        *reader = Some(tokio::spawn(async move {
            read_loop(gateway_id, transport, queue, reconnector).await;
        }));
    }
}

async fn read_loop<T: Transport>(
    gateway_id: u32,
    transport: Arc<T>,
    queue: Arc<RawMessageQueue>,
    reconnector: Arc<Reconnector>,
) {
    if reconnector.establish().await == ReconnectOutcome::Cancelled {
        return;
    }
    let cancel = reconnector.cancel_token().clone();
    loop {
        let received = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            received = transport.receive(gateway_id) => received,
        };
        match received {
            Ok(Some(message)) => {
                debug!(
                    target: "hc.gateway",
                    gateway_id,
                    node_id = message.node_id,
                    sensor_id = message.sensor_id,
                    "raw_message_received"
                );
                queue.put(message);
            }
            Ok(None) => {}
            Err(ProtocolError::FrameParse(reason)) => {
                warn!(target: "hc.gateway", gateway_id, reason = %reason, "frame_skipped");
            }
            Err(err) => {
                if reconnector.recover(&err.to_string()).await == ReconnectOutcome::Cancelled {
                    return;
                }
            }
        }
    }
    reconnector.release().await;
}

#[async_trait]
impl<T: Transport + 'static> GatewayConnection for TransportGateway<T> {
    fn gateway_id(&self) -> u32 {
        self.gateway_id
    }

    fn network_type(&self) -> NetworkType {
        NetworkType::MySensors
    }

    async fn write(&self, message: &RawMessage) -> Result<(), ProtocolError> {
        if self.reconnector.cancel_token().is_cancelled() {
            return Err(ProtocolError::Closed);
        }
        self.transport.send(message).await
    }

    fn status(&self) -> ConnectionStatus {
        self.reconnector.status()
    }

    async fn close(&self) {
        self.reconnector.cancel_token().cancel();
        let handle = self.reader.lock().await.take();
        if let Some(handle) = handle {
            if let Err(err) = handle.await {
                warn!(target: "hc.gateway", gateway_id = self.gateway_id, error = %err, "gateway_reader_join_failed");
            }
        }
        self.reconnector.release().await;
        debug!(target: "hc.gateway", gateway_id = self.gateway_id, transport = %self.transport.describe(), "gateway_closed");
    }
}
