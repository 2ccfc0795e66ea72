//! 以太网网关传输
//!
//! 以 TCP 客户端方式连接网关，读写两端拆分，按行收发文本帧。
//!
//! ```rust,ignore
//! let transport = EthernetTransport::from_json(r#"{ "host": "192.168.1.50", "port": 5003 }"#)?;
//! ```

use crate::codec::{format_line, parse_line};
use crate::error::ProtocolError;
use crate::reconnect::Connector;
use crate::transport::Transport;
use async_trait::async_trait;
use domain::RawMessage;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::Mutex;
use tracing::{debug, info};

/// 以太网网关配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EthernetConfig {
    /// 网关主机地址
    pub host: String,
    /// 网关端口
    #[serde(default = "default_port")]
    pub port: u16,
    /// 连接超时（毫秒）
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_ms: u64,
}

fn default_port() -> u16 {
    5003
}

fn default_connect_timeout() -> u64 {
    5000
}

impl EthernetConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            connect_timeout_ms: default_connect_timeout(),
        }
    }
}

/// 以太网网关传输
pub struct EthernetTransport {
    config: EthernetConfig,
    reader: Mutex<Option<BufReader<OwnedReadHalf>>>,
    writer: Mutex<Option<OwnedWriteHalf>>,
}

impl EthernetTransport {
    pub fn new(config: EthernetConfig) -> Self {
        Self {
            config,
            reader: Mutex::new(None),
            writer: Mutex::new(None),
        }
    }

    /// 从 JSON 配置字符串解析
    pub fn from_json(json: &str) -> Result<Self, ProtocolError> {
        let config: EthernetConfig =
            serde_json::from_str(json).map_err(|e| ProtocolError::ConfigParse(e.to_string()))?;
        Ok(Self::new(config))
    }

    pub fn config(&self) -> &EthernetConfig {
        &self.config
    }

    fn address(&self) -> String {
        format!("{}:{}", self.config.host, self.config.port)
    }
}

#[async_trait]
impl Connector for EthernetTransport {
    async fn connect(&self) -> Result<(), ProtocolError> {
        let addr = self.address();
        let stream = tokio::time::timeout(
            Duration::from_millis(self.config.connect_timeout_ms),
            TcpStream::connect(&addr),
        )
        .await
        .map_err(|_| ProtocolError::Timeout(format!("connect to {addr}")))??;
        let (reader, writer) = stream.into_split();
        *self.reader.lock().await = Some(BufReader::new(reader));
        *self.writer.lock().await = Some(writer);
        info!(target: "hc.gateway", addr = %addr, "ethernet_connected");
        Ok(())
    }

    async fn disconnect(&self) {
        self.reader.lock().await.take();
        if let Some(mut writer) = self.writer.lock().await.take() {
            if let Err(err) = writer.shutdown().await {
                debug!(target: "hc.gateway", error = %err, "ethernet_shutdown_failed");
            }
        }
    }
}

#[async_trait]
impl Transport for EthernetTransport {
    fn describe(&self) -> String {
        format!("ethernet {}", self.address())
    }

    async fn receive(&self, gateway_id: u32) -> Result<Option<RawMessage>, ProtocolError> {
        let mut guard = self.reader.lock().await;
        let reader = guard
            .as_mut()
            .ok_or_else(|| ProtocolError::Connection("not connected".to_string()))?;
        let mut line = String::new();
        if reader.read_line(&mut line).await? == 0 {
            return Err(ProtocolError::Connection("connection closed".to_string()));
        }
        if line.trim().is_empty() {
            return Ok(None);
        }
        parse_line(gateway_id, &line).map(Some)
    }

    async fn send(&self, message: &RawMessage) -> Result<(), ProtocolError> {
        let mut guard = self.writer.lock().await;
        let writer = guard
            .as_mut()
            .ok_or_else(|| ProtocolError::Connection("not connected".to_string()))?;
        let frame = format_line(message);
        writer.write_all(frame.as_bytes()).await?;
        writer.flush().await?;
        debug!(target: "hc.gateway", frame = %frame.trim_end(), "ethernet_frame_sent");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::MessageType;
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;

    #[test]
    fn parse_config_defaults() {
        let transport = EthernetTransport::from_json(r#"{ "host": "192.168.1.50" }"#)
            .expect("config");
        assert_eq!(transport.config().port, 5003);
        assert_eq!(transport.config().connect_timeout_ms, 5000);
        assert!(EthernetTransport::from_json("{}").is_err());
    }

    #[tokio::test]
    async fn exchanges_lines_with_gateway() {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let port = listener.local_addr().expect("addr").port();
        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.expect("accept");
            socket
                .write_all(b"12;1;1;0;0;21.5\n\nbad-frame\n")
                .await
                .expect("write");
            let mut buf = vec![0u8; 64];
            let n = socket.read(&mut buf).await.expect("read");
            String::from_utf8_lossy(&buf[..n]).to_string()
        });

        let transport = EthernetTransport::new(EthernetConfig {
            host: "127.0.0.1".to_string(),
            port,
            connect_timeout_ms: 1000,
        });
        transport.connect().await.expect("connect");

        let message = transport.receive(1).await.expect("receive").expect("message");
        assert_eq!((message.node_id, message.payload.as_str()), (12, "21.5"));
        assert!(transport.receive(1).await.expect("blank").is_none());
        assert!(matches!(
            transport.receive(1).await,
            Err(ProtocolError::FrameParse(_))
        ));

        let reply = RawMessage::outbound(1, 12, 255, MessageType::Internal, 4, "13");
        transport.send(&reply).await.expect("send");
        assert_eq!(server.await.expect("server"), "12;255;3;0;4;13\n");
        transport.disconnect().await;
    }
}
