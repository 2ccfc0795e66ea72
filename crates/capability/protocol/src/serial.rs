//! 串口网关传输
//!
//! 串口读写为阻塞调用，放到 `spawn_blocking` 中执行；读超时较短，
//! 以便读循环能及时响应取消。

use crate::codec::{format_line, parse_line};
use crate::error::ProtocolError;
use crate::reconnect::Connector;
use crate::transport::Transport;
use async_trait::async_trait;
use domain::RawMessage;
use serde::{Deserialize, Serialize};
use serialport::SerialPort;
use std::io::{ErrorKind, Read, Write};
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info};

type Port = Box<dyn SerialPort>;

/// 串口网关配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SerialConfig {
    /// 设备路径，如 `/dev/ttyUSB0`
    pub port: String,
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,
    /// 单次读超时（毫秒）
    #[serde(default = "default_read_timeout")]
    pub read_timeout_ms: u64,
}

fn default_baud_rate() -> u32 {
    115_200
}

fn default_read_timeout() -> u64 {
    100
}

impl SerialConfig {
    pub fn new(port: impl Into<String>, baud_rate: u32) -> Self {
        Self {
            port: port.into(),
            baud_rate,
            read_timeout_ms: default_read_timeout(),
        }
    }
}

/// 串口网关传输
pub struct SerialTransport {
    config: SerialConfig,
    reader: Mutex<Option<Port>>,
    writer: Mutex<Option<Port>>,
    /// 尚未凑成整行的字节
    pending: Mutex<Vec<u8>>,
}

impl SerialTransport {
    pub fn new(config: SerialConfig) -> Self {
        Self {
            config,
            reader: Mutex::new(None),
            writer: Mutex::new(None),
            pending: Mutex::new(Vec::new()),
        }
    }

    /// 从 JSON 配置字符串解析
    pub fn from_json(json: &str) -> Result<Self, ProtocolError> {
        let config: SerialConfig =
            serde_json::from_str(json).map_err(|e| ProtocolError::ConfigParse(e.to_string()))?;
        Ok(Self::new(config))
    }

    pub fn config(&self) -> &SerialConfig {
        &self.config
    }
}

/// 从缓冲区取出一整行（不含换行）。
fn take_line(pending: &mut Vec<u8>) -> Option<String> {
    let end = pending.iter().position(|byte| *byte == b'\n')?;
    let line: Vec<u8> = pending.drain(..=end).collect();
    Some(String::from_utf8_lossy(&line).trim_end().to_string())
}

#[async_trait]
impl Connector for SerialTransport {
    async fn connect(&self) -> Result<(), ProtocolError> {
        let path = self.config.port.clone();
        let baud_rate = self.config.baud_rate;
        let timeout = Duration::from_millis(self.config.read_timeout_ms);
        let (reader, writer) = tokio::task::spawn_blocking(move || {
            let reader = serialport::new(path, baud_rate).timeout(timeout).open()?;
            let writer = reader.try_clone()?;
            Ok::<_, serialport::Error>((reader, writer))
        })
        .await
        .map_err(|err| ProtocolError::Connection(err.to_string()))??;
        *self.reader.lock().await = Some(reader);
        *self.writer.lock().await = Some(writer);
        self.pending.lock().await.clear();
        info!(target: "hc.gateway", port = %self.config.port, baud_rate, "serial_connected");
        Ok(())
    }

    async fn disconnect(&self) {
        self.reader.lock().await.take();
        self.writer.lock().await.take();
    }
}

#[async_trait]
impl Transport for SerialTransport {
    fn describe(&self) -> String {
        format!("serial {}@{}", self.config.port, self.config.baud_rate)
    }

    async fn receive(&self, gateway_id: u32) -> Result<Option<RawMessage>, ProtocolError> {
        let mut pending = self.pending.lock().await;
        if let Some(line) = take_line(&mut pending) {
            return parse_frame(gateway_id, &line);
        }

        let mut guard = self.reader.lock().await;
        let mut port = guard
            .take()
            .ok_or_else(|| ProtocolError::Connection("not connected".to_string()))?;
        let (port, read) = tokio::task::spawn_blocking(move || {
            let mut buf = [0u8; 256];
            let read = port.read(&mut buf).map(|n| buf[..n].to_vec());
            (port, read)
        })
        .await
        .map_err(|err| ProtocolError::Connection(err.to_string()))?;
        *guard = Some(port);

        match read {
            Ok(bytes) if bytes.is_empty() => {
                Err(ProtocolError::Connection("serial port closed".to_string()))
            }
            Ok(bytes) => {
                pending.extend_from_slice(&bytes);
                match take_line(&mut pending) {
                    Some(line) => parse_frame(gateway_id, &line),
                    None => Ok(None),
                }
            }
            Err(err) if err.kind() == ErrorKind::TimedOut => Ok(None),
            Err(err) => Err(ProtocolError::Io(err)),
        }
    }

    async fn send(&self, message: &RawMessage) -> Result<(), ProtocolError> {
        let mut guard = self.writer.lock().await;
        let mut port = guard
            .take()
            .ok_or_else(|| ProtocolError::Connection("not connected".to_string()))?;
        let frame = format_line(message);
        let bytes = frame.clone().into_bytes();
        let (port, written) = tokio::task::spawn_blocking(move || {
            let written = port.write_all(&bytes).and_then(|_| port.flush());
            (port, written)
        })
        .await
        .map_err(|err| ProtocolError::Connection(err.to_string()))?;
        *guard = Some(port);
        written?;
        debug!(target: "hc.gateway", frame = %frame.trim_end(), "serial_frame_sent");
        Ok(())
    }
}

fn parse_frame(gateway_id: u32, line: &str) -> Result<Option<RawMessage>, ProtocolError> {
    if line.is_empty() {
        return Ok(None);
    }
    parse_line(gateway_id, line).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_buffered_lines() {
        let mut pending = b"1;2;1;0;0;3".to_vec();
        assert_eq!(take_line(&mut pending), None);
        pending.extend_from_slice(b"\r\n4;5;1;0;2;1\n6;");
        assert_eq!(take_line(&mut pending).as_deref(), Some("1;2;1;0;0;3"));
        assert_eq!(take_line(&mut pending).as_deref(), Some("4;5;1;0;2;1"));
        assert_eq!(take_line(&mut pending), None);
        assert_eq!(pending, b"6;");
    }

    #[test]
    fn parse_config_defaults() {
        let transport =
            SerialTransport::from_json(r#"{ "port": "/dev/ttyUSB0" }"#).expect("config");
        assert_eq!(transport.config().baud_rate, 115_200);
        assert_eq!(transport.config().read_timeout_ms, 100);
        assert_eq!(transport.describe(), "serial /dev/ttyUSB0@115200");
    }

    #[tokio::test]
    async fn receive_without_connection_fails() {
        let transport = SerialTransport::new(SerialConfig {
            port: "/dev/null-gateway".to_string(),
            baud_rate: 9600,
            read_timeout_ms: 100,
        });
        assert!(matches!(
            transport.receive(1).await,
            Err(ProtocolError::Connection(_))
        ));
    }
}
