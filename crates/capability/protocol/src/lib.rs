//! # 网关通信能力模块
//!
//! 提供控制器与传感器网络网关之间的连接：
//! - **串口**：`serialport` 读写文本帧
//! - **以太网**：TCP 客户端读写文本帧
//! - **MQTT**：`rumqttc` 订阅网关出口主题、发布入口主题
//!
//! ## 架构
//!
//! ```text
//! Transport (serial / ethernet / mqtt)
//!       │  receive()
//!       ▼
//! TransportGateway 读循环 ──(连接丢失)──▶ Reconnector
//!       │  put()
//!       ▼
//! RawMessageQueue ──▶ MessageMonitor (pipeline)
//! ```
//!
//! 出站消息由解码器通过 [`GatewayRegistry`] 找到所属网关后调用
//! [`GatewayConnection::write`] 写出。

mod codec;
mod error;
mod ethernet;
mod gateway;
mod mqtt;
mod reconnect;
mod serial;
mod transport;

pub use codec::{format_line, format_topic, parse_line, parse_topic};
pub use error::ProtocolError;
pub use ethernet::{EthernetConfig, EthernetTransport};
pub use gateway::{ConnectionStatus, GatewayConnection, GatewayRegistry, LinkState};
pub use mqtt::{MqttConfig, MqttTransport};
pub use reconnect::{Connector, DEFAULT_RECONNECT_BACKOFF, ReconnectOutcome, Reconnector};
pub use serial::{SerialConfig, SerialTransport};
pub use transport::{Transport, TransportGateway};
