//! MQTT 网关传输
//!
//! 订阅网关的出口主题（如 `mygateway1-out/#`），出站消息发布到入口前缀。

use crate::codec::{format_topic, parse_topic};
use crate::error::ProtocolError;
use crate::reconnect::Connector;
use crate::transport::Transport;
use async_trait::async_trait;
use domain::RawMessage;
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet, QoS};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// MQTT 网关配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MqttConfig {
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub client_id: String,
    pub username: Option<String>,
    pub password: Option<String>,
    /// 订阅主题列表
    pub topics_subscribe: Vec<String>,
    /// 出站主题前缀
    pub topic_publish: String,
    #[serde(default = "default_keep_alive")]
    pub keep_alive_seconds: u64,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_ms: u64,
}

fn default_port() -> u16 {
    1883
}

fn default_keep_alive() -> u64 {
    30
}

fn default_connect_timeout() -> u64 {
    5000
}

impl MqttConfig {
    /// 无认证配置；用户名/密码按需另行设置
    pub fn new(
        host: impl Into<String>,
        port: u16,
        client_id: impl Into<String>,
        topics_subscribe: Vec<String>,
        topic_publish: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            port,
            client_id: client_id.into(),
            username: None,
            password: None,
            topics_subscribe,
            topic_publish: topic_publish.into(),
            keep_alive_seconds: default_keep_alive(),
            connect_timeout_ms: default_connect_timeout(),
        }
    }
}

/// MQTT 网关传输
pub struct MqttTransport {
    config: MqttConfig,
    client: Mutex<Option<AsyncClient>>,
    eventloop: Mutex<Option<EventLoop>>,
}

impl MqttTransport {
    pub fn new(config: MqttConfig) -> Self {
        Self {
            config,
            client: Mutex::new(None),
            eventloop: Mutex::new(None),
        }
    }

    /// 从 JSON 配置字符串解析
    pub fn from_json(json: &str) -> Result<Self, ProtocolError> {
        let config: MqttConfig =
            serde_json::from_str(json).map_err(|e| ProtocolError::ConfigParse(e.to_string()))?;
        if config.topics_subscribe.is_empty() {
            return Err(ProtocolError::ConfigParse(
                "topics_subscribe must not be empty".to_string(),
            ));
        }
        Ok(Self::new(config))
    }

    pub fn config(&self) -> &MqttConfig {
        &self.config
    }

    fn options(&self) -> MqttOptions {
        let mut options = MqttOptions::new(
            self.config.client_id.clone(),
            self.config.host.clone(),
            self.config.port,
        );
        options.set_keep_alive(Duration::from_secs(self.config.keep_alive_seconds));
        if let (Some(username), Some(password)) =
            (self.config.username.as_ref(), self.config.password.as_ref())
        {
            options.set_credentials(username, password);
        }
        options
    }
}

/// 轮询事件循环直到收到 CONNACK。
async fn wait_conn_ack(eventloop: &mut EventLoop) -> Result<(), ProtocolError> {
    loop {
        match eventloop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(_))) => return Ok(()),
            Ok(_) => {}
            Err(err) => return Err(ProtocolError::Mqtt(err.to_string())),
        }
    }
}

#[async_trait]
impl Connector for MqttTransport {
    async fn connect(&self) -> Result<(), ProtocolError> {
        let (client, mut eventloop) = AsyncClient::new(self.options(), 10);
        tokio::time::timeout(
            Duration::from_millis(self.config.connect_timeout_ms),
            wait_conn_ack(&mut eventloop),
        )
        .await
        .map_err(|_| ProtocolError::Timeout(format!("mqtt connect to {}", self.config.host)))??;

        for topic in &self.config.topics_subscribe {
            client
                .subscribe(topic.clone(), QoS::AtMostOnce)
                .await
                .map_err(|err| ProtocolError::Mqtt(err.to_string()))?;
        }
        *self.client.lock().await = Some(client);
        *self.eventloop.lock().await = Some(eventloop);
        info!(
            target: "hc.gateway",
            host = %self.config.host,
            port = self.config.port,
            topics = ?self.config.topics_subscribe,
            "mqtt_connected"
        );
        Ok(())
    }

    async fn disconnect(&self) {
        if let Some(client) = self.client.lock().await.take() {
            if let Err(err) = client.try_disconnect() {
                debug!(target: "hc.gateway", error = %err, "mqtt_disconnect_failed");
            }
        }
        self.eventloop.lock().await.take();
    }
}

#[async_trait]
impl Transport for MqttTransport {
    fn describe(&self) -> String {
        format!("mqtt {}:{}", self.config.host, self.config.port)
    }

    async fn receive(&self, gateway_id: u32) -> Result<Option<RawMessage>, ProtocolError> {
        let mut guard = self.eventloop.lock().await;
        let eventloop = guard
            .as_mut()
            .ok_or_else(|| ProtocolError::Connection("not connected".to_string()))?;
        match eventloop.poll().await {
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                parse_topic(gateway_id, &publish.topic, &publish.payload).map(Some)
            }
            Ok(_) => Ok(None),
            Err(err) => Err(ProtocolError::Mqtt(err.to_string())),
        }
    }

    async fn send(&self, message: &RawMessage) -> Result<(), ProtocolError> {
        let client = self
            .client
            .lock()
            .await
            .clone()
            .ok_or_else(|| ProtocolError::Connection("not connected".to_string()))?;
        let topic = format_topic(&self.config.topic_publish, message);
        client
            .publish(topic.clone(), QoS::AtMostOnce, false, message.payload.clone().into_bytes())
            .await
            .map_err(|err| ProtocolError::Mqtt(err.to_string()))?;
        debug!(target: "hc.gateway", topic = %topic, payload = %message.payload, "mqtt_published");
        Ok(())
    }
}
