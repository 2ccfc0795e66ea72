//! MySensors 协议解码
//!
//! 按消息类别分派：
//! - Presentation：节点/传感器自动注册
//! - Set：当前值 + 时序样本；入站消息另行提交载荷转发与规则评估
//! - Request：回复已存储的当前值，没有值时不回复
//! - Internal：电量、时间、ID 分配、配置、草图信息、心跳、发现
//! - Stream：固件传输
//!
//! 出站消息先写出到网关，再做与入站相同的记录（仅 Set 有记录可做）。
//! 请求类子类型只对入站消息回复，避免回环。

use crate::error::PipelineError;
use crate::firmware::FirmwareTransferEngine;
use crate::forward::ForwardPayloadService;
use crate::worker::WorkerPool;
use async_trait::async_trait;
use domain::{
    InternalType, MessageKind, MessageType, MetricType, NetworkType, NodeKey, PresentationType,
    RawMessage, ResourceRef, SensorKey, StreamType, UnitSystem, VariableType, parse_boolean,
    parse_double,
};
use hc_ingest::RawMessageQueue;
use hc_protocol::{GatewayConnection, GatewayRegistry};
use hc_rules::{ValueChangedEvent, ValueChangedListener};
use hc_storage::{
    BatterySample, BinarySample, DeviceRegistry, DoubleSample, MetricsStore, NodeIdAllocator,
    NodeUpdate, SensorUpdate,
};
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// 按网络协议类型分派的解码器。
#[async_trait]
pub trait MessageDecoder: Send + Sync {
    fn network_type(&self) -> NetworkType;

    async fn decode(
        &self,
        gateway: &dyn GatewayConnection,
        message: RawMessage,
    ) -> Result<(), PipelineError>;
}

/// 解码器的协作者。
#[derive(Clone)]
pub struct DecoderParts {
    pub registry: Arc<dyn DeviceRegistry>,
    pub metrics: Arc<dyn MetricsStore>,
    pub queue: Arc<RawMessageQueue>,
    pub gateways: Arc<GatewayRegistry>,
    pub allocator: Arc<dyn NodeIdAllocator>,
    pub firmware: Arc<FirmwareTransferEngine>,
    pub forwards: Arc<ForwardPayloadService>,
    pub rules: Arc<dyn ValueChangedListener>,
    pub workers: WorkerPool,
    pub unit_system: UnitSystem,
}

/// Set 消息的时序样本。
enum Sample {
    Double(f64),
    Binary(bool),
    Dropped,
}

/// MySensors 解码器。
pub struct MySensorsDecoder {
    parts: DecoderParts,
}

impl MySensorsDecoder {
    pub fn new(parts: DecoderParts) -> Self {
        Self { parts }
    }

    async fn on_presentation(
        &self,
        message: &RawMessage,
        presentation: PresentationType,
    ) -> Result<(), PipelineError> {
        let now = message.timestamp_ms;
        let node = NodeKey::new(message.gateway_id, message.node_id);
        if message.is_node_broadcast() {
            let update = NodeUpdate {
                node_type: Some(presentation),
                library_version: non_empty(&message.payload),
                ..NodeUpdate::seen(now)
            };
            let record = self.parts.registry.upsert_node(node, update).await?;
            info!(
                target: "hc.decoder",
                gateway_id = node.gateway_id,
                node_id = node.node_id,
                node_type = presentation.name(),
                node_record_id = record.id,
                "node_presented"
            );
            return Ok(());
        }
        self.parts
            .registry
            .upsert_node(node, NodeUpdate::seen(now))
            .await?;
        let update = SensorUpdate {
            sensor_type: Some(presentation),
            name: non_empty(&message.payload),
            last_seen_ms: Some(now),
            ..SensorUpdate::default()
        };
        let record = self
            .parts
            .registry
            .upsert_sensor(sensor_key(message), update)
            .await?;
        info!(
            target: "hc.decoder",
            node_id = message.node_id,
            sensor_id = message.sensor_id,
            sensor_type = presentation.name(),
            sensor_record_id = record.id,
            "sensor_presented"
        );
        Ok(())
    }

    async fn on_set(
        &self,
        message: &RawMessage,
        variable: VariableType,
    ) -> Result<(), PipelineError> {
        let now = message.timestamp_ms;
        let key = sensor_key(message);

        if variable == VariableType::UnitPrefix {
            let update = SensorUpdate {
                unit: Some(message.payload.clone()),
                last_seen_ms: Some(now),
                ..SensorUpdate::default()
            };
            self.parts.registry.upsert_sensor(key, update).await?;
            debug!(target: "hc.decoder", node_id = key.node.node_id, sensor_id = key.sensor_id, unit = %message.payload, "sensor_unit_set");
            return Ok(());
        }

        let sample = match variable.metric_type() {
            MetricType::Double => Sample::Double(parse_double(&message.payload)?),
            MetricType::Binary => Sample::Binary(parse_boolean(&message.payload)),
            MetricType::None => Sample::Dropped,
        };

        if !message.is_outbound() {
            self.parts
                .registry
                .upsert_node(key.node, NodeUpdate::seen(now))
                .await?;
        }
        let sensor_update = SensorUpdate {
            last_seen_ms: Some(now),
            ..SensorUpdate::default()
        };
        self.parts.registry.upsert_sensor(key, sensor_update).await?;
        let value = self
            .parts
            .registry
            .upsert_sensor_value(key, variable, &message.payload, now)
            .await?;
        hc_telemetry::record_sensor_value_written();

        match sample {
            Sample::Double(number) => {
                self.parts
                    .metrics
                    .append_double(DoubleSample {
                        sensor_value_id: value.id,
                        timestamp_ms: now,
                        value: number,
                    })
                    .await?;
                hc_telemetry::record_double_sample();
            }
            Sample::Binary(state) => {
                self.parts
                    .metrics
                    .append_binary(BinarySample {
                        sensor_value_id: value.id,
                        timestamp_ms: now,
                        value: state,
                    })
                    .await?;
                hc_telemetry::record_binary_sample();
            }
            Sample::Dropped => {
                hc_telemetry::record_sample_dropped();
                debug!(
                    target: "hc.decoder",
                    variable = variable.name(),
                    "metric_type_unclassified"
                );
            }
        }

        if message.is_outbound() {
            return Ok(());
        }

        let source = value.id;
        let payload = message.payload.clone();
        let forwards = self.parts.forwards.clone();
        self.submit("forward_payload", async move {
            if let Err(err) = forwards.forward(source, &payload).await {
                warn!(target: "hc.worker", source, error = %err, "forward_lookup_failed");
            }
        });
        self.notify_rules(ResourceRef::SensorVariable { id: source }, now);
        Ok(())
    }

    async fn on_request(
        &self,
        message: &RawMessage,
        variable: VariableType,
    ) -> Result<(), PipelineError> {
        let value = self
            .parts
            .registry
            .get_sensor_value(sensor_key(message), variable)
            .await?
            .and_then(|value| value.last_value);
        match value {
            Some(value) => {
                self.parts
                    .queue
                    .put(message.reply(MessageType::Set, variable.code(), value));
            }
            None => info!(
                target: "hc.decoder",
                node_id = message.node_id,
                sensor_id = message.sensor_id,
                variable = variable.name(),
                "requested_value_missing"
            ),
        }
        Ok(())
    }

    async fn on_internal(
        &self,
        message: &RawMessage,
        internal: InternalType,
    ) -> Result<(), PipelineError> {
        let now = message.timestamp_ms;
        let node = NodeKey::new(message.gateway_id, message.node_id);
        match internal {
            InternalType::BatteryLevel => {
                let level = parse_double(&message.payload)?;
                let update = NodeUpdate {
                    battery_level: Some(message.payload.trim().to_string()),
                    ..NodeUpdate::seen(now)
                };
                let record = self.parts.registry.upsert_node(node, update).await?;
                self.parts
                    .metrics
                    .append_battery(BatterySample {
                        node_record_id: record.id,
                        timestamp_ms: now,
                        value: level,
                    })
                    .await?;
                self.notify_rules(ResourceRef::NodeBattery { id: record.id }, now);
            }
            InternalType::Time => {
                self.reply_internal(message, internal, local_time_seconds().to_string());
            }
            InternalType::IdRequest => match self.parts.allocator.next_node_id(node.gateway_id).await {
                Ok(node_id) => {
                    info!(target: "hc.decoder", gateway_id = node.gateway_id, node_id, "node_id_allocated");
                    self.reply_internal(message, InternalType::IdResponse, node_id.to_string());
                }
                Err(err) => warn!(
                    target: "hc.decoder",
                    gateway_id = node.gateway_id,
                    error = %err,
                    "node_id_allocation_failed"
                ),
            },
            InternalType::Config => {
                self.parts
                    .registry
                    .upsert_node(node, NodeUpdate::seen(now))
                    .await?;
                self.reply_internal(message, internal, self.parts.unit_system.code());
            }
            InternalType::SketchName => {
                let update = NodeUpdate {
                    name: non_empty(&message.payload),
                    ..NodeUpdate::seen(now)
                };
                self.parts.registry.upsert_node(node, update).await?;
            }
            InternalType::SketchVersion => {
                let update = NodeUpdate {
                    sketch_version: non_empty(&message.payload),
                    ..NodeUpdate::seen(now)
                };
                self.parts.registry.upsert_node(node, update).await?;
            }
            InternalType::Heartbeat | InternalType::HeartbeatResponse => {
                let update = NodeUpdate {
                    last_heartbeat_ms: Some(now),
                    ..NodeUpdate::seen(now)
                };
                self.parts.registry.upsert_node(node, update).await?;
            }
            InternalType::DiscoverResponse => {
                self.parts
                    .registry
                    .upsert_node(node, NodeUpdate::seen(now))
                    .await?;
                if self.parts.gateways.is_discovering(node.gateway_id) {
                    info!(target: "hc.decoder", gateway_id = node.gateway_id, node_id = node.node_id, parent = %message.payload, "node_discovered");
                }
            }
            InternalType::LogMessage => {
                debug!(target: "hc.decoder", node_id = node.node_id, log = %message.payload, "node_log_message");
            }
            InternalType::GatewayReady => {
                info!(target: "hc.decoder", gateway_id = node.gateway_id, payload = %message.payload, "gateway_ready");
            }
            other => {
                debug!(target: "hc.decoder", node_id = node.node_id, internal = other.name(), payload = %message.payload, "internal_message_ignored");
            }
        }
        Ok(())
    }

    async fn on_stream(
        &self,
        message: &RawMessage,
        stream: StreamType,
    ) -> Result<(), PipelineError> {
        let reply = match stream {
            StreamType::FirmwareConfigRequest => {
                self.parts.firmware.handle_config_request(message).await?
            }
            StreamType::FirmwareRequest => self.parts.firmware.handle_block_request(message).await?,
            other => {
                debug!(target: "hc.decoder", node_id = message.node_id, stream = other.name(), "stream_message_ignored");
                None
            }
        };
        if let Some(reply) = reply {
            self.parts.queue.put(reply);
        }
        Ok(())
    }

    fn reply_internal(&self, message: &RawMessage, internal: InternalType, payload: impl Into<String>) {
        self.parts
            .queue
            .put(message.reply(MessageType::Internal, internal.code(), payload));
    }

    fn notify_rules(&self, resource: ResourceRef, now: i64) {
        let rules = self.parts.rules.clone();
        let event = ValueChangedEvent::new(resource, now);
        self.submit("rule_evaluation", async move {
            rules.on_value_changed(event).await;
        });
    }

    /// 提交副作用任务；背压或关闭时只记录，不影响解码结果。
    fn submit<F>(&self, name: &'static str, job: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if let Err(err) = self.parts.workers.submit(name, job) {
            warn!(target: "hc.decoder", job = name, error = %err, "side_effect_rejected");
        }
    }
}

#[async_trait]
impl MessageDecoder for MySensorsDecoder {
    fn network_type(&self) -> NetworkType {
        NetworkType::MySensors
    }

    async fn decode(
        &self,
        gateway: &dyn GatewayConnection,
        message: RawMessage,
    ) -> Result<(), PipelineError> {
        let kind = message.kind()?;
        if message.ack {
            info!(
                target: "hc.decoder",
                node_id = message.node_id,
                sensor_id = message.sensor_id,
                kind = ?kind,
                "ack_message"
            );
        }

        if message.is_outbound() {
            gateway.write(&message).await?;
            hc_telemetry::record_outbound_message();
            return match kind {
                MessageKind::Set(variable) => self.on_set(&message, variable).await,
                other => {
                    debug!(
                        target: "hc.decoder",
                        node_id = message.node_id,
                        sensor_id = message.sensor_id,
                        kind = ?other,
                        payload = %message.payload,
                        "outbound_message_sent"
                    );
                    Ok(())
                }
            };
        }

        match kind {
            MessageKind::Presentation(presentation) => {
                self.on_presentation(&message, presentation).await
            }
            MessageKind::Set(variable) => self.on_set(&message, variable).await,
            MessageKind::Request(variable) => self.on_request(&message, variable).await,
            MessageKind::Internal(internal) => self.on_internal(&message, internal).await,
            MessageKind::Stream(stream) => self.on_stream(&message, stream).await,
        }
    }
}

fn sensor_key(message: &RawMessage) -> SensorKey {
    SensorKey::new(message.gateway_id, message.node_id, message.sensor_id)
}

fn non_empty(payload: &str) -> Option<String> {
    let payload = payload.trim();
    (!payload.is_empty()).then(|| payload.to_string())
}

/// 本地时间（秒）：UTC 秒数加上本地时区偏移。
fn local_time_seconds() -> i64 {
    let now = chrono::Local::now();
    now.timestamp() + i64::from(now.offset().local_minus_utc())
}
