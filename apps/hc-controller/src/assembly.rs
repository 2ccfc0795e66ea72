//! 控制器装配模块
//!
//! 把存储、网关连接、解码器、规则引擎、工作池与监视循环组装成一个
//! 可运行的控制器，并负责按顺序停机：
//! 存活检查（含启动时的节点发现）→ 监视循环 → 网关连接 → 工作池。

use domain::{GatewayState, NetworkType, RuleDefinition, now_epoch_ms};
use hc_config::{AppConfig, GatewayTransport};
use hc_ingest::RawMessageQueue;
use hc_pipeline::{
    AliveCheckConfig, DecoderParts, FirmwareSettings, FirmwareTransferEngine,
    ForwardPayloadService, MessageMonitor, MonitorHandle, MySensorsDecoder, NodeAliveMonitor,
    WorkerPool, WorkerPoolConfig,
};
use hc_protocol::{
    EthernetConfig, EthernetTransport, GatewayConnection, GatewayRegistry, MqttConfig,
    MqttTransport, SerialConfig, SerialTransport, Transport, TransportGateway,
};
use hc_rules::{
    ConditionEvaluator, DefaultOperationExecutor, LogNotificationSender, QueuePayloadSender,
    RuleEngine, StoreResourceValues,
};
use hc_storage::{
    GatewayRecord, GatewayStore, InMemoryDeviceRegistry, InMemoryFirmwareStore,
    InMemoryForwardPayloadStore, InMemoryGatewayStore, InMemoryMetricsStore, InMemoryRuleStore,
    RegistryNodeIdAllocator,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// 运行中的控制器。
pub struct Controller {
    cancel: CancellationToken,
    monitor: MonitorHandle,
    alive: JoinHandle<()>,
    gateways: Arc<GatewayRegistry>,
    workers: WorkerPool,
    shutdown_ceiling: Duration,
}

/// 按配置装配并启动控制器。
pub async fn assemble(config: &AppConfig) -> Result<Controller, BoxError> {
    let registry = Arc::new(InMemoryDeviceRegistry::new());
    let metrics = Arc::new(InMemoryMetricsStore::new());
    let firmware = Arc::new(InMemoryFirmwareStore::new());
    let forwards = Arc::new(InMemoryForwardPayloadStore::new());
    let gateway_store = Arc::new(InMemoryGatewayStore::new());
    let rule_store = Arc::new(InMemoryRuleStore::with_rules(load_rules(config)?));

    let queue = Arc::new(RawMessageQueue::new());
    let gateways = Arc::new(GatewayRegistry::new());
    let workers = WorkerPool::start(WorkerPoolConfig {
        workers: config.worker_pool_size,
        capacity: config.worker_queue_capacity,
    });

    // 规则引擎：动作经队列出站
    let payloads = Arc::new(QueuePayloadSender::new(registry.clone(), queue.clone()));
    let executor = Arc::new(DefaultOperationExecutor::new(
        payloads.clone(),
        Arc::new(LogNotificationSender),
    ));
    let evaluator = ConditionEvaluator::new(Arc::new(StoreResourceValues::new(
        registry.clone(),
        gateway_store.clone(),
    )));
    let rules = Arc::new(RuleEngine::new(rule_store, evaluator, executor));

    let decoder = MySensorsDecoder::new(DecoderParts {
        registry: registry.clone(),
        metrics,
        queue: queue.clone(),
        gateways: gateways.clone(),
        allocator: Arc::new(RegistryNodeIdAllocator::new(
            registry.clone(),
            config.node_id_min,
            config.node_id_max,
        )),
        firmware: Arc::new(FirmwareTransferEngine::new(
            firmware,
            registry.clone(),
            FirmwareSettings {
                default_firmware_id: config.default_firmware_id,
                fallback_to_default: config.firmware_fallback_to_default,
            },
        )),
        forwards: Arc::new(ForwardPayloadService::new(forwards, payloads)),
        rules: rules.clone(),
        workers: workers.clone(),
        unit_system: config.unit_system,
    });

    // 网关：先登记记录，再启动连接
    gateway_store
        .save_gateway(GatewayRecord {
            id: config.gateway.id,
            name: config.gateway.name.clone(),
            network_type: NetworkType::MySensors,
            enabled: true,
            state: GatewayState::Down,
            status_message: "starting".to_string(),
            status_since_ms: now_epoch_ms(),
        })
        .await?;
    let backoff = Duration::from_millis(config.reconnect_backoff_ms);
    let connection =
        start_gateway(config, queue.clone(), gateway_store.clone(), backoff).await;
    gateways.register(connection);

    let cancel = CancellationToken::new();
    let monitor = MessageMonitor::new(
        queue.clone(),
        gateways.clone(),
        Duration::from_millis(config.message_pacing_ms),
    )
    .with_decoder(Arc::new(decoder))
    .start(cancel.child_token());

    let alive_monitor = NodeAliveMonitor::new(
        registry,
        gateways.clone(),
        queue,
        rules,
        AliveCheckConfig {
            interval: Duration::from_secs(config.alive_check_interval_seconds),
            heartbeat_wait: Duration::from_secs(config.heartbeat_wait_seconds),
        },
    );
    let alive_cancel = cancel.child_token();
    let gateway_id = config.gateway.id;
    let discovery_wait = Duration::from_secs(config.discovery_wait_seconds);
    let alive = tokio::spawn(async move {
        if !discovery_wait.is_zero() {
            alive_monitor
                .discover(gateway_id, discovery_wait, &alive_cancel)
                .await;
        }
        alive_monitor.run(alive_cancel).await
    });

    info!(
        target: "hc.controller",
        gateway_id = config.gateway.id,
        gateway = %config.gateway.name,
        "controller_started"
    );
    Ok(Controller {
        cancel,
        monitor,
        alive,
        gateways,
        workers,
        shutdown_ceiling: Duration::from_secs(config.shutdown_timeout_seconds),
    })
}

impl Controller {
    /// 按顺序停机。
    pub async fn shutdown(self) {
        self.cancel.cancel();
        if let Err(err) = self.alive.await {
            warn!(target: "hc.controller", error = %err, "alive_check_join_failed");
        }
        if !self.monitor.shutdown(self.shutdown_ceiling).await {
            warn!(target: "hc.controller", "message_monitor_still_running");
        }
        self.gateways.close_all().await;
        self.workers.shutdown().await;
        let snapshot = hc_telemetry::metrics().snapshot();
        info!(target: "hc.controller", metrics = ?snapshot, "controller_stopped");
    }
}

async fn start_gateway(
    config: &AppConfig,
    queue: Arc<RawMessageQueue>,
    store: Arc<InMemoryGatewayStore>,
    backoff: Duration,
) -> Arc<dyn GatewayConnection> {
    let gateway_id = config.gateway.id;
    match &config.gateway.transport {
        GatewayTransport::Serial { port, baud_rate } => {
            let transport = SerialTransport::new(SerialConfig::new(port.clone(), *baud_rate));
            launch(gateway_id, transport, queue, store, backoff).await
        }
        GatewayTransport::Ethernet { host, port } => {
            let transport = EthernetTransport::new(EthernetConfig::new(host.clone(), *port));
            launch(gateway_id, transport, queue, store, backoff).await
        }
        GatewayTransport::Mqtt {
            host,
            port,
            client_id,
            username,
            password,
            topics_subscribe,
            topic_publish,
        } => {
            let mut mqtt = MqttConfig::new(
                host.clone(),
                *port,
                client_id.clone(),
                topics_subscribe.clone(),
                topic_publish.clone(),
            );
            mqtt.username = username.clone();
            mqtt.password = password.clone();
            launch(gateway_id, MqttTransport::new(mqtt), queue, store, backoff).await
        }
    }
}

async fn launch<T: Transport + 'static>(
    gateway_id: u32,
    transport: T,
    queue: Arc<RawMessageQueue>,
    store: Arc<InMemoryGatewayStore>,
    backoff: Duration,
) -> Arc<dyn GatewayConnection> {
    info!(target: "hc.controller", gateway_id, transport = %transport.describe(), "gateway_starting");
    let gateway = Arc::new(TransportGateway::new(gateway_id, transport, queue, store, backoff));
    gateway.start().await;
    gateway
}

fn load_rules(config: &AppConfig) -> Result<Vec<RuleDefinition>, BoxError> {
    let Some(path) = &config.rules_file else {
        return Ok(Vec::new());
    };
    let json = std::fs::read_to_string(path)?;
    let rules: Vec<RuleDefinition> = serde_json::from_str(&json)?;
    info!(target: "hc.controller", path = %path, count = rules.len(), "rules_loaded");
    Ok(rules)
}
