//! 应用运行配置加载。

use domain::UnitSystem;
use std::env;

/// 配置加载错误。
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required env: {0}")]
    Missing(String),
    #[error("invalid value for {0}: {1}")]
    Invalid(String, String),
}

/// 网关传输配置。
#[derive(Debug, Clone, PartialEq)]
pub enum GatewayTransport {
    Serial {
        port: String,
        baud_rate: u32,
    },
    Ethernet {
        host: String,
        port: u16,
    },
    Mqtt {
        host: String,
        port: u16,
        client_id: String,
        username: Option<String>,
        password: Option<String>,
        topics_subscribe: Vec<String>,
        topic_publish: String,
    },
}

/// 网关配置。
#[derive(Debug, Clone)]
pub struct GatewaySettings {
    pub id: u32,
    pub name: String,
    pub transport: GatewayTransport,
}

/// 应用运行配置。
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub gateway: GatewaySettings,
    pub message_pacing_ms: u64,
    pub reconnect_backoff_ms: u64,
    pub shutdown_timeout_seconds: u64,
    pub unit_system: UnitSystem,
    pub node_id_min: u8,
    pub node_id_max: u8,
    pub default_firmware_id: Option<u64>,
    pub firmware_fallback_to_default: bool,
    pub worker_pool_size: usize,
    pub worker_queue_capacity: usize,
    pub alive_check_interval_seconds: u64,
    pub heartbeat_wait_seconds: u64,
    /// 启动后节点发现的等待时间；0 表示不执行
    pub discovery_wait_seconds: u64,
    /// 启动时导入的规则定义（JSON 数组）
    pub rules_file: Option<String>,
}

impl AppConfig {
    /// 从环境变量读取配置。
    pub fn from_env() -> Result<Self, ConfigError> {
        let gateway = read_gateway()?;
        let message_pacing_ms = read_u64_with_default("HC_MESSAGE_PACING_MS", 30)?;
        let reconnect_backoff_ms = read_u64_with_default("HC_RECONNECT_BACKOFF_MS", 5_000)?;
        let shutdown_timeout_seconds = read_u64_with_default("HC_SHUTDOWN_TIMEOUT_SECONDS", 300)?;
        let unit_system = match env::var("HC_UNIT_SYSTEM") {
            Ok(value) => match value.to_ascii_lowercase().as_str() {
                "metric" | "m" => UnitSystem::Metric,
                "imperial" | "i" => UnitSystem::Imperial,
                _ => return Err(ConfigError::Invalid("HC_UNIT_SYSTEM".to_string(), value)),
            },
            Err(_) => UnitSystem::Metric,
        };
        let node_id_min = read_u8_with_default("HC_NODE_ID_MIN", 1)?;
        let node_id_max = read_u8_with_default("HC_NODE_ID_MAX", 254)?;
        if node_id_min == 0 || node_id_min > node_id_max || node_id_max == u8::MAX {
            return Err(ConfigError::Invalid(
                "HC_NODE_ID_MIN/HC_NODE_ID_MAX".to_string(),
                format!("{node_id_min}..={node_id_max}"),
            ));
        }
        let default_firmware_id = read_optional_u64("HC_DEFAULT_FIRMWARE_ID")?;
        let firmware_fallback_to_default =
            read_bool_with_default("HC_FIRMWARE_FALLBACK_TO_DEFAULT", false);
        let worker_pool_size = read_u64_with_default("HC_WORKER_POOL_SIZE", 4)?.max(1) as usize;
        let worker_queue_capacity =
            read_u64_with_default("HC_WORKER_QUEUE_CAPACITY", 256)?.max(1) as usize;
        let alive_check_interval_seconds =
            read_u64_with_default("HC_ALIVE_CHECK_INTERVAL_SECONDS", 1_800)?;
        let heartbeat_wait_seconds = read_u64_with_default("HC_HEARTBEAT_WAIT_SECONDS", 30)?;
        let discovery_wait_seconds = read_u64_with_default("HC_DISCOVERY_WAIT_SECONDS", 30)?;
        let rules_file = read_optional("HC_RULES_FILE");

        Ok(Self {
            gateway,
            message_pacing_ms,
            reconnect_backoff_ms,
            shutdown_timeout_seconds,
            unit_system,
            node_id_min,
            node_id_max,
            default_firmware_id,
            firmware_fallback_to_default,
            worker_pool_size,
            worker_queue_capacity,
            alive_check_interval_seconds,
            heartbeat_wait_seconds,
            discovery_wait_seconds,
            rules_file,
        })
    }
}

fn read_gateway() -> Result<GatewaySettings, ConfigError> {
    let id = read_u64_with_default("HC_GATEWAY_ID", 1)?;
    let id = u32::try_from(id)
        .map_err(|_| ConfigError::Invalid("HC_GATEWAY_ID".to_string(), id.to_string()))?;
    let kind = env::var("HC_GATEWAY_KIND").unwrap_or_else(|_| "serial".to_string());
    let transport = match kind.to_ascii_lowercase().as_str() {
        "serial" => GatewayTransport::Serial {
            port: env::var("HC_SERIAL_PORT")
                .map_err(|_| ConfigError::Missing("HC_SERIAL_PORT".to_string()))?,
            baud_rate: read_u32_with_default("HC_SERIAL_BAUD", 115_200)?,
        },
        "ethernet" => GatewayTransport::Ethernet {
            host: env::var("HC_ETHERNET_HOST")
                .map_err(|_| ConfigError::Missing("HC_ETHERNET_HOST".to_string()))?,
            port: read_u16_with_default("HC_ETHERNET_PORT", 5003)?,
        },
        "mqtt" => GatewayTransport::Mqtt {
            host: env::var("HC_MQTT_HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: read_u16_with_default("HC_MQTT_PORT", 1883)?,
            client_id: env::var("HC_MQTT_CLIENT_ID")
                .unwrap_or_else(|_| format!("hc-controller-{id}")),
            username: read_optional("HC_MQTT_USERNAME"),
            password: read_optional("HC_MQTT_PASSWORD"),
            topics_subscribe: env::var("HC_MQTT_TOPICS_SUBSCRIBE")
                .unwrap_or_else(|_| "mygateway1-out".to_string())
                .split(',')
                .map(|topic| topic.trim().to_string())
                .filter(|topic| !topic.is_empty())
                .collect(),
            topic_publish: env::var("HC_MQTT_TOPIC_PUBLISH")
                .unwrap_or_else(|_| "mygateway1-in".to_string()),
        },
        _ => return Err(ConfigError::Invalid("HC_GATEWAY_KIND".to_string(), kind)),
    };
    let name = env::var("HC_GATEWAY_NAME").unwrap_or_else(|_| format!("gateway-{id}"));
    Ok(GatewaySettings {
        id,
        name,
        transport,
    })
}

fn read_u16_with_default(key: &str, default: u16) -> Result<u16, ConfigError> {
    let value = match env::var(key) {
        Ok(value) => value,
        Err(_) => return Ok(default),
    };
    value
        .parse::<u16>()
        .map_err(|_| ConfigError::Invalid(key.to_string(), value))
}

fn read_u8_with_default(key: &str, default: u8) -> Result<u8, ConfigError> {
    let value = match env::var(key) {
        Ok(value) => value,
        Err(_) => return Ok(default),
    };
    value
        .parse::<u8>()
        .map_err(|_| ConfigError::Invalid(key.to_string(), value))
}

fn read_u32_with_default(key: &str, default: u32) -> Result<u32, ConfigError> {
    let value = match env::var(key) {
        Ok(value) => value,
        Err(_) => return Ok(default),
    };
    value
        .parse::<u32>()
        .map_err(|_| ConfigError::Invalid(key.to_string(), value))
}

fn read_u64_with_default(key: &str, default: u64) -> Result<u64, ConfigError> {
    let value = match env::var(key) {
        Ok(value) => value,
        Err(_) => return Ok(default),
    };
    value
        .parse::<u64>()
        .map_err(|_| ConfigError::Invalid(key.to_string(), value))
}

fn read_optional(key: &str) -> Option<String> {
    match env::var(key) {
        Ok(value) if !value.is_empty() => Some(value),
        _ => None,
    }
}

fn read_optional_u64(key: &str) -> Result<Option<u64>, ConfigError> {
    match env::var(key) {
        Ok(value) if value.is_empty() => Ok(None),
        Ok(value) => value
            .parse::<u64>()
            .map(Some)
            .map_err(|_| ConfigError::Invalid(key.to_string(), value)),
        Err(_) => Ok(None),
    }
}

fn read_bool_with_default(key: &str, default: bool) -> bool {
    match env::var(key) {
        Ok(value) => matches!(value.to_ascii_lowercase().as_str(), "1" | "true" | "on"),
        Err(_) => default,
    }
}
