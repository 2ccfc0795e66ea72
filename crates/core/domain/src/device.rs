use serde::{Deserialize, Serialize};

/// 节点键：网络 ID 在网关内唯一。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeKey {
    pub gateway_id: u32,
    pub node_id: u8,
}

impl NodeKey {
    pub fn new(gateway_id: u32, node_id: u8) -> Self {
        Self {
            gateway_id,
            node_id,
        }
    }
}

/// 传感器键：(节点, 传感器 ID)。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SensorKey {
    pub node: NodeKey,
    pub sensor_id: u8,
}

impl SensorKey {
    pub fn new(gateway_id: u32, node_id: u8, sensor_id: u8) -> Self {
        Self {
            node: NodeKey::new(gateway_id, node_id),
            sensor_id,
        }
    }
}

/// 节点可达状态。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum NodeState {
    Up,
    #[default]
    Down,
}

impl NodeState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Up => "UP",
            Self::Down => "DOWN",
        }
    }
}

/// 网关连接状态。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum GatewayState {
    Up,
    #[default]
    Down,
}

impl GatewayState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Up => "UP",
            Self::Down => "DOWN",
        }
    }
}

/// 网关承载的网络协议。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NetworkType {
    MySensors,
}

/// 单位制（节点 config 请求的回复）。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitSystem {
    #[default]
    Metric,
    Imperial,
}

impl UnitSystem {
    pub fn code(self) -> &'static str {
        match self {
            Self::Metric => "M",
            Self::Imperial => "I",
        }
    }
}

/// 规则可引用的资源。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResourceRef {
    /// SensorValue 记录 ID。
    SensorVariable { id: u64 },
    /// 节点记录 ID（电量）。
    NodeBattery { id: u64 },
    /// 节点记录 ID（UP/DOWN）。
    NodeState { id: u64 },
    GatewayState { id: u32 },
    #[serde(other)]
    Unsupported,
}
