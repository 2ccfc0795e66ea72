//! 控制器领域模型：原始消息、协议子类型表、设备与规则模型。

pub mod device;
pub mod message;
pub mod payload;
pub mod rule;
pub mod types;

pub use device::{GatewayState, NetworkType, NodeKey, NodeState, ResourceRef, SensorKey, UnitSystem};
pub use message::{
    BROADCAST_NODE_ID, Direction, GATEWAY_NODE_ID, MessageError, MessageKind, MessageType,
    NODE_SENSOR_ID_BROADCAST, RawMessage,
};
pub use payload::{decode_hex, encode_hex_upper, parse_boolean, parse_double};
pub use rule::{
    CompareOperand, DampeningPolicy, DampeningState, Operator, RuleCondition, RuleDefinition,
    RuleOperation,
};
pub use types::{InternalType, MetricType, PayloadType, PresentationType, StreamType, VariableType};

/// 当前 Unix 毫秒时间戳。
pub fn now_epoch_ms() -> i64 {
    let now = std::time::SystemTime::now();
    let duration = now
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default();
    duration.as_millis() as i64
}
