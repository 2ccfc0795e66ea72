//! 资源取值
//!
//! 规则条件引用的资源统一按字符串取当前值，由评估器负责数值化。
//! 节点/网关状态映射为 `1`（UP）与 `0`（DOWN）。

use crate::error::RuleError;
use async_trait::async_trait;
use domain::{GatewayState, NodeState, ResourceRef};
use hc_storage::{DeviceRegistry, GatewayStore};
use std::sync::Arc;

/// 资源当前值查询。
#[async_trait]
pub trait ResourceValueLookup: Send + Sync {
    /// 资源不存在或尚无值时返回 `Ok(None)`；类型不支持时返回
    /// [`RuleError::ResourceUnavailable`]。
    async fn current_value(&self, resource: &ResourceRef) -> Result<Option<String>, RuleError>;
}

/// 基于存储的资源取值。
pub struct StoreResourceValues {
    registry: Arc<dyn DeviceRegistry>,
    gateways: Arc<dyn GatewayStore>,
}

impl StoreResourceValues {
    pub fn new(registry: Arc<dyn DeviceRegistry>, gateways: Arc<dyn GatewayStore>) -> Self {
        Self { registry, gateways }
    }
}

fn state_flag(up: bool) -> String {
    if up { "1" } else { "0" }.to_string()
}

#[async_trait]
impl ResourceValueLookup for StoreResourceValues {
    async fn current_value(&self, resource: &ResourceRef) -> Result<Option<String>, RuleError> {
        match *resource {
            ResourceRef::SensorVariable { id } => Ok(self
                .registry
                .get_sensor_value_by_id(id)
                .await?
                .and_then(|value| value.last_value)),
            ResourceRef::NodeBattery { id } => Ok(self
                .registry
                .get_node_by_id(id)
                .await?
                .and_then(|node| node.battery_level)),
            ResourceRef::NodeState { id } => Ok(self
                .registry
                .get_node_by_id(id)
                .await?
                .map(|node| state_flag(node.state == NodeState::Up))),
            ResourceRef::GatewayState { id } => Ok(self
                .gateways
                .get_gateway(id)
                .await?
                .map(|gateway| state_flag(gateway.state == GatewayState::Up))),
            ResourceRef::Unsupported => Err(RuleError::ResourceUnavailable(
                "unsupported resource type".to_string(),
            )),
        }
    }
}
