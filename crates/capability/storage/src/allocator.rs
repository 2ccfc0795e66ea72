use crate::error::AllocationError;
use crate::models::NodeUpdate;
use crate::traits::{DeviceRegistry, NodeIdAllocator};
use async_trait::async_trait;
use domain::NodeKey;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::Mutex;

/// 基于注册表的节点 ID 分配器。
///
/// 取区间内最小的未占用 ID，并立即登记节点记录占位。
pub struct RegistryNodeIdAllocator {
    registry: Arc<dyn DeviceRegistry>,
    min: u8,
    max: u8,
    guard: Mutex<()>,
}

impl RegistryNodeIdAllocator {
    pub fn new(registry: Arc<dyn DeviceRegistry>, min: u8, max: u8) -> Self {
        Self {
            registry,
            min,
            max,
            guard: Mutex::new(()),
        }
    }
}

#[async_trait]
impl NodeIdAllocator for RegistryNodeIdAllocator {
    async fn next_node_id(&self, gateway_id: u32) -> Result<u8, AllocationError> {
        let _guard = self.guard.lock().await;
        let used: HashSet<u8> = self
            .registry
            .list_nodes(gateway_id)
            .await?
            .into_iter()
            .map(|node| node.key.node_id)
            .collect();
        let node_id = (self.min..=self.max)
            .find(|candidate| !used.contains(candidate))
            .ok_or(AllocationError::Exhausted { gateway_id })?;
        self.registry
            .upsert_node(NodeKey::new(gateway_id, node_id), NodeUpdate::default())
            .await?;
        Ok(node_id)
    }
}
