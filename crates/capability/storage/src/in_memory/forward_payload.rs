//! 载荷转发配置内存存储

use crate::error::StorageError;
use crate::models::ForwardPayloadRecord;
use crate::traits::ForwardPayloadStore;
use std::sync::RwLock;

/// 载荷转发配置内存存储
pub struct InMemoryForwardPayloadStore {
    items: RwLock<Vec<ForwardPayloadRecord>>,
}

impl InMemoryForwardPayloadStore {
    pub fn new() -> Self {
        Self {
            items: RwLock::new(Vec::new()),
        }
    }

    pub fn insert(&self, record: ForwardPayloadRecord) -> Result<(), StorageError> {
        let mut items = self
            .items
            .write()
            .map_err(|_| StorageError::new("lock failed"))?;
        items.retain(|item| item.id != record.id);
        items.push(record);
        Ok(())
    }
}

impl Default for InMemoryForwardPayloadStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl ForwardPayloadStore for InMemoryForwardPayloadStore {
    async fn list_forward_payloads(
        &self,
        source_sensor_value_id: u64,
    ) -> Result<Vec<ForwardPayloadRecord>, StorageError> {
        let items = self
            .items
            .read()
            .map_err(|_| StorageError::new("lock failed"))?;
        Ok(items
            .iter()
            .filter(|item| item.enabled && item.source_sensor_value_id == source_sensor_value_id)
            .cloned()
            .collect())
    }
}
