//! 网关内存存储

use crate::error::StorageError;
use crate::models::GatewayRecord;
use crate::traits::GatewayStore;
use domain::GatewayState;
use std::collections::HashMap;
use std::sync::RwLock;

/// 网关内存存储
///
/// 使用 RwLock + HashMap 提供线程安全的内存存储。
pub struct InMemoryGatewayStore {
    gateways: RwLock<HashMap<u32, GatewayRecord>>,
}

impl InMemoryGatewayStore {
    pub fn new() -> Self {
        Self {
            gateways: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryGatewayStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl GatewayStore for InMemoryGatewayStore {
    async fn get_gateway(&self, id: u32) -> Result<Option<GatewayRecord>, StorageError> {
        let gateways = self
            .gateways
            .read()
            .map_err(|_| StorageError::new("lock failed"))?;
        Ok(gateways.get(&id).cloned())
    }

    async fn save_gateway(&self, record: GatewayRecord) -> Result<(), StorageError> {
        let mut gateways = self
            .gateways
            .write()
            .map_err(|_| StorageError::new("lock failed"))?;
        gateways.insert(record.id, record);
        Ok(())
    }

    async fn update_status(
        &self,
        id: u32,
        state: GatewayState,
        message: &str,
        timestamp_ms: i64,
    ) -> Result<(), StorageError> {
        let mut gateways = self
            .gateways
            .write()
            .map_err(|_| StorageError::new("lock failed"))?;
        let record = gateways
            .get_mut(&id)
            .ok_or_else(|| StorageError::new(format!("gateway {id} not found")))?;
        record.state = state;
        record.status_message = message.to_string();
        record.status_since_ms = timestamp_ms;
        Ok(())
    }
}
