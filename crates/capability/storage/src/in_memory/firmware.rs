//! 固件内存存储

use crate::error::StorageError;
use crate::models::FirmwareRecord;
use crate::traits::FirmwareStore;
use std::collections::HashMap;
use std::sync::RwLock;

/// 固件内存存储
pub struct InMemoryFirmwareStore {
    firmwares: RwLock<HashMap<u64, FirmwareRecord>>,
}

impl InMemoryFirmwareStore {
    pub fn new() -> Self {
        Self {
            firmwares: RwLock::new(HashMap::new()),
        }
    }

    /// 登记固件
    pub fn insert(&self, record: FirmwareRecord) -> Result<(), StorageError> {
        let mut firmwares = self
            .firmwares
            .write()
            .map_err(|_| StorageError::new("lock failed"))?;
        firmwares.insert(record.id, record);
        Ok(())
    }
}

impl Default for InMemoryFirmwareStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl FirmwareStore for InMemoryFirmwareStore {
    async fn get_firmware(&self, id: u64) -> Result<Option<FirmwareRecord>, StorageError> {
        let firmwares = self
            .firmwares
            .read()
            .map_err(|_| StorageError::new("lock failed"))?;
        Ok(firmwares.get(&id).cloned())
    }

    async fn find_firmware(
        &self,
        firmware_type: u16,
        version: u16,
    ) -> Result<Option<FirmwareRecord>, StorageError> {
        let firmwares = self
            .firmwares
            .read()
            .map_err(|_| StorageError::new("lock failed"))?;
        Ok(firmwares
            .values()
            .find(|item| item.firmware_type == firmware_type && item.version == version)
            .cloned())
    }
}
