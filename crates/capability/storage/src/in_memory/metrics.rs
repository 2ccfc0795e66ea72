//! 时序样本内存存储

use crate::error::StorageError;
use crate::models::{BatterySample, BinarySample, DoubleSample};
use crate::traits::MetricsStore;
use std::sync::RwLock;

/// 时序样本内存存储（追加写入，按 ID 过滤读取）。
pub struct InMemoryMetricsStore {
    doubles: RwLock<Vec<DoubleSample>>,
    binaries: RwLock<Vec<BinarySample>>,
    batteries: RwLock<Vec<BatterySample>>,
}

impl InMemoryMetricsStore {
    pub fn new() -> Self {
        Self {
            doubles: RwLock::new(Vec::new()),
            binaries: RwLock::new(Vec::new()),
            batteries: RwLock::new(Vec::new()),
        }
    }
}

impl Default for InMemoryMetricsStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl MetricsStore for InMemoryMetricsStore {
    async fn append_double(&self, sample: DoubleSample) -> Result<(), StorageError> {
        let mut doubles = self
            .doubles
            .write()
            .map_err(|_| StorageError::new("lock failed"))?;
        doubles.push(sample);
        Ok(())
    }

    async fn append_binary(&self, sample: BinarySample) -> Result<(), StorageError> {
        let mut binaries = self
            .binaries
            .write()
            .map_err(|_| StorageError::new("lock failed"))?;
        binaries.push(sample);
        Ok(())
    }

    async fn append_battery(&self, sample: BatterySample) -> Result<(), StorageError> {
        let mut batteries = self
            .batteries
            .write()
            .map_err(|_| StorageError::new("lock failed"))?;
        batteries.push(sample);
        Ok(())
    }

    async fn list_double(&self, sensor_value_id: u64) -> Result<Vec<DoubleSample>, StorageError> {
        let doubles = self
            .doubles
            .read()
            .map_err(|_| StorageError::new("lock failed"))?;
        Ok(doubles
            .iter()
            .filter(|sample| sample.sensor_value_id == sensor_value_id)
            .cloned()
            .collect())
    }

    async fn list_binary(&self, sensor_value_id: u64) -> Result<Vec<BinarySample>, StorageError> {
        let binaries = self
            .binaries
            .read()
            .map_err(|_| StorageError::new("lock failed"))?;
        Ok(binaries
            .iter()
            .filter(|sample| sample.sensor_value_id == sensor_value_id)
            .cloned()
            .collect())
    }

    async fn list_battery(&self, node_record_id: u64) -> Result<Vec<BatterySample>, StorageError> {
        let batteries = self
            .batteries
            .read()
            .map_err(|_| StorageError::new("lock failed"))?;
        Ok(batteries
            .iter()
            .filter(|sample| sample.node_record_id == node_record_id)
            .cloned()
            .collect())
    }
}
