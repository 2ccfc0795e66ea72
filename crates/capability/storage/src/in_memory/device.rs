//! 设备注册表内存实现
//!
//! 节点、传感器、当前值共用一把写锁，upsert 在锁内完成查找与创建，
//! 因而对同一键不会产生重复记录。

use crate::error::StorageError;
use crate::models::{NodeRecord, NodeUpdate, SensorRecord, SensorUpdate, SensorValueRecord};
use crate::traits::DeviceRegistry;
use domain::{NodeKey, SensorKey, VariableType};
use std::collections::HashMap;
use std::sync::RwLock;

#[derive(Default)]
struct DeviceTables {
    next_id: u64,
    nodes: HashMap<NodeKey, NodeRecord>,
    sensors: HashMap<SensorKey, SensorRecord>,
    values: HashMap<(SensorKey, VariableType), SensorValueRecord>,
}

impl DeviceTables {
    fn ensure_node(&mut self, key: NodeKey) -> &mut NodeRecord {
        let next_id = &mut self.next_id;
        self.nodes.entry(key).or_insert_with(|| {
            *next_id += 1;
            NodeRecord::new(*next_id, key)
        })
    }

    fn ensure_sensor(&mut self, key: SensorKey) -> &mut SensorRecord {
        let node_record_id = self.ensure_node(key.node).id;
        let next_id = &mut self.next_id;
        self.sensors.entry(key).or_insert_with(|| {
            *next_id += 1;
            SensorRecord {
                id: *next_id,
                key,
                node_record_id,
                sensor_type: None,
                name: None,
                unit: None,
                last_seen_ms: None,
            }
        })
    }
}

/// 设备注册表内存实现
pub struct InMemoryDeviceRegistry {
    tables: RwLock<DeviceTables>,
}

impl InMemoryDeviceRegistry {
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(DeviceTables::default()),
        }
    }

    /// 节点总数（测试与诊断用）
    pub fn node_count(&self) -> usize {
        self.tables.read().map(|tables| tables.nodes.len()).unwrap_or_default()
    }

    /// 传感器总数（测试与诊断用）
    pub fn sensor_count(&self) -> usize {
        self.tables
            .read()
            .map(|tables| tables.sensors.len())
            .unwrap_or_default()
    }
}

impl Default for InMemoryDeviceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl DeviceRegistry for InMemoryDeviceRegistry {
    async fn get_node(&self, key: NodeKey) -> Result<Option<NodeRecord>, StorageError> {
        let tables = self
            .tables
            .read()
            .map_err(|_| StorageError::new("lock failed"))?;
        Ok(tables.nodes.get(&key).cloned())
    }

    async fn get_node_by_id(&self, id: u64) -> Result<Option<NodeRecord>, StorageError> {
        let tables = self
            .tables
            .read()
            .map_err(|_| StorageError::new("lock failed"))?;
        Ok(tables.nodes.values().find(|node| node.id == id).cloned())
    }

    async fn list_nodes(&self, gateway_id: u32) -> Result<Vec<NodeRecord>, StorageError> {
        let tables = self
            .tables
            .read()
            .map_err(|_| StorageError::new("lock failed"))?;
        let mut nodes: Vec<NodeRecord> = tables
            .nodes
            .values()
            .filter(|node| node.key.gateway_id == gateway_id)
            .cloned()
            .collect();
        nodes.sort_by_key(|node| node.key);
        Ok(nodes)
    }

    async fn upsert_node(
        &self,
        key: NodeKey,
        update: NodeUpdate,
    ) -> Result<NodeRecord, StorageError> {
        let mut tables = self
            .tables
            .write()
            .map_err(|_| StorageError::new("lock failed"))?;
        let node = tables.ensure_node(key);
        update.apply(node);
        Ok(node.clone())
    }

    async fn get_sensor(&self, key: SensorKey) -> Result<Option<SensorRecord>, StorageError> {
        let tables = self
            .tables
            .read()
            .map_err(|_| StorageError::new("lock failed"))?;
        Ok(tables.sensors.get(&key).cloned())
    }

    async fn upsert_sensor(
        &self,
        key: SensorKey,
        update: SensorUpdate,
    ) -> Result<SensorRecord, StorageError> {
        let mut tables = self
            .tables
            .write()
            .map_err(|_| StorageError::new("lock failed"))?;
        let sensor = tables.ensure_sensor(key);
        update.apply(sensor);
        Ok(sensor.clone())
    }

    async fn get_sensor_value(
        &self,
        key: SensorKey,
        variable_type: VariableType,
    ) -> Result<Option<SensorValueRecord>, StorageError> {
        let tables = self
            .tables
            .read()
            .map_err(|_| StorageError::new("lock failed"))?;
        Ok(tables.values.get(&(key, variable_type)).cloned())
    }

    async fn get_sensor_value_by_id(
        &self,
        id: u64,
    ) -> Result<Option<SensorValueRecord>, StorageError> {
        let tables = self
            .tables
            .read()
            .map_err(|_| StorageError::new("lock failed"))?;
        Ok(tables.values.values().find(|value| value.id == id).cloned())
    }

    async fn upsert_sensor_value(
        &self,
        key: SensorKey,
        variable_type: VariableType,
        value: &str,
        timestamp_ms: i64,
    ) -> Result<SensorValueRecord, StorageError> {
        let mut tables = self
            .tables
            .write()
            .map_err(|_| StorageError::new("lock failed"))?;
        let sensor_record_id = tables.ensure_sensor(key).id;
        let DeviceTables {
            next_id, values, ..
        } = &mut *tables;
        let record = values.entry((key, variable_type)).or_insert_with(|| {
            *next_id += 1;
            SensorValueRecord {
                id: *next_id,
                sensor_record_id,
                sensor_key: key,
                variable_type,
                metric_type: variable_type.metric_type(),
                last_value: None,
                timestamp_ms,
            }
        });
        record.last_value = Some(value.to_string());
        record.timestamp_ms = timestamp_ms;
        Ok(record.clone())
    }
}
