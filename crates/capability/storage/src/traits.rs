//! 存储接口 Trait 定义
//!
//! - DeviceRegistry：节点/传感器/当前值（按键原子 upsert）
//! - MetricsStore：时序样本追加
//! - RuleStore：规则定义与抑制状态
//! - FirmwareStore：固件镜像
//! - GatewayStore：网关状态
//! - ForwardPayloadStore：载荷转发配置
//! - NodeIdAllocator：节点 ID 分配
//!
//! 注册表的 upsert 在实现内部按键串行化；解码路径之外的写入方
//! 也必须经由同一接口（或自行持有按键的锁），不得先查后建。

use crate::error::{AllocationError, StorageError};
use crate::models::{
    BatterySample, BinarySample, DoubleSample, FirmwareRecord, ForwardPayloadRecord,
    GatewayRecord, NodeRecord, NodeUpdate, SensorRecord, SensorUpdate, SensorValueRecord,
};
use async_trait::async_trait;
use domain::{GatewayState, NodeKey, ResourceRef, RuleDefinition, SensorKey, VariableType};

/// 设备注册表
#[async_trait]
pub trait DeviceRegistry: Send + Sync {
    async fn get_node(&self, key: NodeKey) -> Result<Option<NodeRecord>, StorageError>;

    async fn get_node_by_id(&self, id: u64) -> Result<Option<NodeRecord>, StorageError>;

    /// 列出网关下所有节点
    async fn list_nodes(&self, gateway_id: u32) -> Result<Vec<NodeRecord>, StorageError>;

    /// 按键 upsert 节点：不存在则创建，随后应用更新
    async fn upsert_node(
        &self,
        key: NodeKey,
        update: NodeUpdate,
    ) -> Result<NodeRecord, StorageError>;

    async fn get_sensor(&self, key: SensorKey) -> Result<Option<SensorRecord>, StorageError>;

    /// 按键 upsert 传感器（所属节点不存在时一并创建）
    async fn upsert_sensor(
        &self,
        key: SensorKey,
        update: SensorUpdate,
    ) -> Result<SensorRecord, StorageError>;

    async fn get_sensor_value(
        &self,
        key: SensorKey,
        variable_type: VariableType,
    ) -> Result<Option<SensorValueRecord>, StorageError>;

    async fn get_sensor_value_by_id(
        &self,
        id: u64,
    ) -> Result<Option<SensorValueRecord>, StorageError>;

    /// 写入 (传感器, 变量) 当前值（最后写入者胜），传感器不存在时一并创建
    async fn upsert_sensor_value(
        &self,
        key: SensorKey,
        variable_type: VariableType,
        value: &str,
        timestamp_ms: i64,
    ) -> Result<SensorValueRecord, StorageError>;
}

/// 时序样本存储
#[async_trait]
pub trait MetricsStore: Send + Sync {
    async fn append_double(&self, sample: DoubleSample) -> Result<(), StorageError>;

    async fn append_binary(&self, sample: BinarySample) -> Result<(), StorageError>;

    async fn append_battery(&self, sample: BatterySample) -> Result<(), StorageError>;

    async fn list_double(&self, sensor_value_id: u64) -> Result<Vec<DoubleSample>, StorageError>;

    async fn list_binary(&self, sensor_value_id: u64) -> Result<Vec<BinarySample>, StorageError>;

    async fn list_battery(&self, node_record_id: u64) -> Result<Vec<BatterySample>, StorageError>;
}

/// 规则存储
#[async_trait]
pub trait RuleStore: Send + Sync {
    async fn get_rule(&self, id: u64) -> Result<Option<RuleDefinition>, StorageError>;

    /// 引用指定资源的已启用规则
    async fn list_enabled_rules_for(
        &self,
        resource: &ResourceRef,
    ) -> Result<Vec<RuleDefinition>, StorageError>;

    /// 保存规则（含抑制状态与触发状态）
    async fn save_rule(&self, rule: RuleDefinition) -> Result<(), StorageError>;
}

/// 固件存储
#[async_trait]
pub trait FirmwareStore: Send + Sync {
    async fn get_firmware(&self, id: u64) -> Result<Option<FirmwareRecord>, StorageError>;

    async fn find_firmware(
        &self,
        firmware_type: u16,
        version: u16,
    ) -> Result<Option<FirmwareRecord>, StorageError>;
}

/// 网关存储
#[async_trait]
pub trait GatewayStore: Send + Sync {
    async fn get_gateway(&self, id: u32) -> Result<Option<GatewayRecord>, StorageError>;

    async fn save_gateway(&self, record: GatewayRecord) -> Result<(), StorageError>;

    /// 更新网关状态与诊断信息
    async fn update_status(
        &self,
        id: u32,
        state: GatewayState,
        message: &str,
        timestamp_ms: i64,
    ) -> Result<(), StorageError>;
}

/// 载荷转发配置存储
#[async_trait]
pub trait ForwardPayloadStore: Send + Sync {
    /// 以指定变量为源的已启用转发
    async fn list_forward_payloads(
        &self,
        source_sensor_value_id: u64,
    ) -> Result<Vec<ForwardPayloadRecord>, StorageError>;
}

/// 节点 ID 分配器
#[async_trait]
pub trait NodeIdAllocator: Send + Sync {
    async fn next_node_id(&self, gateway_id: u32) -> Result<u8, AllocationError>;
}
