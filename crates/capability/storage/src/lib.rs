//! # HC Storage 模块
//!
//! 控制器的数据存储抽象层。持久化后端视为外部协作者，
//! 本模块只定义接口契约并提供内存实现。
//!
//! ## 模块说明
//!
//! - [`models`]：节点、传感器、当前值、时序样本、固件、网关、转发配置
//! - [`traits`]：存储接口（DeviceRegistry、MetricsStore、RuleStore 等）
//! - [`error`]：存储错误与节点 ID 分配错误
//! - [`allocator`]：基于注册表的节点 ID 分配器
//! - [`in_memory`]：`RwLock` 保护的内存实现
//!
//! ## 并发约束
//!
//! 设备自动注册依赖 `upsert_*` 的按键原子性。内存实现用单把写锁完成
//! 查找与创建；其它后端必须提供等价保证（唯一约束 + upsert，或按键加锁）。
//!
//! ## 使用示例
//!
//! ```rust,ignore
//! use domain::SensorKey;
//! use hc_storage::{DeviceRegistry, InMemoryDeviceRegistry, SensorUpdate};
//!
//! let registry = InMemoryDeviceRegistry::new();
//! let sensor = registry
//!     .upsert_sensor(SensorKey::new(1, 12, 3), SensorUpdate::default())
//!     .await?;
//! ```

pub mod allocator;
pub mod error;
pub mod in_memory;
pub mod models;
pub mod traits;

pub use allocator::RegistryNodeIdAllocator;
pub use error::*;
pub use models::*;
pub use traits::*;

pub use in_memory::{
    InMemoryDeviceRegistry, InMemoryFirmwareStore, InMemoryForwardPayloadStore,
    InMemoryGatewayStore, InMemoryMetricsStore, InMemoryRuleStore,
};
