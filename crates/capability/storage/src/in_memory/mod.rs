//! 内存存储实现模块
//!
//! 用于单进程部署与测试。
//!
//! 包含以下实现：
//! - DeviceRegistry: InMemoryDeviceRegistry
//! - MetricsStore: InMemoryMetricsStore
//! - RuleStore: InMemoryRuleStore
//! - FirmwareStore: InMemoryFirmwareStore
//! - GatewayStore: InMemoryGatewayStore
//! - ForwardPayloadStore: InMemoryForwardPayloadStore

pub mod device;
pub mod firmware;
pub mod forward_payload;
pub mod gateway;
pub mod metrics;
pub mod rule;

pub use device::*;
pub use firmware::*;
pub use forward_payload::*;
pub use gateway::*;
pub use metrics::*;
pub use rule::*;
