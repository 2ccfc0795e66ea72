//! 消息处理能力模块
//!
//! 队列 → [`MessageMonitor`] → [`MessageDecoder`] → 设备注册表 / 时序 /
//! 出站消息；Set 的副作用（载荷转发、规则评估）经 [`WorkerPool`] 异步执行。

pub mod alive;
pub mod decoder;
pub mod error;
pub mod firmware;
pub mod forward;
pub mod monitor;
pub mod worker;

pub use alive::{AliveCheckConfig, MIN_ALIVE_CHECK_INTERVAL, NodeAliveMonitor};
pub use decoder::{DecoderParts, MessageDecoder, MySensorsDecoder};
pub use error::{DecodeError, PipelineError};
pub use firmware::{
    BOOTLOADER_COMMAND_CRC, BOOTLOADER_ERASE_EEPROM, FirmwareBlockRequest, FirmwareConfigRequest,
    FirmwareCursor, FirmwareSettings, FirmwareTransferEngine, UNKNOWN_FIRMWARE,
    block_response_payload, config_response_payload,
};
pub use forward::ForwardPayloadService;
pub use monitor::{DEFAULT_PACING, DEFAULT_SHUTDOWN_CEILING, MessageMonitor, MonitorHandle};
pub use worker::{WorkerPool, WorkerPoolConfig};
