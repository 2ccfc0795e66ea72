use domain::MessageError;
use hc_protocol::ProtocolError;
use hc_storage::{AllocationError, StorageError};

/// 解码错误：消息本身不合法，丢弃后继续。
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error(transparent)]
    Message(#[from] MessageError),
    #[error("invalid firmware payload: {0}")]
    Firmware(String),
}

/// 消息处理错误。
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// 写出到网关失败
    #[error("transport error: {0}")]
    Transport(#[from] ProtocolError),
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("allocation error: {0}")]
    Allocation(#[from] AllocationError),
    #[error("backpressure: {0}")]
    Backpressure(String),
    #[error("worker pool closed")]
    WorkerClosed,
}

impl From<MessageError> for PipelineError {
    fn from(err: MessageError) -> Self {
        Self::Decode(DecodeError::Message(err))
    }
}
