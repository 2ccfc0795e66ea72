//! 存储层错误类型
//!
//! 统一封装存储后端错误（锁失败、数据一致性错误、非法输入）。

#[derive(Debug, Clone)]
pub struct StorageError {
    message: String,
}

impl StorageError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl std::fmt::Display for StorageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for StorageError {}

/// 节点 ID 分配错误。
#[derive(Debug, thiserror::Error)]
pub enum AllocationError {
    #[error("node id range exhausted for gateway {gateway_id}")]
    Exhausted { gateway_id: u32 },
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}
