use hc_storage::StorageError;

/// 规则链路错误。
#[derive(Debug, thiserror::Error)]
pub enum RuleError {
    /// 资源类型不支持取值
    #[error("resource unavailable: {0}")]
    ResourceUnavailable(String),
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("not found: {0}")]
    NotFound(String),
    /// 规则动作执行失败
    #[error("operation error: {0}")]
    Operation(String),
}
