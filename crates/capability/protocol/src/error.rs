//! 协议错误类型定义

/// 网关通信错误
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// 连接错误
    #[error("connection error: {0}")]
    Connection(String),

    /// IO 错误
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// 串口错误
    #[error("serial error: {0}")]
    Serial(#[from] serialport::Error),

    /// MQTT 错误
    #[error("mqtt error: {0}")]
    Mqtt(String),

    /// 配置解析错误
    #[error("config parse error: {0}")]
    ConfigParse(String),

    /// 帧解析错误
    #[error("frame parse error: {0}")]
    FrameParse(String),

    /// 超时错误
    #[error("timeout: {0}")]
    Timeout(String),

    /// 网关已关闭
    #[error("gateway closed")]
    Closed,
}
