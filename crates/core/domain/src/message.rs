use crate::types::{InternalType, PresentationType, StreamType, VariableType};
use serde::{Deserialize, Serialize};

/// 广播子 ID：节点级（而非传感器级）消息使用。
pub const NODE_SENSOR_ID_BROADCAST: u8 = 255;

/// 网关侧节点 ID（网关本身）。
pub const GATEWAY_NODE_ID: u8 = 0;

/// 广播节点 ID。
pub const BROADCAST_NODE_ID: u8 = 255;

/// 消息解析错误。
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MessageError {
    #[error("unknown message type: {0}")]
    UnknownMessageType(u8),
    #[error("unknown sub type {sub_type} for message type {message_type:?}")]
    UnknownSubType {
        message_type: MessageType,
        sub_type: u8,
    },
    #[error("invalid {kind} payload: {payload:?}")]
    InvalidPayload { kind: &'static str, payload: String },
}

/// 消息方向。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// 网关 → 控制器。
    Inbound,
    /// 控制器 → 网关。
    Outbound,
}

/// 消息类别（线协议第三个字段）。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    Presentation = 0,
    Set = 1,
    Request = 2,
    Internal = 3,
    Stream = 4,
}

impl MessageType {
    pub fn from_code(code: u8) -> Result<Self, MessageError> {
        match code {
            0 => Ok(Self::Presentation),
            1 => Ok(Self::Set),
            2 => Ok(Self::Request),
            3 => Ok(Self::Internal),
            4 => Ok(Self::Stream),
            other => Err(MessageError::UnknownMessageType(other)),
        }
    }

    pub fn code(self) -> u8 {
        self as u8
    }
}

/// 解析后的消息类别与子类型。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    Presentation(PresentationType),
    Set(VariableType),
    Request(VariableType),
    Internal(InternalType),
    Stream(StreamType),
}

/// 传输无关的原始消息。
///
/// 入队后不可变；回复通过 [`RawMessage::reply`] 构造新的出站消息。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawMessage {
    pub gateway_id: u32,
    pub node_id: u8,
    pub sensor_id: u8,
    pub message_type: u8,
    pub ack: bool,
    pub sub_type: u8,
    pub payload: String,
    pub direction: Direction,
    pub timestamp_ms: i64,
}

impl RawMessage {
    /// 构造入站消息（时间戳取当前时间）。
    pub fn inbound(
        gateway_id: u32,
        node_id: u8,
        sensor_id: u8,
        message_type: u8,
        ack: bool,
        sub_type: u8,
        payload: impl Into<String>,
    ) -> Self {
        Self {
            gateway_id,
            node_id,
            sensor_id,
            message_type,
            ack,
            sub_type,
            payload: payload.into(),
            direction: Direction::Inbound,
            timestamp_ms: crate::now_epoch_ms(),
        }
    }

    /// 构造出站消息（ack 关闭）。
    pub fn outbound(
        gateway_id: u32,
        node_id: u8,
        sensor_id: u8,
        message_type: MessageType,
        sub_type: u8,
        payload: impl Into<String>,
    ) -> Self {
        Self {
            gateway_id,
            node_id,
            sensor_id,
            message_type: message_type.code(),
            ack: false,
            sub_type,
            payload: payload.into(),
            direction: Direction::Outbound,
            timestamp_ms: crate::now_epoch_ms(),
        }
    }

    /// 以当前消息的寻址信息构造回复。
    pub fn reply(
        &self,
        message_type: MessageType,
        sub_type: u8,
        payload: impl Into<String>,
    ) -> RawMessage {
        Self::outbound(
            self.gateway_id,
            self.node_id,
            self.sensor_id,
            message_type,
            sub_type,
            payload,
        )
    }

    pub fn is_outbound(&self) -> bool {
        self.direction == Direction::Outbound
    }

    pub fn is_node_broadcast(&self) -> bool {
        self.sensor_id == NODE_SENSOR_ID_BROADCAST
    }

    /// 按类别与子类型解码。
    pub fn kind(&self) -> Result<MessageKind, MessageError> {
        let message_type = MessageType::from_code(self.message_type)?;
        let unknown = || MessageError::UnknownSubType {
            message_type,
            sub_type: self.sub_type,
        };
        let kind = match message_type {
            MessageType::Presentation => {
                MessageKind::Presentation(PresentationType::from_code(self.sub_type).ok_or_else(unknown)?)
            }
            MessageType::Set => {
                MessageKind::Set(VariableType::from_code(self.sub_type).ok_or_else(unknown)?)
            }
            MessageType::Request => {
                MessageKind::Request(VariableType::from_code(self.sub_type).ok_or_else(unknown)?)
            }
            MessageType::Internal => {
                MessageKind::Internal(InternalType::from_code(self.sub_type).ok_or_else(unknown)?)
            }
            MessageType::Stream => {
                MessageKind::Stream(StreamType::from_code(self.sub_type).ok_or_else(unknown)?)
            }
        };
        Ok(kind)
    }
}
