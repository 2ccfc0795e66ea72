//! 线协议编解码
//!
//! - 串口/以太网：`node;child;type;ack;subtype;payload\n`
//! - MQTT：主题 `<prefix>/<node>/<child>/<type>/<ack>/<subtype>`，载荷为消息体

use crate::error::ProtocolError;
use domain::RawMessage;

/// 解析一行串口/以太网帧。
pub fn parse_line(gateway_id: u32, line: &str) -> Result<RawMessage, ProtocolError> {
    let line = line.trim_end_matches(['\r', '\n']);
    let mut parts = line.splitn(6, ';');
    let node_id = parse_field(parts.next(), "node", line)?;
    let sensor_id = parse_field(parts.next(), "child", line)?;
    let message_type = parse_field(parts.next(), "type", line)?;
    let ack = parse_ack(parts.next(), line)?;
    let sub_type = parse_field(parts.next(), "subtype", line)?;
    let payload = parts.next().unwrap_or_default();
    Ok(RawMessage::inbound(
        gateway_id,
        node_id,
        sensor_id,
        message_type,
        ack,
        sub_type,
        payload,
    ))
}

/// 编码为一行串口/以太网帧（含换行）。
pub fn format_line(message: &RawMessage) -> String {
    format!(
        "{};{};{};{};{};{}\n",
        message.node_id,
        message.sensor_id,
        message.message_type,
        u8::from(message.ack),
        message.sub_type,
        message.payload
    )
}

/// 解析 MQTT 主题与载荷。主题末五段为寻址字段，前缀任意。
pub fn parse_topic(gateway_id: u32, topic: &str, payload: &[u8]) -> Result<RawMessage, ProtocolError> {
    let segments: Vec<&str> = topic.trim_end_matches('/').rsplitn(6, '/').collect();
    if segments.len() < 6 {
        return Err(ProtocolError::FrameParse(format!("topic too short: {topic}")));
    }
    // rsplitn 逆序：[subtype, ack, type, child, node, prefix]
    let sub_type = parse_field(Some(segments[0]), "subtype", topic)?;
    let ack = parse_ack(Some(segments[1]), topic)?;
    let message_type = parse_field(Some(segments[2]), "type", topic)?;
    let sensor_id = parse_field(Some(segments[3]), "child", topic)?;
    let node_id = parse_field(Some(segments[4]), "node", topic)?;
    let payload = String::from_utf8(payload.to_vec())
        .map_err(|_| ProtocolError::FrameParse(format!("payload is not utf-8 on {topic}")))?;
    Ok(RawMessage::inbound(
        gateway_id,
        node_id,
        sensor_id,
        message_type,
        ack,
        sub_type,
        payload,
    ))
}

/// 出站消息的 MQTT 主题。
pub fn format_topic(prefix: &str, message: &RawMessage) -> String {
    format!(
        "{}/{}/{}/{}/{}/{}",
        prefix.trim_end_matches('/'),
        message.node_id,
        message.sensor_id,
        message.message_type,
        u8::from(message.ack),
        message.sub_type
    )
}

fn parse_field(field: Option<&str>, name: &str, frame: &str) -> Result<u8, ProtocolError> {
    let field = field.ok_or_else(|| ProtocolError::FrameParse(format!("missing {name}: {frame}")))?;
    field
        .trim()
        .parse::<u8>()
        .map_err(|_| ProtocolError::FrameParse(format!("invalid {name} {field:?}: {frame}")))
}

fn parse_ack(field: Option<&str>, frame: &str) -> Result<bool, ProtocolError> {
    match parse_field(field, "ack", frame)? {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(ProtocolError::FrameParse(format!("invalid ack {other}: {frame}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::{Direction, MessageType};

    #[test]
    fn parse_serial_line() {
        let message = parse_line(3, "12;6;1;0;0;36.5\n").expect("line");
        assert_eq!(message.gateway_id, 3);
        assert_eq!(message.node_id, 12);
        assert_eq!(message.sensor_id, 6);
        assert_eq!(message.message_type, 1);
        assert!(!message.ack);
        assert_eq!(message.payload, "36.5");
        assert_eq!(message.direction, Direction::Inbound);
    }

    #[test]
    fn payload_may_contain_separator_or_be_missing() {
        let message = parse_line(1, "0;255;3;0;9;read: 1-1-0 s=0;c=1").expect("line");
        assert_eq!(message.payload, "read: 1-1-0 s=0;c=1");

        let empty = parse_line(1, "5;255;3;0;18").expect("line");
        assert_eq!(empty.payload, "");
    }

    #[test]
    fn malformed_lines_are_rejected() {
        assert!(parse_line(1, "").is_err());
        assert!(parse_line(1, "300;1;1;0;0;1").is_err());
        assert!(parse_line(1, "1;1;1;2;0;1").is_err());
        assert!(parse_line(1, "a;1;1;0;0;1").is_err());
    }

    #[test]
    fn format_serial_line() {
        let message = RawMessage::outbound(1, 12, 255, MessageType::Internal, 4, "13");
        assert_eq!(format_line(&message), "12;255;3;0;4;13\n");
    }

    #[test]
    fn mqtt_topics() {
        let message = parse_topic(2, "mygateway1-out/7/1/1/0/2", b"1").expect("topic");
        assert_eq!((message.node_id, message.sensor_id, message.sub_type), (7, 1, 2));
        assert_eq!(message.payload, "1");

        let nested = parse_topic(2, "home/gw/mygateway1-out/7/1/1/0/2", b"0").expect("nested");
        assert_eq!(nested.node_id, 7);

        assert!(parse_topic(2, "7/1/1/0/2", b"1").is_err());

        let reply = RawMessage::outbound(2, 7, 1, MessageType::Set, 2, "1");
        assert_eq!(format_topic("mygateway1-in/", &reply), "mygateway1-in/7/1/1/0/2");
    }
}
