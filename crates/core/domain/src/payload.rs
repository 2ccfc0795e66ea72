//! 载荷解析与十六进制编解码。

use crate::message::MessageError;

/// 解析数值载荷，保留三位小数。
pub fn parse_double(payload: &str) -> Result<f64, MessageError> {
    let value = payload
        .trim()
        .parse::<f64>()
        .map_err(|_| MessageError::InvalidPayload {
            kind: "double",
            payload: payload.to_string(),
        })?;
    if !value.is_finite() {
        return Err(MessageError::InvalidPayload {
            kind: "double",
            payload: payload.to_string(),
        });
    }
    Ok(round3(value))
}

/// 解析布尔载荷：纯数字按 `> 0` 判定，否则仅 `true`（忽略大小写）为真。
pub fn parse_boolean(payload: &str) -> bool {
    let trimmed = payload.trim();
    if !trimmed.is_empty() && trimmed.bytes().all(|byte| byte.is_ascii_digit()) {
        return trimmed.bytes().any(|byte| byte != b'0');
    }
    trimmed.eq_ignore_ascii_case("true")
}

pub fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

/// 大写十六进制编码。
pub fn encode_hex_upper(bytes: &[u8]) -> String {
    const DIGITS: &[u8; 16] = b"0123456789ABCDEF";
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        out.push(char::from(DIGITS[usize::from(byte >> 4)]));
        out.push(char::from(DIGITS[usize::from(byte & 0x0F)]));
    }
    out
}

/// 十六进制解码（大小写均可）。
pub fn decode_hex(payload: &str) -> Result<Vec<u8>, MessageError> {
    let invalid = || MessageError::InvalidPayload {
        kind: "hex",
        payload: payload.to_string(),
    };
    let text = payload.trim().as_bytes();
    if text.len() % 2 != 0 {
        return Err(invalid());
    }
    text.chunks(2)
        .map(|pair| {
            let high = hex_value(pair[0]).ok_or_else(invalid)?;
            let low = hex_value(pair[1]).ok_or_else(invalid)?;
            Ok((high << 4) | low)
        })
        .collect()
}

fn hex_value(digit: u8) -> Option<u8> {
    match digit {
        b'0'..=b'9' => Some(digit - b'0'),
        b'a'..=b'f' => Some(digit - b'a' + 10),
        b'A'..=b'F' => Some(digit - b'A' + 10),
        _ => None,
    }
}
