//! 固件传输引擎
//!
//! 配置请求：按 擦除 EEPROM → 节点指定固件 → 未知设备映射默认固件 →
//! (type, version) 的顺序选择固件，回复块数与 CRC。
//!
//! 块请求：引擎最多缓存一份固件镜像（[`FirmwareCursor`]）。请求末块、
//! type/version 与缓存不一致或尚未加载时重新加载；发送第 0 块后释放缓存。
//! 节点自末块向第 0 块倒序请求，因此一次完整传输恰好加载一次。

use crate::error::{DecodeError, PipelineError};
use domain::{NodeKey, RawMessage, StreamType, decode_hex, encode_hex_upper};
use hc_storage::{DeviceRegistry, FirmwareRecord, FirmwareStore, NodeUpdate};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// 未知设备请求固件时使用的 type/version 通配值。
pub const UNKNOWN_FIRMWARE: u16 = 0xFFFF;

/// 引导程序命令的 CRC 标记（blocks = 0 时生效）。
pub const BOOTLOADER_COMMAND_CRC: u16 = 0xDA7A;

/// 引导程序命令：擦除 EEPROM。
pub const BOOTLOADER_ERASE_EEPROM: u16 = 0x01;

/// 进度日志间隔（块）。
const PROGRESS_LOG_INTERVAL: u16 = 100;

/// 固件选择参数。
#[derive(Debug, Clone, Default)]
pub struct FirmwareSettings {
    pub default_firmware_id: Option<u64>,
    /// 找不到请求的固件时改用默认固件
    pub fallback_to_default: bool,
}

/// 块请求：type、version、block 三个小端 u16。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FirmwareBlockRequest {
    pub firmware_type: u16,
    pub version: u16,
    pub block: u16,
}

/// 配置请求的前两个字段（其后的 blocks/crc/bl_version 不参与选择）。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FirmwareConfigRequest {
    pub firmware_type: u16,
    pub version: u16,
}

fn read_u16(bytes: &[u8], index: usize) -> Option<u16> {
    let offset = index * 2;
    let pair = bytes.get(offset..offset + 2)?;
    Some(u16::from_le_bytes([pair[0], pair[1]]))
}

fn parse_words(payload: &str, count: usize) -> Result<Vec<u16>, DecodeError> {
    let bytes = decode_hex(payload)?;
    (0..count)
        .map(|index| {
            read_u16(&bytes, index)
                .ok_or_else(|| DecodeError::Firmware(format!("payload too short: {payload:?}")))
        })
        .collect()
}

impl FirmwareBlockRequest {
    pub fn parse(payload: &str) -> Result<Self, DecodeError> {
        let words = parse_words(payload, 3)?;
        Ok(Self {
            firmware_type: words[0],
            version: words[1],
            block: words[2],
        })
    }
}

impl FirmwareConfigRequest {
    pub fn parse(payload: &str) -> Result<Self, DecodeError> {
        let words = parse_words(payload, 2)?;
        Ok(Self {
            firmware_type: words[0],
            version: words[1],
        })
    }

    fn is_unknown_device(&self) -> bool {
        self.firmware_type == UNKNOWN_FIRMWARE && self.version == UNKNOWN_FIRMWARE
    }
}

fn encode_words(words: &[u16]) -> String {
    let bytes: Vec<u8> = words.iter().flat_map(|word| word.to_le_bytes()).collect();
    encode_hex_upper(&bytes)
}

/// 配置响应载荷：type、version、blocks、crc。
pub fn config_response_payload(firmware_type: u16, version: u16, blocks: u16, crc: u16) -> String {
    encode_words(&[firmware_type, version, blocks, crc])
}

/// 块响应载荷：type、version、block 头 + 块数据。
pub fn block_response_payload(request: &FirmwareBlockRequest, data: &[u8]) -> String {
    let mut payload = encode_words(&[request.firmware_type, request.version, request.block]);
    payload.push_str(&encode_hex_upper(data));
    payload
}

/// 单槽固件缓存。
#[derive(Debug, Default)]
pub struct FirmwareCursor {
    loaded: Option<FirmwareRecord>,
}

impl FirmwareCursor {
    pub fn loaded(&self) -> Option<&FirmwareRecord> {
        self.loaded.as_ref()
    }

    /// 是否需要为该请求重新加载镜像
    pub fn needs_reload(&self, request: &FirmwareBlockRequest) -> bool {
        match &self.loaded {
            None => true,
            Some(firmware) => {
                request.block == firmware.blocks.saturating_sub(1)
                    || request.firmware_type != firmware.firmware_type
                    || request.version != firmware.version
            }
        }
    }

    pub fn load(&mut self, firmware: FirmwareRecord) {
        self.loaded = Some(firmware);
    }

    pub fn evict(&mut self) {
        self.loaded = None;
    }
}

/// 固件传输引擎。
pub struct FirmwareTransferEngine {
    firmware: Arc<dyn FirmwareStore>,
    registry: Arc<dyn DeviceRegistry>,
    settings: FirmwareSettings,
    cursor: Mutex<FirmwareCursor>,
}

impl FirmwareTransferEngine {
    pub fn new(
        firmware: Arc<dyn FirmwareStore>,
        registry: Arc<dyn DeviceRegistry>,
        settings: FirmwareSettings,
    ) -> Self {
        Self {
            firmware,
            registry,
            settings,
            cursor: Mutex::new(FirmwareCursor::default()),
        }
    }

    /// 处理配置请求；无可用固件时返回 `None`（节点会重试）。
    pub async fn handle_config_request(
        &self,
        message: &RawMessage,
    ) -> Result<Option<RawMessage>, PipelineError> {
        let request = FirmwareConfigRequest::parse(&message.payload)?;
        let key = NodeKey::new(message.gateway_id, message.node_id);
        let node = self.registry.get_node(key).await?;

        if node.as_ref().is_some_and(|node| node.erase_eeprom) {
            let clear = NodeUpdate {
                erase_eeprom: Some(false),
                ..NodeUpdate::default()
            };
            self.registry.upsert_node(key, clear).await?;
            info!(
                target: "hc.firmware",
                gateway_id = key.gateway_id,
                node_id = key.node_id,
                "erase_eeprom_command_sent"
            );
            let payload =
                config_response_payload(BOOTLOADER_ERASE_EEPROM, 0, 0, BOOTLOADER_COMMAND_CRC);
            return Ok(Some(reply(message, StreamType::FirmwareConfigResponse, payload)));
        }

        let mut selected = match node.and_then(|node| node.firmware_id) {
            Some(firmware_id) => self.firmware.get_firmware(firmware_id).await?,
            None if request.is_unknown_device() => self.default_firmware().await?,
            None => {
                self.firmware
                    .find_firmware(request.firmware_type, request.version)
                    .await?
            }
        };
        if selected.is_none() && self.settings.fallback_to_default {
            debug!(target: "hc.firmware", node_id = key.node_id, "firmware_fallback_to_default");
            selected = self.default_firmware().await?;
        }
        let Some(firmware) = selected else {
            warn!(
                target: "hc.firmware",
                gateway_id = key.gateway_id,
                node_id = key.node_id,
                firmware_type = request.firmware_type,
                version = request.version,
                "firmware_not_available"
            );
            return Ok(None);
        };

        info!(
            target: "hc.firmware",
            node_id = key.node_id,
            firmware_id = firmware.id,
            firmware_type = firmware.firmware_type,
            version = firmware.version,
            blocks = firmware.blocks,
            "firmware_config_sent"
        );
        let payload = config_response_payload(
            firmware.firmware_type,
            firmware.version,
            firmware.blocks,
            firmware.crc,
        );
        Ok(Some(reply(message, StreamType::FirmwareConfigResponse, payload)))
    }

    /// 处理块请求；固件或块不存在时返回 `None`。
    pub async fn handle_block_request(
        &self,
        message: &RawMessage,
    ) -> Result<Option<RawMessage>, PipelineError> {
        let request = FirmwareBlockRequest::parse(&message.payload)?;
        let mut cursor = self.cursor.lock().await;

        if cursor.needs_reload(&request) {
            match self
                .firmware
                .find_firmware(request.firmware_type, request.version)
                .await?
            {
                Some(firmware) => {
                    debug!(target: "hc.firmware", firmware_id = firmware.id, "firmware_loaded");
                    cursor.load(firmware);
                }
                None => {
                    cursor.evict();
                    warn!(
                        target: "hc.firmware",
                        firmware_type = request.firmware_type,
                        version = request.version,
                        "firmware_not_available"
                    );
                    return Ok(None);
                }
            }
        }

        let Some(firmware) = cursor.loaded() else {
            return Ok(None);
        };
        let Some(data) = firmware.block(request.block) else {
            warn!(
                target: "hc.firmware",
                node_id = message.node_id,
                block = request.block,
                blocks = firmware.blocks,
                "firmware_block_out_of_range"
            );
            return Ok(None);
        };
        let payload = block_response_payload(&request, data);
        if request.block % PROGRESS_LOG_INTERVAL == 0
            || request.block == firmware.blocks.saturating_sub(1)
        {
            info!(
                target: "hc.firmware",
                node_id = message.node_id,
                block = request.block,
                blocks = firmware.blocks,
                "firmware_progress"
            );
        }
        hc_telemetry::record_firmware_block_served();

        if request.block == 0 {
            cursor.evict();
            debug!(target: "hc.firmware", "firmware_unloaded");
        }
        Ok(Some(reply(message, StreamType::FirmwareResponse, payload)))
    }

    async fn default_firmware(&self) -> Result<Option<FirmwareRecord>, PipelineError> {
        match self.settings.default_firmware_id {
            Some(id) => Ok(self.firmware.get_firmware(id).await?),
            None => {
                warn!(target: "hc.firmware", "default_firmware_not_set");
                Ok(None)
            }
        }
    }
}

fn reply(message: &RawMessage, sub_type: StreamType, payload: String) -> RawMessage {
    message.reply(domain::MessageType::Stream, sub_type.code(), payload)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_block_request() {
        let request = FirmwareBlockRequest::parse("0A000200FF00").expect("request");
        assert_eq!(
            request,
            FirmwareBlockRequest {
                firmware_type: 10,
                version: 2,
                block: 255,
            }
        );
        assert!(FirmwareBlockRequest::parse("0A00").is_err());
        assert!(FirmwareBlockRequest::parse("zz").is_err());
    }

    #[test]
    fn response_payloads() {
        assert_eq!(
            config_response_payload(BOOTLOADER_ERASE_EEPROM, 0, 0, BOOTLOADER_COMMAND_CRC),
            "0100000000007ADA"
        );
        let request = FirmwareBlockRequest {
            firmware_type: 1,
            version: 2,
            block: 3,
        };
        assert_eq!(block_response_payload(&request, &[0xAB, 0x01]), "010002000300AB01");
    }

    #[test]
    fn cursor_reload_rules() {
        let firmware = FirmwareRecord::from_binary(1, 10, 2, "fw", &[0u8; 48]).expect("firmware");
        let mut cursor = FirmwareCursor::default();
        let request = |firmware_type, version, block| FirmwareBlockRequest {
            firmware_type,
            version,
            block,
        };
        assert!(cursor.needs_reload(&request(10, 2, 1)));
        cursor.load(firmware);
        assert!(!cursor.needs_reload(&request(10, 2, 1)));
        assert!(cursor.needs_reload(&request(10, 2, 2)));
        assert!(cursor.needs_reload(&request(10, 3, 1)));
        assert!(cursor.needs_reload(&request(11, 2, 1)));
        cursor.evict();
        assert!(cursor.loaded().is_none());
    }
}
