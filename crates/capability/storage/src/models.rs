//! 数据模型
//!
//! 定义注册表与各存储的数据结构：
//! - 设备模型：NodeRecord/NodeUpdate、SensorRecord/SensorUpdate、SensorValueRecord
//! - 时序样本：DoubleSample、BinarySample、BatterySample
//! - 固件模型：FirmwareRecord（分块与 CRC）
//! - 网关模型：GatewayRecord
//! - 转发模型：ForwardPayloadRecord

use crate::error::StorageError;
use crc::{CRC_16_MODBUS, Crc};
use domain::{
    GatewayState, MetricType, NetworkType, NodeKey, NodeState, PresentationType, SensorKey,
    VariableType,
};

/// 固件分块大小（字节）。
pub const FIRMWARE_BLOCK_SIZE: usize = 16;

/// 固件镜像补齐字节。
const FIRMWARE_PAD_BYTE: u8 = 0xFF;

const FIRMWARE_CRC: Crc<u16> = Crc::<u16>::new(&CRC_16_MODBUS);

/// 节点记录。
#[derive(Debug, Clone, PartialEq)]
pub struct NodeRecord {
    pub id: u64,
    pub key: NodeKey,
    pub name: Option<String>,
    pub node_type: Option<PresentationType>,
    pub library_version: Option<String>,
    pub sketch_version: Option<String>,
    pub battery_level: Option<String>,
    pub state: NodeState,
    pub last_seen_ms: Option<i64>,
    pub last_heartbeat_ms: Option<i64>,
    pub firmware_id: Option<u64>,
    pub erase_eeprom: bool,
}

impl NodeRecord {
    pub fn new(id: u64, key: NodeKey) -> Self {
        Self {
            id,
            key,
            name: None,
            node_type: None,
            library_version: None,
            sketch_version: None,
            battery_level: None,
            state: NodeState::Down,
            last_seen_ms: None,
            last_heartbeat_ms: None,
            firmware_id: None,
            erase_eeprom: false,
        }
    }
}

/// 节点更新输入（None 表示保持不变）。
#[derive(Debug, Clone, Default)]
pub struct NodeUpdate {
    pub name: Option<String>,
    pub node_type: Option<PresentationType>,
    pub library_version: Option<String>,
    pub sketch_version: Option<String>,
    pub battery_level: Option<String>,
    pub state: Option<NodeState>,
    pub last_seen_ms: Option<i64>,
    pub last_heartbeat_ms: Option<i64>,
    pub firmware_id: Option<u64>,
    pub erase_eeprom: Option<bool>,
}

impl NodeUpdate {
    /// 节点上报即视为可达。
    pub fn seen(now_ms: i64) -> Self {
        Self {
            state: Some(NodeState::Up),
            last_seen_ms: Some(now_ms),
            ..Self::default()
        }
    }

    pub fn apply(self, record: &mut NodeRecord) {
        if let Some(name) = self.name {
            record.name = Some(name);
        }
        if let Some(node_type) = self.node_type {
            record.node_type = Some(node_type);
        }
        if let Some(library_version) = self.library_version {
            record.library_version = Some(library_version);
        }
        if let Some(sketch_version) = self.sketch_version {
            record.sketch_version = Some(sketch_version);
        }
        if let Some(battery_level) = self.battery_level {
            record.battery_level = Some(battery_level);
        }
        if let Some(state) = self.state {
            record.state = state;
        }
        if let Some(last_seen_ms) = self.last_seen_ms {
            record.last_seen_ms = Some(last_seen_ms);
        }
        if let Some(last_heartbeat_ms) = self.last_heartbeat_ms {
            record.last_heartbeat_ms = Some(last_heartbeat_ms);
        }
        if let Some(firmware_id) = self.firmware_id {
            record.firmware_id = Some(firmware_id);
        }
        if let Some(erase_eeprom) = self.erase_eeprom {
            record.erase_eeprom = erase_eeprom;
        }
    }
}

/// 传感器记录。
#[derive(Debug, Clone, PartialEq)]
pub struct SensorRecord {
    pub id: u64,
    pub key: SensorKey,
    pub node_record_id: u64,
    pub sensor_type: Option<PresentationType>,
    pub name: Option<String>,
    pub unit: Option<String>,
    pub last_seen_ms: Option<i64>,
}

/// 传感器更新输入。
#[derive(Debug, Clone, Default)]
pub struct SensorUpdate {
    pub sensor_type: Option<PresentationType>,
    pub name: Option<String>,
    pub unit: Option<String>,
    pub last_seen_ms: Option<i64>,
}

impl SensorUpdate {
    pub fn apply(self, record: &mut SensorRecord) {
        if let Some(sensor_type) = self.sensor_type {
            record.sensor_type = Some(sensor_type);
        }
        if let Some(name) = self.name {
            record.name = Some(name);
        }
        if let Some(unit) = self.unit {
            record.unit = Some(unit);
        }
        if let Some(last_seen_ms) = self.last_seen_ms {
            record.last_seen_ms = Some(last_seen_ms);
        }
    }
}

/// (传感器, 变量类型) 的当前值，每个键仅一行。
#[derive(Debug, Clone, PartialEq)]
pub struct SensorValueRecord {
    pub id: u64,
    pub sensor_record_id: u64,
    pub sensor_key: SensorKey,
    pub variable_type: VariableType,
    pub metric_type: MetricType,
    pub last_value: Option<String>,
    pub timestamp_ms: i64,
}

/// 数值样本。
#[derive(Debug, Clone, PartialEq)]
pub struct DoubleSample {
    pub sensor_value_id: u64,
    pub timestamp_ms: i64,
    pub value: f64,
}

/// 二值样本。
#[derive(Debug, Clone, PartialEq)]
pub struct BinarySample {
    pub sensor_value_id: u64,
    pub timestamp_ms: i64,
    pub value: bool,
}

/// 电量样本。
#[derive(Debug, Clone, PartialEq)]
pub struct BatterySample {
    pub node_record_id: u64,
    pub timestamp_ms: i64,
    pub value: f64,
}

/// 固件记录。
#[derive(Debug, Clone, PartialEq)]
pub struct FirmwareRecord {
    pub id: u64,
    pub firmware_type: u16,
    pub version: u16,
    pub name: String,
    /// 已按块大小补齐的镜像。
    pub data: Vec<u8>,
    pub blocks: u16,
    pub crc: u16,
}

impl FirmwareRecord {
    /// 由二进制镜像构造：补齐到整块（0xFF）后计算块数与 CRC-16/MODBUS。
    pub fn from_binary(
        id: u64,
        firmware_type: u16,
        version: u16,
        name: impl Into<String>,
        image: &[u8],
    ) -> Result<Self, StorageError> {
        if image.is_empty() {
            return Err(StorageError::new("firmware image is empty"));
        }
        let mut data = image.to_vec();
        let remainder = data.len() % FIRMWARE_BLOCK_SIZE;
        if remainder != 0 {
            data.resize(data.len() + FIRMWARE_BLOCK_SIZE - remainder, FIRMWARE_PAD_BYTE);
        }
        let blocks = u16::try_from(data.len() / FIRMWARE_BLOCK_SIZE)
            .map_err(|_| StorageError::new("firmware image too large"))?;
        let crc = FIRMWARE_CRC.checksum(&data);
        Ok(Self {
            id,
            firmware_type,
            version,
            name: name.into(),
            data,
            blocks,
            crc,
        })
    }

    /// 指定块的字节切片；越界返回 None。
    pub fn block(&self, index: u16) -> Option<&[u8]> {
        let from = usize::from(index) * FIRMWARE_BLOCK_SIZE;
        self.data.get(from..from + FIRMWARE_BLOCK_SIZE)
    }
}

/// 网关记录。
#[derive(Debug, Clone, PartialEq)]
pub struct GatewayRecord {
    pub id: u32,
    pub name: String,
    pub network_type: NetworkType,
    pub enabled: bool,
    pub state: GatewayState,
    pub status_message: String,
    pub status_since_ms: i64,
}

/// 载荷转发配置：源变量的 Set 值复制到目标变量。
#[derive(Debug, Clone, PartialEq)]
pub struct ForwardPayloadRecord {
    pub id: u64,
    pub source_sensor_value_id: u64,
    pub target_sensor_value_id: u64,
    pub enabled: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn firmware_is_padded_to_whole_blocks() {
        let firmware = FirmwareRecord::from_binary(1, 10, 2, "blink", &[0x0C; 40]).expect("firmware");
        assert_eq!(firmware.blocks, 3);
        assert_eq!(firmware.data.len(), 48);
        assert_eq!(firmware.data[40..], [0xFF; 8]);
        assert_eq!(firmware.block(2).map(|block| block.len()), Some(FIRMWARE_BLOCK_SIZE));
        assert!(firmware.block(3).is_none());
    }

    #[test]
    fn firmware_crc_is_modbus() {
        // CRC-16/MODBUS 标准校验值："123456789" → 0x4B37
        let mut image = b"123456789".to_vec();
        image.resize(FIRMWARE_BLOCK_SIZE, 0xFF);
        let firmware = FirmwareRecord::from_binary(1, 1, 1, "check", &image).expect("firmware");
        assert_eq!(firmware.blocks, 1);
        assert_eq!(firmware.crc, FIRMWARE_CRC.checksum(&image));
        assert_eq!(FIRMWARE_CRC.checksum(b"123456789"), 0x4B37);
    }

    #[test]
    fn empty_firmware_is_rejected() {
        assert!(FirmwareRecord::from_binary(1, 1, 1, "empty", &[]).is_err());
    }
}
