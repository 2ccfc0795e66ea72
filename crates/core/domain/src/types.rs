//! 线协议子类型表。
//!
//! 每个表的下标即协议编码，枚举判别值与表顺序一致（由单元测试校验）。

use serde::{Deserialize, Serialize};

/// 载荷类型。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayloadType {
    Double,
    Boolean,
    Integer,
    Float,
    Byte,
    Hex,
    String,
}

impl PayloadType {
    /// 时序样本归属。
    pub fn metric_type(self) -> MetricType {
        match self {
            Self::Double => MetricType::Double,
            Self::Boolean => MetricType::Binary,
            _ => MetricType::None,
        }
    }
}

/// 时序样本类型。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricType {
    Double,
    Binary,
    None,
}

/// 传感器变量类型（Set/Request 子类型）。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VariableType {
    Temp = 0,
    Hum,
    Status,
    Percentage,
    Pressure,
    Forecast,
    Rain,
    RainRate,
    Wind,
    Gust,
    Direction,
    Uv,
    Weight,
    Distance,
    Impedance,
    Armed,
    Tripped,
    Watt,
    Kwh,
    SceneOn,
    SceneOff,
    HvacFlowState,
    HvacSpeed,
    LightLevel,
    Var1,
    Var2,
    Var3,
    Var4,
    Var5,
    Up,
    Down,
    Stop,
    IrSend,
    IrReceive,
    Flow,
    Volume,
    LockStatus,
    Level,
    Voltage,
    Current,
    Rgb,
    Rgbw,
    Id,
    UnitPrefix,
    HvacSetpointCool,
    HvacSetpointHeat,
    HvacFlowMode,
    Text,
    Custom,
    Position,
    IrRecord,
}

const VARIABLE_TYPES: [(VariableType, &str, PayloadType); 51] = [
    (VariableType::Temp, "V_TEMP", PayloadType::Double),
    (VariableType::Hum, "V_HUM", PayloadType::Double),
    (VariableType::Status, "V_STATUS", PayloadType::Boolean),
    (VariableType::Percentage, "V_PERCENTAGE", PayloadType::Double),
    (VariableType::Pressure, "V_PRESSURE", PayloadType::Double),
    (VariableType::Forecast, "V_FORECAST", PayloadType::String),
    (VariableType::Rain, "V_RAIN", PayloadType::Double),
    (VariableType::RainRate, "V_RAINRATE", PayloadType::Double),
    (VariableType::Wind, "V_WIND", PayloadType::Double),
    (VariableType::Gust, "V_GUST", PayloadType::Double),
    (VariableType::Direction, "V_DIRECTION", PayloadType::Double),
    (VariableType::Uv, "V_UV", PayloadType::Double),
    (VariableType::Weight, "V_WEIGHT", PayloadType::Double),
    (VariableType::Distance, "V_DISTANCE", PayloadType::Double),
    (VariableType::Impedance, "V_IMPEDANCE", PayloadType::Double),
    (VariableType::Armed, "V_ARMED", PayloadType::Boolean),
    (VariableType::Tripped, "V_TRIPPED", PayloadType::Boolean),
    (VariableType::Watt, "V_WATT", PayloadType::Double),
    (VariableType::Kwh, "V_KWH", PayloadType::Double),
    (VariableType::SceneOn, "V_SCENE_ON", PayloadType::Boolean),
    (VariableType::SceneOff, "V_SCENE_OFF", PayloadType::Boolean),
    (VariableType::HvacFlowState, "V_HVAC_FLOW_STATE", PayloadType::String),
    (VariableType::HvacSpeed, "V_HVAC_SPEED", PayloadType::String),
    (VariableType::LightLevel, "V_LIGHT_LEVEL", PayloadType::Double),
    (VariableType::Var1, "V_VAR1", PayloadType::String),
    (VariableType::Var2, "V_VAR2", PayloadType::String),
    (VariableType::Var3, "V_VAR3", PayloadType::String),
    (VariableType::Var4, "V_VAR4", PayloadType::String),
    (VariableType::Var5, "V_VAR5", PayloadType::String),
    (VariableType::Up, "V_UP", PayloadType::Double),
    (VariableType::Down, "V_DOWN", PayloadType::Double),
    (VariableType::Stop, "V_STOP", PayloadType::Double),
    (VariableType::IrSend, "V_IR_SEND", PayloadType::Hex),
    (VariableType::IrReceive, "V_IR_RECEIVE", PayloadType::Hex),
    (VariableType::Flow, "V_FLOW", PayloadType::Double),
    (VariableType::Volume, "V_VOLUME", PayloadType::Double),
    (VariableType::LockStatus, "V_LOCK_STATUS", PayloadType::Boolean),
    (VariableType::Level, "V_LEVEL", PayloadType::Double),
    (VariableType::Voltage, "V_VOLTAGE", PayloadType::Double),
    (VariableType::Current, "V_CURRENT", PayloadType::Double),
    (VariableType::Rgb, "V_RGB", PayloadType::Hex),
    (VariableType::Rgbw, "V_RGBW", PayloadType::Hex),
    (VariableType::Id, "V_ID", PayloadType::String),
    (VariableType::UnitPrefix, "V_UNIT_PREFIX", PayloadType::String),
    (VariableType::HvacSetpointCool, "V_HVAC_SETPOINT_COOL", PayloadType::String),
    (VariableType::HvacSetpointHeat, "V_HVAC_SETPOINT_HEAT", PayloadType::String),
    (VariableType::HvacFlowMode, "V_HVAC_FLOW_MODE", PayloadType::String),
    (VariableType::Text, "V_TEXT", PayloadType::String),
    (VariableType::Custom, "V_CUSTOM", PayloadType::String),
    (VariableType::Position, "V_POSITION", PayloadType::String),
    (VariableType::IrRecord, "V_IR_RECORD", PayloadType::String),
];

impl VariableType {
    pub fn from_code(code: u8) -> Option<Self> {
        VARIABLE_TYPES.get(usize::from(code)).map(|entry| entry.0)
    }

    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn name(self) -> &'static str {
        VARIABLE_TYPES[self as usize].1
    }

    pub fn payload_type(self) -> PayloadType {
        VARIABLE_TYPES[self as usize].2
    }

    pub fn metric_type(self) -> MetricType {
        self.payload_type().metric_type()
    }
}

/// 设备类别（Presentation 子类型）。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PresentationType {
    Door = 0,
    Motion,
    Smoke,
    Binary,
    Dimmer,
    Cover,
    Temp,
    Hum,
    Baro,
    Wind,
    Rain,
    Uv,
    Weight,
    Power,
    Heater,
    Distance,
    LightLevel,
    ArduinoNode,
    ArduinoRepeaterNode,
    Lock,
    Ir,
    Water,
    AirQuality,
    Custom,
    Dust,
    SceneController,
    RgbLight,
    RgbwLight,
    ColorSensor,
    Hvac,
    Multimeter,
    Sprinkler,
    WaterLeak,
    Sound,
    Vibration,
    Moisture,
    Info,
    Gas,
    Gps,
}

const PRESENTATION_TYPES: [(PresentationType, &str); 39] = [
    (PresentationType::Door, "S_DOOR"),
    (PresentationType::Motion, "S_MOTION"),
    (PresentationType::Smoke, "S_SMOKE"),
    (PresentationType::Binary, "S_BINARY"),
    (PresentationType::Dimmer, "S_DIMMER"),
    (PresentationType::Cover, "S_COVER"),
    (PresentationType::Temp, "S_TEMP"),
    (PresentationType::Hum, "S_HUM"),
    (PresentationType::Baro, "S_BARO"),
    (PresentationType::Wind, "S_WIND"),
    (PresentationType::Rain, "S_RAIN"),
    (PresentationType::Uv, "S_UV"),
    (PresentationType::Weight, "S_WEIGHT"),
    (PresentationType::Power, "S_POWER"),
    (PresentationType::Heater, "S_HEATER"),
    (PresentationType::Distance, "S_DISTANCE"),
    (PresentationType::LightLevel, "S_LIGHT_LEVEL"),
    (PresentationType::ArduinoNode, "S_ARDUINO_NODE"),
    (PresentationType::ArduinoRepeaterNode, "S_ARDUINO_REPEATER_NODE"),
    (PresentationType::Lock, "S_LOCK"),
    (PresentationType::Ir, "S_IR"),
    (PresentationType::Water, "S_WATER"),
    (PresentationType::AirQuality, "S_AIR_QUALITY"),
    (PresentationType::Custom, "S_CUSTOM"),
    (PresentationType::Dust, "S_DUST"),
    (PresentationType::SceneController, "S_SCENE_CONTROLLER"),
    (PresentationType::RgbLight, "S_RGB_LIGHT"),
    (PresentationType::RgbwLight, "S_RGBW_LIGHT"),
    (PresentationType::ColorSensor, "S_COLOR_SENSOR"),
    (PresentationType::Hvac, "S_HVAC"),
    (PresentationType::Multimeter, "S_MULTIMETER"),
    (PresentationType::Sprinkler, "S_SPRINKLER"),
    (PresentationType::WaterLeak, "S_WATER_LEAK"),
    (PresentationType::Sound, "S_SOUND"),
    (PresentationType::Vibration, "S_VIBRATION"),
    (PresentationType::Moisture, "S_MOISTURE"),
    (PresentationType::Info, "S_INFO"),
    (PresentationType::Gas, "S_GAS"),
    (PresentationType::Gps, "S_GPS"),
];

impl PresentationType {
    pub fn from_code(code: u8) -> Option<Self> {
        PRESENTATION_TYPES.get(usize::from(code)).map(|entry| entry.0)
    }

    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn name(self) -> &'static str {
        PRESENTATION_TYPES[self as usize].1
    }
}

/// 内部消息子类型。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InternalType {
    BatteryLevel = 0,
    Time,
    Version,
    IdRequest,
    IdResponse,
    InclusionMode,
    Config,
    FindParent,
    FindParentResponse,
    LogMessage,
    Children,
    SketchName,
    SketchVersion,
    Reboot,
    GatewayReady,
    RequestSigning,
    GetNonce,
    GetNonceResponse,
    Heartbeat,
    Presentation,
    Discover,
    DiscoverResponse,
    HeartbeatResponse,
}

const INTERNAL_TYPES: [(InternalType, &str); 23] = [
    (InternalType::BatteryLevel, "I_BATTERY_LEVEL"),
    (InternalType::Time, "I_TIME"),
    (InternalType::Version, "I_VERSION"),
    (InternalType::IdRequest, "I_ID_REQUEST"),
    (InternalType::IdResponse, "I_ID_RESPONSE"),
    (InternalType::InclusionMode, "I_INCLUSION_MODE"),
    (InternalType::Config, "I_CONFIG"),
    (InternalType::FindParent, "I_FIND_PARENT"),
    (InternalType::FindParentResponse, "I_FIND_PARENT_RESPONSE"),
    (InternalType::LogMessage, "I_LOG_MESSAGE"),
    (InternalType::Children, "I_CHILDREN"),
    (InternalType::SketchName, "I_SKETCH_NAME"),
    (InternalType::SketchVersion, "I_SKETCH_VERSION"),
    (InternalType::Reboot, "I_REBOOT"),
    (InternalType::GatewayReady, "I_GATEWAY_READY"),
    (InternalType::RequestSigning, "I_REQUEST_SIGNING"),
    (InternalType::GetNonce, "I_GET_NONCE"),
    (InternalType::GetNonceResponse, "I_GET_NONCE_RESPONSE"),
    (InternalType::Heartbeat, "I_HEARTBEAT"),
    (InternalType::Presentation, "I_PRESENTATION"),
    (InternalType::Discover, "I_DISCOVER"),
    (InternalType::DiscoverResponse, "I_DISCOVER_RESPONSE"),
    (InternalType::HeartbeatResponse, "I_HEARTBEAT_RESPONSE"),
];

impl InternalType {
    pub fn from_code(code: u8) -> Option<Self> {
        INTERNAL_TYPES.get(usize::from(code)).map(|entry| entry.0)
    }

    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn name(self) -> &'static str {
        INTERNAL_TYPES[self as usize].1
    }
}

/// 流消息子类型（固件传输等）。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StreamType {
    FirmwareConfigRequest = 0,
    FirmwareConfigResponse,
    FirmwareRequest,
    FirmwareResponse,
    Sound,
    Image,
}

const STREAM_TYPES: [(StreamType, &str); 6] = [
    (StreamType::FirmwareConfigRequest, "ST_FIRMWARE_CONFIG_REQUEST"),
    (StreamType::FirmwareConfigResponse, "ST_FIRMWARE_CONFIG_RESPONSE"),
    (StreamType::FirmwareRequest, "ST_FIRMWARE_REQUEST"),
    (StreamType::FirmwareResponse, "ST_FIRMWARE_RESPONSE"),
    (StreamType::Sound, "ST_SOUND"),
    (StreamType::Image, "ST_IMAGE"),
];

impl StreamType {
    pub fn from_code(code: u8) -> Option<Self> {
        STREAM_TYPES.get(usize::from(code)).map(|entry| entry.0)
    }

    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn name(self) -> &'static str {
        STREAM_TYPES[self as usize].1
    }
}
