use crate::device::ResourceRef;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// 比较运算符。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Operator {
    Gt,
    Gte,
    Lt,
    Lte,
    Eq,
    Neq,
    #[serde(other)]
    Unsupported,
}

/// 比较右操作数。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CompareOperand {
    /// 资源值 × multiplier / 100。
    Resource {
        resource: ResourceRef,
        #[serde(default = "default_multiplier")]
        multiplier: f64,
    },
    /// 固定值。
    Value { value: f64 },
}

fn default_multiplier() -> f64 {
    100.0
}

/// 规则条件。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RuleCondition {
    ThresholdRange {
        resource: ResourceRef,
        low: f64,
        high: f64,
        include_low: bool,
        include_high: bool,
        /// true：区间内触发；false：区间外触发。
        in_range: bool,
    },
    Compare {
        resource: ResourceRef,
        operator: Operator,
        operand: CompareOperand,
    },
}

impl RuleCondition {
    /// 条件引用的全部资源。
    pub fn resources(&self) -> Vec<ResourceRef> {
        match self {
            Self::ThresholdRange { resource, .. } => vec![*resource],
            Self::Compare {
                resource, operand, ..
            } => match operand {
                CompareOperand::Resource {
                    resource: second, ..
                } => vec![*resource, *second],
                CompareOperand::Value { .. } => vec![*resource],
            },
        }
    }
}

/// 抑制策略。
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DampeningPolicy {
    /// 不抑制。
    #[default]
    None,
    /// 连续 `occurrences` 次为真才触发。
    Consecutive { occurrences: u32 },
    /// 最近 `evaluations` 次中至少 `occurrences` 次为真。
    LastNEvaluations { occurrences: u32, evaluations: u32 },
    /// 持续为真 `active_ms` 毫秒后触发。
    ActiveTime { active_ms: i64 },
    #[serde(other)]
    Unsupported,
}

/// 抑制累积状态（随规则持久化）。
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DampeningState {
    #[serde(default)]
    pub consecutive: u32,
    #[serde(default)]
    pub active_since_ms: Option<i64>,
    #[serde(default)]
    pub window: VecDeque<bool>,
}

/// 规则触发后的动作。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RuleOperation {
    /// 向传感器变量发送 Set 载荷。
    SendPayload {
        sensor_value_id: u64,
        payload: String,
        #[serde(default)]
        delay_ms: u64,
    },
    /// 通知（由 NotificationSender 投递）。
    Notify { subject: String, message: String },
}

/// 规则定义。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleDefinition {
    pub id: u64,
    pub name: String,
    pub enabled: bool,
    pub condition: RuleCondition,
    #[serde(default)]
    pub dampening: DampeningPolicy,
    #[serde(default)]
    pub dampening_state: DampeningState,
    #[serde(default)]
    pub triggered: bool,
    #[serde(default)]
    pub last_trigger_ms: Option<i64>,
    #[serde(default)]
    pub last_actual_value: Option<String>,
    #[serde(default)]
    pub operations: Vec<RuleOperation>,
}

impl RuleDefinition {
    pub fn references(&self, resource: &ResourceRef) -> bool {
        self.condition.resources().contains(resource)
    }
}
