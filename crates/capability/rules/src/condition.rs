//! 规则条件评估
//!
//! 评估结果是未经抑制的原始布尔值。数据不足（值缺失、无法数值化）
//! 视为不触发，不作为错误上抛。

use crate::error::RuleError;
use crate::resource::ResourceValueLookup;
use domain::{CompareOperand, Operator, RuleCondition, parse_double};
use std::sync::Arc;
use tracing::warn;

/// 单次条件评估结果。
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    /// 原始触发判定
    pub raw: bool,
    /// 主资源的当前值
    pub actual: Option<String>,
}

impl Evaluation {
    fn inconclusive(actual: Option<String>) -> Self {
        Self { raw: false, actual }
    }
}

/// 比较运算。浮点相等按原生 `==` 判断，不引入容差。
///
/// 运算符不支持时返回 `None`。
pub fn compare(operator: Operator, actual: f64, reference: f64) -> Option<bool> {
    match operator {
        Operator::Gt => Some(actual > reference),
        Operator::Gte => Some(actual >= reference),
        Operator::Lt => Some(actual < reference),
        Operator::Lte => Some(actual <= reference),
        Operator::Eq => Some(actual == reference),
        Operator::Neq => Some(actual != reference),
        Operator::Unsupported => None,
    }
}

/// 区间判定：两端开闭组合成四种包含关系，再按极性取反。
pub fn threshold(
    actual: f64,
    low: f64,
    high: f64,
    include_low: bool,
    include_high: bool,
    in_range: bool,
) -> bool {
    let contained = match (include_low, include_high) {
        (true, true) => actual >= low && actual <= high,
        (true, false) => actual >= low && actual < high,
        (false, true) => actual > low && actual <= high,
        (false, false) => actual > low && actual < high,
    };
    contained == in_range
}

/// 第二资源值的百分比；先求比例再乘值，EQ/NEQ 的精确比较依赖此运算顺序。
pub fn percent_of(multiplier: f64, value: f64) -> f64 {
    multiplier / 100.0 * value
}

/// 数值化资源值：数字按三位小数解析，`true`/`false` 映射为 1/0。
pub fn numeric(value: &str) -> Option<f64> {
    if let Ok(number) = parse_double(value) {
        return Some(number);
    }
    let value = value.trim();
    if value.eq_ignore_ascii_case("true") {
        Some(1.0)
    } else if value.eq_ignore_ascii_case("false") {
        Some(0.0)
    } else {
        None
    }
}

/// 条件评估器。
#[derive(Clone)]
pub struct ConditionEvaluator {
    values: Arc<dyn ResourceValueLookup>,
}

impl ConditionEvaluator {
    pub fn new(values: Arc<dyn ResourceValueLookup>) -> Self {
        Self { values }
    }

    pub async fn evaluate(&self, condition: &RuleCondition) -> Result<Evaluation, RuleError> {
        match condition {
            RuleCondition::ThresholdRange {
                resource,
                low,
                high,
                include_low,
                include_high,
                in_range,
            } => {
                let actual = self.values.current_value(resource).await?;
                let Some(number) = actual.as_deref().and_then(numeric) else {
                    return Ok(Evaluation::inconclusive(actual));
                };
                let raw = threshold(number, *low, *high, *include_low, *include_high, *in_range);
                Ok(Evaluation { raw, actual })
            }
            RuleCondition::Compare {
                resource,
                operator,
                operand,
            } => {
                let actual = self.values.current_value(resource).await?;
                let reference = match operand {
                    CompareOperand::Resource {
                        resource: second,
                        multiplier,
                    } => self
                        .values
                        .current_value(second)
                        .await?
                        .as_deref()
                        .and_then(numeric)
                        .map(|value| percent_of(*multiplier, value)),
                    CompareOperand::Value { value } => Some(*value),
                };
                let (Some(number), Some(reference)) =
                    (actual.as_deref().and_then(numeric), reference)
                else {
                    return Ok(Evaluation::inconclusive(actual));
                };
                match compare(*operator, number, reference) {
                    Some(raw) => Ok(Evaluation { raw, actual }),
                    None => {
                        warn!(target: "hc.rules", operator = ?operator, "unsupported_operator");
                        Ok(Evaluation::inconclusive(actual))
                    }
                }
            }
        }
    }
}
