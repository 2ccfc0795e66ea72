//! 规则引擎
//!
//! 资源值变化时，对引用该资源的已启用规则逐条评估：
//! 条件 → 抑制 → 触发状态翻转 → 执行动作 → 持久化。
//! 单条规则的失败只记录日志，不中断本轮其余规则。
//! 同一规则的评估、启停与编辑按规则 ID 串行。

use crate::condition::{ConditionEvaluator, Evaluation};
use crate::dampening;
use crate::error::RuleError;
use crate::operation::OperationExecutor;
use async_trait::async_trait;
use dashmap::DashMap;
use domain::{ResourceRef, RuleDefinition};
use hc_storage::RuleStore;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// 资源值变化事件。
#[derive(Debug, Clone, PartialEq)]
pub struct ValueChangedEvent {
    pub resource: ResourceRef,
    pub timestamp_ms: i64,
}

impl ValueChangedEvent {
    pub fn new(resource: ResourceRef, timestamp_ms: i64) -> Self {
        Self {
            resource,
            timestamp_ms,
        }
    }
}

/// 资源值变化监听。
#[async_trait]
pub trait ValueChangedListener: Send + Sync {
    async fn on_value_changed(&self, event: ValueChangedEvent);
}

/// 规则引擎。
pub struct RuleEngine {
    rules: Arc<dyn RuleStore>,
    evaluator: ConditionEvaluator,
    executor: Arc<dyn OperationExecutor>,
    locks: DashMap<u64, Arc<Mutex<()>>>,
}

impl RuleEngine {
    pub fn new(
        rules: Arc<dyn RuleStore>,
        evaluator: ConditionEvaluator,
        executor: Arc<dyn OperationExecutor>,
    ) -> Self {
        Self {
            rules,
            evaluator,
            executor,
            locks: DashMap::new(),
        }
    }

    fn rule_lock(&self, rule_id: u64) -> Arc<Mutex<()>> {
        self.locks.entry(rule_id).or_default().clone()
    }

    /// 评估引用该资源的全部已启用规则，返回评估条数。
    pub async fn evaluate_resource(&self, event: &ValueChangedEvent) -> Result<usize, RuleError> {
        let rules = self.rules.list_enabled_rules_for(&event.resource).await?;
        let mut evaluated = 0;
        for listed in rules {
            let rule_id = listed.id;
            match self.evaluate_current(rule_id, event.timestamp_ms).await {
                Ok(true) => evaluated += 1,
                Ok(false) => {
                    debug!(target: "hc.rules", rule_id, "rule_skipped");
                }
                Err(err) => {
                    warn!(target: "hc.rules", rule_id, error = %err, "rule_evaluation_failed");
                }
            }
        }
        Ok(evaluated)
    }

    /// 持锁重读存储中的当前定义后评估；规则已删除或已停用时返回 false。
    async fn evaluate_current(&self, rule_id: u64, now_ms: i64) -> Result<bool, RuleError> {
        let lock = self.rule_lock(rule_id);
        let _guard = lock.lock().await;
        let Some(rule) = self.rules.get_rule(rule_id).await? else {
            return Ok(false);
        };
        if !rule.enabled {
            return Ok(false);
        }
        self.apply(rule, now_ms).await?;
        Ok(true)
    }

    /// 评估给定的规则定义并保存其触发状态与抑制状态。
    pub async fn evaluate_rule(
        &self,
        rule: RuleDefinition,
        now_ms: i64,
    ) -> Result<RuleDefinition, RuleError> {
        let lock = self.rule_lock(rule.id);
        let _guard = lock.lock().await;
        self.apply(rule, now_ms).await
    }

    // 调用方须持有该规则的锁
    async fn apply(&self, mut rule: RuleDefinition, now_ms: i64) -> Result<RuleDefinition, RuleError> {
        if !rule.enabled {
            return Ok(rule);
        }
        hc_telemetry::record_rule_evaluation();
        let evaluation = match self.evaluator.evaluate(&rule.condition).await {
            Ok(evaluation) => evaluation,
            Err(RuleError::ResourceUnavailable(reason)) => {
                warn!(target: "hc.rules", rule_id = rule.id, reason = %reason, "rule_resource_unavailable");
                Evaluation {
                    raw: false,
                    actual: None,
                }
            }
            Err(err) => return Err(err),
        };
        let triggered = dampening::apply(
            &rule.dampening,
            &mut rule.dampening_state,
            evaluation.raw,
            now_ms,
        );
        debug!(
            target: "hc.rules",
            rule_id = rule.id,
            raw = evaluation.raw,
            triggered,
            actual = ?evaluation.actual,
            "rule_evaluated"
        );
        rule.last_actual_value = evaluation.actual;

        if triggered != rule.triggered {
            rule.triggered = triggered;
            if triggered {
                rule.last_trigger_ms = Some(now_ms);
                hc_telemetry::record_rule_trigger();
                info!(target: "hc.rules", rule_id = rule.id, rule_name = %rule.name, "rule_triggered");
                self.rules.save_rule(rule.clone()).await?;
                self.executor.on_triggered(&rule).await;
                return Ok(rule);
            }
            self.rules.save_rule(rule.clone()).await?;
            self.executor.on_untriggered(&rule).await;
            return Ok(rule);
        }
        self.rules.save_rule(rule.clone()).await?;
        Ok(rule)
    }

    /// 启用/停用规则；重新启用时清空抑制状态与触发状态。
    pub async fn set_enabled(&self, rule_id: u64, enabled: bool) -> Result<RuleDefinition, RuleError> {
        let lock = self.rule_lock(rule_id);
        let _guard = lock.lock().await;
        let mut rule = self
            .rules
            .get_rule(rule_id)
            .await?
            .ok_or_else(|| RuleError::NotFound(format!("rule {rule_id}")))?;
        if enabled && !rule.enabled {
            dampening::reset(&mut rule.dampening_state);
            rule.triggered = false;
        }
        rule.enabled = enabled;
        self.rules.save_rule(rule.clone()).await?;
        Ok(rule)
    }

    /// 保存编辑后的规则定义；累积的抑制状态随之清空。
    pub async fn update_rule(&self, mut rule: RuleDefinition) -> Result<RuleDefinition, RuleError> {
        let lock = self.rule_lock(rule.id);
        let _guard = lock.lock().await;
        dampening::reset(&mut rule.dampening_state);
        rule.triggered = false;
        self.rules.save_rule(rule.clone()).await?;
        Ok(rule)
    }
}

#[async_trait]
impl ValueChangedListener for RuleEngine {
    async fn on_value_changed(&self, event: ValueChangedEvent) {
        if let Err(err) = self.evaluate_resource(&event).await {
            warn!(
                target: "hc.rules",
                resource = ?event.resource,
                error = %err,
                "rule_lookup_failed"
            );
        }
    }
}
