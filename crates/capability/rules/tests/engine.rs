use async_trait::async_trait;
use domain::{
    CompareOperand, DampeningPolicy, Operator, ResourceRef, RuleCondition, RuleDefinition,
    RuleOperation, SensorKey, VariableType,
};
use hc_ingest::RawMessageQueue;
use hc_rules::{
    ConditionEvaluator, DefaultOperationExecutor, NotificationSender, OperationExecutor,
    QueuePayloadSender, RuleEngine, RuleError, StoreResourceValues, ValueChangedEvent,
    ValueChangedListener,
};
use hc_storage::{
    DeviceRegistry, InMemoryDeviceRegistry, InMemoryGatewayStore, InMemoryRuleStore, RuleStore,
    StorageError,
};
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct RecordingExecutor {
    events: Mutex<Vec<(u64, bool)>>,
}

impl RecordingExecutor {
    fn events(&self) -> Vec<(u64, bool)> {
        self.events.lock().expect("lock").clone()
    }
}

#[async_trait]
impl OperationExecutor for RecordingExecutor {
    async fn on_triggered(&self, rule: &RuleDefinition) {
        self.events.lock().expect("lock").push((rule.id, true));
    }

    async fn on_untriggered(&self, rule: &RuleDefinition) {
        self.events.lock().expect("lock").push((rule.id, false));
    }
}

#[derive(Default)]
struct RecordingNotifications {
    sent: Mutex<Vec<String>>,
}

#[async_trait]
impl NotificationSender for RecordingNotifications {
    async fn send(&self, subject: &str, _message: &str) -> Result<(), RuleError> {
        self.sent.lock().expect("lock").push(subject.to_string());
        Ok(())
    }
}

fn rule(id: u64, condition: RuleCondition) -> RuleDefinition {
    RuleDefinition {
        id,
        name: format!("rule-{id}"),
        enabled: true,
        condition,
        dampening: DampeningPolicy::None,
        dampening_state: Default::default(),
        triggered: false,
        last_trigger_ms: None,
        last_actual_value: None,
        operations: Vec::new(),
    }
}

/// 每次读取都先让出一次调度的规则存储，使并发评估在读写之间交错。
struct YieldingRuleStore {
    inner: InMemoryRuleStore,
}

#[async_trait]
impl RuleStore for YieldingRuleStore {
    async fn get_rule(&self, id: u64) -> Result<Option<RuleDefinition>, StorageError> {
        tokio::task::yield_now().await;
        self.inner.get_rule(id).await
    }

    async fn list_enabled_rules_for(
        &self,
        resource: &ResourceRef,
    ) -> Result<Vec<RuleDefinition>, StorageError> {
        tokio::task::yield_now().await;
        self.inner.list_enabled_rules_for(resource).await
    }

    async fn save_rule(&self, rule: RuleDefinition) -> Result<(), StorageError> {
        self.inner.save_rule(rule).await
    }
}

struct Fixture {
    registry: Arc<InMemoryDeviceRegistry>,
    rules: Arc<dyn RuleStore>,
    executor: Arc<RecordingExecutor>,
    engine: RuleEngine,
}

fn fixture(rules: Vec<RuleDefinition>) -> Fixture {
    fixture_over(Arc::new(InMemoryRuleStore::with_rules(rules)))
}

fn yielding_fixture(rules: Vec<RuleDefinition>) -> Fixture {
    fixture_over(Arc::new(YieldingRuleStore {
        inner: InMemoryRuleStore::with_rules(rules),
    }))
}

fn fixture_over(rules: Arc<dyn RuleStore>) -> Fixture {
    let registry = Arc::new(InMemoryDeviceRegistry::new());
    let gateways = Arc::new(InMemoryGatewayStore::new());
    let executor = Arc::new(RecordingExecutor::default());
    let evaluator =
        ConditionEvaluator::new(Arc::new(StoreResourceValues::new(registry.clone(), gateways)));
    let engine = RuleEngine::new(rules.clone(), evaluator, executor.clone());
    Fixture {
        registry,
        rules,
        executor,
        engine,
    }
}

async fn set_value(registry: &InMemoryDeviceRegistry, sensor_id: u8, value: &str) -> u64 {
    registry
        .upsert_sensor_value(SensorKey::new(1, 5, sensor_id), VariableType::Temp, value, 1)
        .await
        .expect("value")
        .id
}

fn half_open_range(resource: ResourceRef) -> RuleCondition {
    RuleCondition::ThresholdRange {
        resource,
        low: 10.0,
        high: 20.0,
        include_low: true,
        include_high: false,
        in_range: true,
    }
}

#[tokio::test]
async fn threshold_range_boundaries() {
    // 第一个值记录 ID 固定为 3（节点 1、传感器 2、值 3）
    let resource = ResourceRef::SensorVariable { id: 3 };
    let f = fixture(vec![rule(1, half_open_range(resource))]);

    for (value, expected) in [("10", true), ("20", false), ("9.99", false)] {
        let id = set_value(&f.registry, 1, value).await;
        assert_eq!(id, 3);
        let current = f.rules.get_rule(1).await.expect("get").expect("rule");
        let evaluated = f.engine.evaluate_rule(current, 1_000).await.expect("evaluate");
        assert_eq!(evaluated.triggered, expected, "value {value}");
        assert_eq!(evaluated.last_actual_value.as_deref(), Some(value));
    }
}

#[tokio::test]
async fn comparison_against_percentage_of_second_resource() {
    let f = fixture(Vec::new());
    let actual_id = set_value(&f.registry, 1, "51").await;
    let reference_id = set_value(&f.registry, 2, "100").await;
    let condition = RuleCondition::Compare {
        resource: ResourceRef::SensorVariable { id: actual_id },
        operator: Operator::Gt,
        operand: CompareOperand::Resource {
            resource: ResourceRef::SensorVariable { id: reference_id },
            multiplier: 50.0,
        },
    };
    f.rules.save_rule(rule(7, condition)).await.expect("save");

    let current = f.rules.get_rule(7).await.expect("get").expect("rule");
    assert!(f.engine.evaluate_rule(current, 1).await.expect("evaluate").triggered);

    set_value(&f.registry, 1, "50").await;
    let current = f.rules.get_rule(7).await.expect("get").expect("rule");
    assert!(!f.engine.evaluate_rule(current, 2).await.expect("evaluate").triggered);
}

#[tokio::test]
async fn percentage_equality_matches_ratio_then_value() {
    let f = fixture(Vec::new());
    let actual_id = set_value(&f.registry, 1, "0.30000000000000004").await;
    let reference_id = set_value(&f.registry, 2, "3").await;
    let condition = RuleCondition::Compare {
        resource: ResourceRef::SensorVariable { id: actual_id },
        operator: Operator::Eq,
        operand: CompareOperand::Resource {
            resource: ResourceRef::SensorVariable { id: reference_id },
            multiplier: 10.0,
        },
    };
    let evaluated = f
        .engine
        .evaluate_rule(rule(8, condition), 1)
        .await
        .expect("evaluate");
    assert!(evaluated.triggered);
}

#[tokio::test]
async fn missing_second_value_is_inconclusive() {
    let f = fixture(Vec::new());
    let actual_id = set_value(&f.registry, 1, "51").await;
    let condition = RuleCondition::Compare {
        resource: ResourceRef::SensorVariable { id: actual_id },
        operator: Operator::Gt,
        operand: CompareOperand::Resource {
            resource: ResourceRef::SensorVariable { id: 404 },
            multiplier: 100.0,
        },
    };
    let evaluated = f
        .engine
        .evaluate_rule(rule(2, condition), 1)
        .await
        .expect("evaluate");
    assert!(!evaluated.triggered);
}

#[tokio::test]
async fn unsupported_operator_and_resource_fail_safe() {
    let f = fixture(Vec::new());
    let actual_id = set_value(&f.registry, 1, "51").await;
    let unsupported_operator = RuleCondition::Compare {
        resource: ResourceRef::SensorVariable { id: actual_id },
        operator: Operator::Unsupported,
        operand: CompareOperand::Value { value: 1.0 },
    };
    let evaluated = f
        .engine
        .evaluate_rule(rule(3, unsupported_operator), 1)
        .await
        .expect("evaluate");
    assert!(!evaluated.triggered);

    let unsupported_resource = half_open_range(ResourceRef::Unsupported);
    let evaluated = f
        .engine
        .evaluate_rule(rule(4, unsupported_resource), 1)
        .await
        .expect("evaluate");
    assert!(!evaluated.triggered);
    assert!(f.executor.events().is_empty());
}

#[tokio::test]
async fn transitions_reach_executor_once_per_streak() {
    let resource = ResourceRef::SensorVariable { id: 3 };
    let f = fixture(vec![rule(1, half_open_range(resource))]);
    let event = ValueChangedEvent::new(resource, 10);

    for value in ["12", "13", "25", "26", "11"] {
        set_value(&f.registry, 1, value).await;
        f.engine.on_value_changed(event.clone()).await;
    }

    assert_eq!(f.executor.events(), vec![(1, true), (1, false), (1, true)]);
    let saved = f.rules.get_rule(1).await.expect("get").expect("rule");
    assert!(saved.triggered);
    assert_eq!(saved.last_trigger_ms, Some(10));
}

#[tokio::test]
async fn consecutive_dampening_and_reenable_reset() {
    let resource = ResourceRef::SensorVariable { id: 3 };
    let mut definition = rule(1, half_open_range(resource));
    definition.dampening = DampeningPolicy::Consecutive { occurrences: 2 };
    let f = fixture(vec![definition]);
    let event = ValueChangedEvent::new(resource, 10);

    set_value(&f.registry, 1, "12").await;
    assert_eq!(f.engine.evaluate_resource(&event).await.expect("evaluate"), 1);
    assert!(f.executor.events().is_empty());
    let saved = f.rules.get_rule(1).await.expect("get").expect("rule");
    assert_eq!(saved.dampening_state.consecutive, 1);

    f.engine.set_enabled(1, false).await.expect("disable");
    assert_eq!(f.engine.evaluate_resource(&event).await.expect("evaluate"), 0);
    let reenabled = f.engine.set_enabled(1, true).await.expect("enable");
    assert_eq!(reenabled.dampening_state.consecutive, 0);

    f.engine.evaluate_resource(&event).await.expect("evaluate");
    assert!(f.executor.events().is_empty());
    f.engine.evaluate_resource(&event).await.expect("evaluate");
    assert_eq!(f.executor.events(), vec![(1, true)]);
}

#[tokio::test]
async fn concurrent_evaluations_fire_once_per_streak() {
    let resource = ResourceRef::SensorVariable { id: 3 };
    let f = yielding_fixture(vec![rule(1, half_open_range(resource))]);
    let event = ValueChangedEvent::new(resource, 10);
    set_value(&f.registry, 1, "12").await;

    tokio::join!(
        f.engine.on_value_changed(event.clone()),
        f.engine.on_value_changed(event.clone())
    );

    assert_eq!(f.executor.events(), vec![(1, true)]);
    let saved = f.rules.get_rule(1).await.expect("get").expect("rule");
    assert!(saved.triggered);
}

#[tokio::test]
async fn concurrent_evaluations_keep_every_dampening_count() {
    let resource = ResourceRef::SensorVariable { id: 3 };
    let mut definition = rule(1, half_open_range(resource));
    definition.dampening = DampeningPolicy::Consecutive { occurrences: 2 };
    let f = yielding_fixture(vec![definition]);
    let event = ValueChangedEvent::new(resource, 10);
    set_value(&f.registry, 1, "12").await;

    tokio::join!(
        f.engine.on_value_changed(event.clone()),
        f.engine.on_value_changed(event.clone())
    );

    let saved = f.rules.get_rule(1).await.expect("get").expect("rule");
    assert_eq!(saved.dampening_state.consecutive, 2);
    assert_eq!(f.executor.events(), vec![(1, true)]);
}

#[tokio::test]
async fn disable_is_not_overwritten_by_in_flight_evaluation() {
    let resource = ResourceRef::SensorVariable { id: 3 };
    let f = yielding_fixture(vec![rule(1, half_open_range(resource))]);
    let event = ValueChangedEvent::new(resource, 10);
    set_value(&f.registry, 1, "12").await;

    let (_, disabled) = tokio::join!(
        f.engine.on_value_changed(event.clone()),
        f.engine.set_enabled(1, false)
    );

    assert!(!disabled.expect("disable").enabled);
    let saved = f.rules.get_rule(1).await.expect("get").expect("rule");
    assert!(!saved.enabled);
}

#[tokio::test]
async fn edited_definition_starts_a_fresh_streak() {
    let resource = ResourceRef::SensorVariable { id: 3 };
    let mut definition = rule(1, half_open_range(resource));
    definition.dampening = DampeningPolicy::Consecutive { occurrences: 2 };
    let f = fixture(vec![definition]);
    let event = ValueChangedEvent::new(resource, 10);

    set_value(&f.registry, 1, "12").await;
    f.engine.evaluate_resource(&event).await.expect("evaluate");
    f.engine.evaluate_resource(&event).await.expect("evaluate");
    assert_eq!(f.executor.events(), vec![(1, true)]);

    let mut edited = f.rules.get_rule(1).await.expect("get").expect("rule");
    edited.name = "renamed".to_string();
    let updated = f.engine.update_rule(edited).await.expect("update");
    assert!(!updated.triggered);
    assert_eq!(updated.dampening_state.consecutive, 0);

    let saved = f.rules.get_rule(1).await.expect("get").expect("rule");
    assert_eq!(saved.name, "renamed");
    assert!(!saved.triggered);
    assert_eq!(saved.dampening_state.consecutive, 0);

    f.engine.evaluate_resource(&event).await.expect("evaluate");
    assert_eq!(f.executor.events(), vec![(1, true)]);
    f.engine.evaluate_resource(&event).await.expect("evaluate");
    assert_eq!(f.executor.events(), vec![(1, true), (1, true)]);
}

#[tokio::test]
async fn default_executor_runs_operations() {
    let registry = Arc::new(InMemoryDeviceRegistry::new());
    let queue = Arc::new(RawMessageQueue::default());
    let notifications = Arc::new(RecordingNotifications::default());
    let target = registry
        .upsert_sensor_value(SensorKey::new(1, 8, 1), VariableType::Status, "0", 1)
        .await
        .expect("target");
    let executor = DefaultOperationExecutor::new(
        Arc::new(QueuePayloadSender::new(registry.clone(), queue.clone())),
        notifications.clone(),
    );
    let mut definition = rule(9, half_open_range(ResourceRef::SensorVariable { id: 1 }));
    definition.operations = vec![
        RuleOperation::SendPayload {
            sensor_value_id: 999,
            payload: "1".to_string(),
            delay_ms: 0,
        },
        RuleOperation::SendPayload {
            sensor_value_id: target.id,
            payload: "1".to_string(),
            delay_ms: 5,
        },
        RuleOperation::Notify {
            subject: "too hot".to_string(),
            message: "living room above 30".to_string(),
        },
    ];

    executor.on_triggered(&definition).await;

    assert_eq!(queue.len(), 1);
    let message = queue.try_take().expect("message");
    assert_eq!((message.node_id, message.payload.as_str()), (8, "1"));
    assert_eq!(
        notifications.sent.lock().expect("lock").clone(),
        vec!["too hot".to_string()]
    );
}

#[test]
fn rule_definition_from_json() {
    let json = r#"{
        "id": 11,
        "name": "hot",
        "enabled": true,
        "condition": {
            "type": "compare",
            "resource": { "kind": "sensor_variable", "id": 3 },
            "operator": "GTE",
            "operand": { "type": "value", "value": 30.0 }
        },
        "dampening": { "type": "active_time", "active_ms": 60000 },
        "operations": [
            { "type": "notify", "subject": "hot", "message": "too hot" }
        ]
    }"#;
    let definition: RuleDefinition = serde_json::from_str(json).expect("rule");
    assert_eq!(definition.dampening, DampeningPolicy::ActiveTime { active_ms: 60_000 });
    assert!(!definition.triggered);
    assert!(definition.references(&ResourceRef::SensorVariable { id: 3 }));
}
