use domain::{
    CompareOperand, DampeningPolicy, Direction, InternalType, MessageError, MessageKind,
    MessageType, Operator, RawMessage, ResourceRef, RuleCondition, RuleDefinition, VariableType,
};

#[test]
fn raw_message_kind_decodes_sub_types() {
    let message = RawMessage::inbound(1, 12, 3, 1, false, 0, "21.5");
    assert_eq!(message.kind(), Ok(MessageKind::Set(VariableType::Temp)));

    let heartbeat = RawMessage::inbound(1, 12, 255, 3, false, 18, "");
    assert_eq!(
        heartbeat.kind(),
        Ok(MessageKind::Internal(InternalType::Heartbeat))
    );
    assert!(heartbeat.is_node_broadcast());
}

#[test]
fn raw_message_kind_rejects_unknown_codes() {
    let unknown_type = RawMessage::inbound(1, 12, 3, 9, false, 0, "");
    assert_eq!(unknown_type.kind(), Err(MessageError::UnknownMessageType(9)));

    let unknown_sub = RawMessage::inbound(1, 12, 3, 4, false, 42, "");
    assert_eq!(
        unknown_sub.kind(),
        Err(MessageError::UnknownSubType {
            message_type: MessageType::Stream,
            sub_type: 42,
        })
    );
}

#[test]
fn reply_builds_new_outbound_message() {
    let request = RawMessage::inbound(7, 12, 3, 2, true, 2, "");
    let reply = request.reply(MessageType::Set, 2, "1");

    assert_eq!(reply.gateway_id, 7);
    assert_eq!(reply.node_id, 12);
    assert_eq!(reply.sensor_id, 3);
    assert_eq!(reply.message_type, MessageType::Set.code());
    assert!(!reply.ack);
    assert_eq!(reply.direction, Direction::Outbound);
    assert_eq!(request.direction, Direction::Inbound);
    assert_eq!(request.payload, "");
}

#[test]
fn rule_definition_from_json() {
    let json = r#"{
        "id": 4,
        "name": "power over half",
        "enabled": true,
        "condition": {
            "type": "compare",
            "resource": { "kind": "sensor_variable", "id": 10 },
            "operator": "GT",
            "operand": {
                "type": "resource",
                "resource": { "kind": "sensor_variable", "id": 11 },
                "multiplier": 50.0
            }
        },
        "dampening": { "type": "consecutive", "occurrences": 3 }
    }"#;
    let rule: RuleDefinition = serde_json::from_str(json).expect("rule");

    assert!(rule.references(&ResourceRef::SensorVariable { id: 11 }));
    assert!(!rule.triggered);
    assert_eq!(rule.dampening, DampeningPolicy::Consecutive { occurrences: 3 });
    match rule.condition {
        RuleCondition::Compare {
            operator, operand, ..
        } => {
            assert_eq!(operator, Operator::Gt);
            assert_eq!(
                operand,
                CompareOperand::Resource {
                    resource: ResourceRef::SensorVariable { id: 11 },
                    multiplier: 50.0,
                }
            );
        }
        other => panic!("unexpected condition: {other:?}"),
    }
}

#[test]
fn unknown_policy_and_operator_deserialize_as_unsupported() {
    let policy: DampeningPolicy =
        serde_json::from_str(r#"{ "type": "moon_phase" }"#).expect("policy");
    assert_eq!(policy, DampeningPolicy::Unsupported);

    let operator: Operator = serde_json::from_str(r#""LIKE""#).expect("operator");
    assert_eq!(operator, Operator::Unsupported);
}
