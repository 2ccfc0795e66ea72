//! 规则动作：发送载荷与通知

use crate::error::RuleError;
use async_trait::async_trait;
use domain::{MessageType, RawMessage, RuleDefinition, RuleOperation};
use hc_ingest::RawMessageQueue;
use hc_storage::DeviceRegistry;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// 通知投递。
#[async_trait]
pub trait NotificationSender: Send + Sync {
    async fn send(&self, subject: &str, message: &str) -> Result<(), RuleError>;
}

/// 以结构化日志投递通知。
#[derive(Debug, Default)]
pub struct LogNotificationSender;

#[async_trait]
impl NotificationSender for LogNotificationSender {
    async fn send(&self, subject: &str, message: &str) -> Result<(), RuleError> {
        info!(target: "hc.rules", subject, body = %message, "notification_sent");
        Ok(())
    }
}

/// 向传感器变量发送 Set 载荷。
#[async_trait]
pub trait PayloadSender: Send + Sync {
    async fn send_payload(&self, sensor_value_id: u64, payload: &str) -> Result<(), RuleError>;
}

/// 将 Set 载荷作为出站消息放入原始消息队列，由监视循环写出。
pub struct QueuePayloadSender {
    registry: Arc<dyn DeviceRegistry>,
    queue: Arc<RawMessageQueue>,
}

impl QueuePayloadSender {
    pub fn new(registry: Arc<dyn DeviceRegistry>, queue: Arc<RawMessageQueue>) -> Self {
        Self { registry, queue }
    }
}

#[async_trait]
impl PayloadSender for QueuePayloadSender {
    async fn send_payload(&self, sensor_value_id: u64, payload: &str) -> Result<(), RuleError> {
        let target = self
            .registry
            .get_sensor_value_by_id(sensor_value_id)
            .await?
            .ok_or_else(|| RuleError::NotFound(format!("sensor value {sensor_value_id}")))?;
        let key = target.sensor_key;
        self.queue.put(RawMessage::outbound(
            key.node.gateway_id,
            key.node.node_id,
            key.sensor_id,
            MessageType::Set,
            target.variable_type.code(),
            payload,
        ));
        Ok(())
    }
}

/// 规则状态翻转时的动作执行。
#[async_trait]
pub trait OperationExecutor: Send + Sync {
    async fn on_triggered(&self, rule: &RuleDefinition);

    async fn on_untriggered(&self, rule: &RuleDefinition);
}

/// 默认动作执行器。单个动作失败只记录告警，不影响其余动作。
pub struct DefaultOperationExecutor {
    payloads: Arc<dyn PayloadSender>,
    notifications: Arc<dyn NotificationSender>,
}

impl DefaultOperationExecutor {
    pub fn new(
        payloads: Arc<dyn PayloadSender>,
        notifications: Arc<dyn NotificationSender>,
    ) -> Self {
        Self {
            payloads,
            notifications,
        }
    }

    async fn execute(&self, operation: &RuleOperation) -> Result<(), RuleError> {
        match operation {
            RuleOperation::SendPayload {
                sensor_value_id,
                payload,
                delay_ms,
            } => {
                if *delay_ms > 0 {
                    tokio::time::sleep(Duration::from_millis(*delay_ms)).await;
                }
                self.payloads.send_payload(*sensor_value_id, payload).await
            }
            RuleOperation::Notify { subject, message } => {
                self.notifications.send(subject, message).await
            }
        }
    }
}

#[async_trait]
impl OperationExecutor for DefaultOperationExecutor {
    async fn on_triggered(&self, rule: &RuleDefinition) {
        for operation in &rule.operations {
            if let Err(err) = self.execute(operation).await {
                warn!(
                    target: "hc.rules",
                    rule_id = rule.id,
                    error = %err,
                    "rule_operation_failed"
                );
            }
        }
    }

    async fn on_untriggered(&self, rule: &RuleDefinition) {
        info!(target: "hc.rules", rule_id = rule.id, rule_name = %rule.name, "rule_untriggered");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::{SensorKey, VariableType};
    use hc_storage::InMemoryDeviceRegistry;

    #[tokio::test]
    async fn payload_is_enqueued_as_outbound_set() {
        let registry = Arc::new(InMemoryDeviceRegistry::new());
        let queue = Arc::new(RawMessageQueue::default());
        let target = registry
            .upsert_sensor_value(SensorKey::new(2, 9, 1), VariableType::Status, "0", 1)
            .await
            .expect("value");
        let sender = QueuePayloadSender::new(registry, queue.clone());

        sender.send_payload(target.id, "1").await.expect("send");

        let message = queue.try_take().expect("queued");
        assert!(message.is_outbound());
        assert_eq!((message.gateway_id, message.node_id, message.sensor_id), (2, 9, 1));
        assert_eq!(message.message_type, MessageType::Set.code());
        assert_eq!(message.sub_type, VariableType::Status.code());
        assert_eq!(message.payload, "1");
        assert!(!message.ack);

        assert!(matches!(
            sender.send_payload(999, "1").await,
            Err(RuleError::NotFound(_))
        ));
        assert!(queue.is_empty());
    }
}
