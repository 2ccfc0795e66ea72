//! 载荷转发：源变量收到 Set 值后复制到配置的目标变量。

use hc_rules::PayloadSender;
use hc_storage::{ForwardPayloadStore, StorageError};
use std::sync::Arc;
use tracing::{debug, warn};

/// 载荷转发服务。
pub struct ForwardPayloadService {
    forwards: Arc<dyn ForwardPayloadStore>,
    sender: Arc<dyn PayloadSender>,
}

impl ForwardPayloadService {
    pub fn new(forwards: Arc<dyn ForwardPayloadStore>, sender: Arc<dyn PayloadSender>) -> Self {
        Self { forwards, sender }
    }

    /// 转发到全部启用的目标，返回成功条数。单个目标失败不影响其余目标。
    pub async fn forward(
        &self,
        source_sensor_value_id: u64,
        payload: &str,
    ) -> Result<usize, StorageError> {
        let targets = self
            .forwards
            .list_forward_payloads(source_sensor_value_id)
            .await?;
        let mut sent = 0;
        for target in targets.iter().filter(|target| target.enabled) {
            match self
                .sender
                .send_payload(target.target_sensor_value_id, payload)
                .await
            {
                Ok(()) => {
                    sent += 1;
                    debug!(
                        target: "hc.worker",
                        forward_id = target.id,
                        source = source_sensor_value_id,
                        destination = target.target_sensor_value_id,
                        "payload_forwarded"
                    );
                }
                Err(err) => warn!(
                    target: "hc.worker",
                    forward_id = target.id,
                    error = %err,
                    "payload_forward_failed"
                ),
            }
        }
        Ok(sent)
    }
}
