//! 消息监视循环
//!
//! 唯一的队列消费者：取出一条消息，按所属网关的网络类型交给解码器，
//! 队列仍非空时按节拍休眠，避免半双工链路拥塞。所有设备状态变更都在
//! 这一条循环里串行发生。
//!
//! 终止是协作式的：取消令牌只在消息之间被观察，正在处理的消息会先完成。

use crate::decoder::MessageDecoder;
use crate::error::PipelineError;
use domain::{NetworkType, RawMessage};
use hc_ingest::RawMessageQueue;
use hc_protocol::GatewayRegistry;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, error, info, info_span, warn};

pub const DEFAULT_PACING: Duration = Duration::from_millis(30);
pub const DEFAULT_SHUTDOWN_CEILING: Duration = Duration::from_secs(300);

/// 消息监视器。
pub struct MessageMonitor {
    queue: Arc<RawMessageQueue>,
    gateways: Arc<GatewayRegistry>,
    decoders: HashMap<NetworkType, Arc<dyn MessageDecoder>>,
    pacing: Duration,
}

impl MessageMonitor {
    pub fn new(queue: Arc<RawMessageQueue>, gateways: Arc<GatewayRegistry>, pacing: Duration) -> Self {
        Self {
            queue,
            gateways,
            decoders: HashMap::new(),
            pacing,
        }
    }

    pub fn with_decoder(mut self, decoder: Arc<dyn MessageDecoder>) -> Self {
        self.decoders.insert(decoder.network_type(), decoder);
        self
    }

    /// 处理单条消息；任何失败都只记录，不向上传播。
    pub async fn process(&self, message: RawMessage) {
        hc_telemetry::record_raw_message();
        let span = info_span!(
            "raw_message",
            trace_id = %hc_telemetry::new_trace_id(),
            gateway_id = message.gateway_id,
            node_id = message.node_id,
        );

        let Some(gateway) = self.gateways.get(message.gateway_id) else {
            hc_telemetry::record_dropped_no_gateway();
            span.in_scope(|| {
                warn!(target: "hc.monitor", gateway_id = message.gateway_id, "gateway_missing_message_dropped");
            });
            return;
        };
        let Some(decoder) = self.decoders.get(&gateway.network_type()).cloned() else {
            span.in_scope(|| {
                warn!(target: "hc.monitor", network = ?gateway.network_type(), "decoder_missing_message_dropped");
            });
            return;
        };

        // 解码在独立任务中执行，handler panic 不会带走循环
        let outcome = tokio::spawn(
            async move { decoder.decode(gateway.as_ref(), message).await }.instrument(span.clone()),
        )
        .await;

        let _entered = span.enter();
        match outcome {
            Ok(Ok(())) => {}
            Ok(Err(err)) => report_failure(&err),
            Err(err) => error!(target: "hc.monitor", error = %err, "message_handler_panicked"),
        }
    }

    /// 启动监视循环。
    pub fn start(self, cancel: CancellationToken) -> MonitorHandle {
        let (terminated_tx, terminated_rx) = watch::channel(false);
        let loop_cancel = cancel.clone();
        tokio::spawn(async move {
            self.run(loop_cancel).await;
            let _ = terminated_tx.send(true);
        });
        MonitorHandle {
            cancel,
            terminated: terminated_rx,
        }
    }

    async fn run(&self, cancel: CancellationToken) {
        info!(target: "hc.monitor", pacing_ms = self.pacing.as_millis() as u64, "message_monitor_started");
        loop {
            let message = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                message = self.queue.take() => message,
            };
            self.process(message).await;

            if !self.queue.is_empty() && !self.pacing.is_zero() {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(self.pacing) => {}
                }
            }
        }
        info!(target: "hc.monitor", pending = self.queue.len(), "message_monitor_terminated");
    }
}

fn report_failure(err: &PipelineError) {
    match err {
        PipelineError::Transport(_) => {
            hc_telemetry::record_transport_failure();
            error!(target: "hc.monitor", error = %err, "message_transport_failed");
        }
        PipelineError::Decode(_) => {
            hc_telemetry::record_decode_failure();
            warn!(target: "hc.monitor", error = %err, "message_decode_failed");
        }
        other => warn!(target: "hc.monitor", error = %other, "message_processing_failed"),
    }
}

/// 运行中的监视循环。
pub struct MonitorHandle {
    cancel: CancellationToken,
    terminated: watch::Receiver<bool>,
}

impl MonitorHandle {
    pub fn is_terminated(&self) -> bool {
        *self.terminated.borrow()
    }

    /// 请求终止并等待循环退出；超过上限返回 `false`。
    pub async fn shutdown(mut self, ceiling: Duration) -> bool {
        self.cancel.cancel();
        let waited = tokio::time::timeout(ceiling, self.terminated.wait_for(|done| *done)).await;
        match waited {
            Ok(_) => {
                debug!(target: "hc.monitor", "message_monitor_joined");
                true
            }
            Err(_) => {
                warn!(
                    target: "hc.monitor",
                    ceiling_ms = ceiling.as_millis() as u64,
                    "message_monitor_shutdown_timeout"
                );
                false
            }
        }
    }
}
