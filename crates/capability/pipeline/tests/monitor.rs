use async_trait::async_trait;
use domain::{NetworkType, RawMessage};
use hc_ingest::RawMessageQueue;
use hc_pipeline::{MessageDecoder, MessageMonitor, PipelineError};
use hc_protocol::{ConnectionStatus, GatewayConnection, GatewayRegistry, LinkState, ProtocolError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

struct StubGateway;

#[async_trait]
impl GatewayConnection for StubGateway {
    fn gateway_id(&self) -> u32 {
        1
    }

    fn network_type(&self) -> NetworkType {
        NetworkType::MySensors
    }

    async fn write(&self, _message: &RawMessage) -> Result<(), ProtocolError> {
        Ok(())
    }

    fn status(&self) -> ConnectionStatus {
        ConnectionStatus::new(LinkState::Connected, "stub")
    }

    async fn close(&self) {}
}

/// 记录节点号；node 13 panic，node 66 返回传输错误。
#[derive(Default)]
struct RecordingDecoder {
    seen: Mutex<Vec<u8>>,
}

impl RecordingDecoder {
    fn seen(&self) -> Vec<u8> {
        self.seen.lock().expect("lock").clone()
    }
}

#[async_trait]
impl MessageDecoder for RecordingDecoder {
    fn network_type(&self) -> NetworkType {
        NetworkType::MySensors
    }

    async fn decode(
        &self,
        _gateway: &dyn GatewayConnection,
        message: RawMessage,
    ) -> Result<(), PipelineError> {
        if message.node_id == 13 {
            panic!("handler failure");
        }
        self.seen.lock().expect("lock").push(message.node_id);
        if message.node_id == 66 {
            return Err(PipelineError::Transport(ProtocolError::Closed));
        }
        Ok(())
    }
}

/// 记录每条消息的解码时刻。
#[derive(Default)]
struct TimedDecoder {
    seen: Mutex<Vec<(u8, Instant)>>,
}

impl TimedDecoder {
    fn seen(&self) -> Vec<(u8, Instant)> {
        self.seen.lock().expect("lock").clone()
    }
}

#[async_trait]
impl MessageDecoder for TimedDecoder {
    fn network_type(&self) -> NetworkType {
        NetworkType::MySensors
    }

    async fn decode(
        &self,
        _gateway: &dyn GatewayConnection,
        message: RawMessage,
    ) -> Result<(), PipelineError> {
        self.seen
            .lock()
            .expect("lock")
            .push((message.node_id, Instant::now()));
        Ok(())
    }
}

/// 解码挂起，直到闸门放行。
#[derive(Default)]
struct GatedDecoder {
    entered: AtomicBool,
    gate: Notify,
}

#[async_trait]
impl MessageDecoder for GatedDecoder {
    fn network_type(&self) -> NetworkType {
        NetworkType::MySensors
    }

    async fn decode(
        &self,
        _gateway: &dyn GatewayConnection,
        _message: RawMessage,
    ) -> Result<(), PipelineError> {
        self.entered.store(true, Ordering::SeqCst);
        self.gate.notified().await;
        Ok(())
    }
}

fn message(gateway_id: u32, node_id: u8) -> RawMessage {
    RawMessage::inbound(gateway_id, node_id, 1, 1, false, 2, "1")
}

fn monitor(decoder: Arc<RecordingDecoder>) -> (Arc<RawMessageQueue>, MessageMonitor) {
    paced_monitor(decoder, Duration::from_millis(1))
}

fn paced_monitor(
    decoder: Arc<dyn MessageDecoder>,
    pacing: Duration,
) -> (Arc<RawMessageQueue>, MessageMonitor) {
    let queue = Arc::new(RawMessageQueue::new());
    let gateways = Arc::new(GatewayRegistry::new());
    gateways.register(Arc::new(StubGateway));
    let monitor = MessageMonitor::new(queue.clone(), gateways, pacing).with_decoder(decoder);
    (queue, monitor)
}

async fn wait_until(condition: impl Fn() -> bool) {
    tokio::time::timeout(Duration::from_secs(2), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition reached");
}

#[tokio::test]
async fn message_for_missing_gateway_is_dropped() {
    let decoder = Arc::new(RecordingDecoder::default());
    let (_queue, monitor) = monitor(decoder.clone());
    monitor.process(message(42, 1)).await;
    assert!(decoder.seen().is_empty());
}

#[tokio::test]
async fn loop_processes_in_order_and_survives_failures() {
    let decoder = Arc::new(RecordingDecoder::default());
    let (queue, monitor) = monitor(decoder.clone());
    for node in [1, 13, 66, 2, 3] {
        queue.put(message(1, node));
    }
    queue.put(message(42, 4));
    queue.put(message(1, 5));

    let handle = monitor.start(CancellationToken::new());
    wait_until(|| decoder.seen().len() == 5).await;
    assert_eq!(decoder.seen(), vec![1, 66, 2, 3, 5]);
    assert!(queue.is_empty());
    assert!(!handle.is_terminated());
    assert!(handle.shutdown(Duration::from_secs(1)).await);
}

#[tokio::test]
async fn cancellation_stops_idle_loop() {
    let decoder = Arc::new(RecordingDecoder::default());
    let (queue, monitor) = monitor(decoder.clone());
    let cancel = CancellationToken::new();
    let handle = monitor.start(cancel.clone());

    cancel.cancel();
    assert!(handle.shutdown(Duration::from_secs(1)).await);
    queue.put(message(1, 1));
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(decoder.seen().is_empty());
    assert_eq!(queue.len(), 1);
}

#[tokio::test]
async fn backlog_is_paced_between_messages() {
    let pacing = Duration::from_millis(20);
    let decoder = Arc::new(TimedDecoder::default());
    let (queue, monitor) = paced_monitor(decoder.clone(), pacing);
    for node in 1..=4 {
        queue.put(message(1, node));
    }

    let handle = monitor.start(CancellationToken::new());
    wait_until(|| decoder.seen().len() == 4).await;
    let seen = decoder.seen();
    assert_eq!(
        seen.iter().map(|(node, _)| *node).collect::<Vec<_>>(),
        vec![1, 2, 3, 4]
    );
    let elapsed = seen[3].1.duration_since(seen[0].1);
    assert!(elapsed >= pacing * 3, "elapsed {elapsed:?}");
    assert!(handle.shutdown(Duration::from_secs(1)).await);
}

#[tokio::test]
async fn empty_queue_is_not_paced() {
    let decoder = Arc::new(TimedDecoder::default());
    let (queue, monitor) = paced_monitor(decoder.clone(), Duration::from_secs(30));
    let handle = monitor.start(CancellationToken::new());

    queue.put(message(1, 1));
    wait_until(|| decoder.seen().len() == 1).await;
    // 让循环回到空闲等待
    tokio::time::sleep(Duration::from_millis(20)).await;
    queue.put(message(1, 2));
    wait_until(|| decoder.seen().len() == 2).await;
    assert!(handle.shutdown(Duration::from_secs(1)).await);
}

#[tokio::test]
async fn shutdown_gives_up_after_ceiling_while_handler_is_stuck() {
    let decoder = Arc::new(GatedDecoder::default());
    let (queue, monitor) = paced_monitor(decoder.clone(), Duration::from_millis(1));
    queue.put(message(1, 1));

    let handle = monitor.start(CancellationToken::new());
    wait_until(|| decoder.entered.load(Ordering::SeqCst)).await;

    let started = Instant::now();
    assert!(!handle.shutdown(Duration::from_millis(50)).await);
    assert!(started.elapsed() >= Duration::from_millis(50));
    decoder.gate.notify_one();
}
