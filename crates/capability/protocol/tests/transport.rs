use async_trait::async_trait;
use domain::{GatewayState, MessageType, NetworkType, RawMessage};
use hc_ingest::RawMessageQueue;
use hc_protocol::{
    Connector, GatewayConnection, LinkState, ProtocolError, Transport, TransportGateway,
};
use hc_storage::{GatewayRecord, GatewayStore, InMemoryGatewayStore};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// 按脚本返回接收结果的传输；脚本耗尽后一直等待。
struct ScriptedTransport {
    script: Mutex<VecDeque<Result<Option<RawMessage>, ProtocolError>>>,
    connects: Arc<AtomicUsize>,
    sent: Arc<Mutex<Vec<RawMessage>>>,
}

#[async_trait]
impl Connector for ScriptedTransport {
    async fn connect(&self) -> Result<(), ProtocolError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn disconnect(&self) {}
}

#[async_trait]
impl Transport for ScriptedTransport {
    fn describe(&self) -> String {
        "scripted".to_string()
    }

    async fn receive(&self, _gateway_id: u32) -> Result<Option<RawMessage>, ProtocolError> {
        let next = self.script.lock().expect("lock").pop_front();
        match next {
            Some(result) => result,
            None => std::future::pending().await,
        }
    }

    async fn send(&self, message: &RawMessage) -> Result<(), ProtocolError> {
        self.sent.lock().expect("lock").push(message.clone());
        Ok(())
    }
}

async fn wait_for(condition: impl Fn() -> bool) {
    for _ in 0..200 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not reached");
}

#[tokio::test]
async fn read_loop_enqueues_skips_bad_frames_and_reconnects() {
    let queue = Arc::new(RawMessageQueue::default());
    let store = Arc::new(InMemoryGatewayStore::new());
    store
        .save_gateway(GatewayRecord {
            id: 3,
            name: "serial".to_string(),
            network_type: NetworkType::MySensors,
            enabled: true,
            state: GatewayState::Down,
            status_message: String::new(),
            status_since_ms: 0,
        })
        .await
        .expect("save");

    let connects = Arc::new(AtomicUsize::new(0));
    let sent = Arc::new(Mutex::new(Vec::new()));
    let transport = ScriptedTransport {
        script: Mutex::new(VecDeque::from(vec![
            Ok(Some(RawMessage::inbound(3, 12, 1, 1, false, 0, "21.5"))),
            Err(ProtocolError::FrameParse("garbage".to_string())),
            Ok(None),
            Ok(Some(RawMessage::inbound(3, 12, 1, 1, false, 0, "22.0"))),
            Err(ProtocolError::Connection("connection closed".to_string())),
        ])),
        connects: connects.clone(),
        sent: sent.clone(),
    };
    let gateway = TransportGateway::new(
        3,
        transport,
        queue.clone(),
        store.clone(),
        Duration::from_millis(10),
    );
    gateway.start().await;

    let first = tokio::time::timeout(Duration::from_secs(1), queue.take())
        .await
        .expect("first");
    let second = tokio::time::timeout(Duration::from_secs(1), queue.take())
        .await
        .expect("second");
    assert_eq!(first.payload, "21.5");
    assert_eq!(second.payload, "22.0");

    wait_for(|| connects.load(Ordering::SeqCst) == 2).await;
    wait_for(|| gateway.status().state == LinkState::Connected).await;
    let record = store.get_gateway(3).await.expect("get").expect("exists");
    assert_eq!(record.state, GatewayState::Up);

    let reply = RawMessage::outbound(3, 12, 1, MessageType::Set, 0, "1");
    gateway.write(&reply).await.expect("write");
    assert_eq!(sent.lock().expect("lock").len(), 1);

    gateway.close().await;
    assert_eq!(gateway.status().state, LinkState::Closed);
    assert!(matches!(gateway.write(&reply).await, Err(ProtocolError::Closed)));
    assert!(queue.is_empty());
    let record = store.get_gateway(3).await.expect("get").expect("exists");
    assert_eq!(record.state, GatewayState::Down);
    assert!(record.status_message.contains("closed"));
}
