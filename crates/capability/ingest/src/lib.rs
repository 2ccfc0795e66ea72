//! 原始消息队列：传输层（多生产者）与消息监视循环（单消费者）之间的缓冲。

use domain::RawMessage;
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::Notify;
use tracing::trace;

/// 无界 FIFO 原始消息队列。
///
/// `put` 不阻塞、不丢弃；`take` 在队列为空时挂起等待。
/// `len`/`is_empty` 仅供节流与停机判断，结果可能立即过期。
#[derive(Default)]
pub struct RawMessageQueue {
    messages: Mutex<VecDeque<RawMessage>>,
    available: Notify,
}

impl RawMessageQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// 追加到队尾。
    pub fn put(&self, message: RawMessage) {
        let size = {
            let mut messages = self.lock();
            messages.push_back(message);
            messages.len()
        };
        trace!(target: "hc.queue", size, "raw_message_enqueued");
        self.available.notify_one();
    }

    /// 取出队首，队列为空时等待。
    pub async fn take(&self) -> RawMessage {
        loop {
            if let Some(message) = self.try_take() {
                return message;
            }
            self.available.notified().await;
        }
    }

    /// 非阻塞取出队首。
    pub fn try_take(&self) -> Option<RawMessage> {
        self.lock().pop_front()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<RawMessage>> {
        self.messages.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    fn message(node_id: u8) -> RawMessage {
        RawMessage::inbound(1, node_id, 0, 1, false, 0, "1")
    }

    #[tokio::test]
    async fn fifo_order() {
        let queue = RawMessageQueue::new();
        queue.put(message(1));
        queue.put(message(2));
        queue.put(message(3));

        assert_eq!(queue.len(), 3);
        assert_eq!(queue.take().await.node_id, 1);
        assert_eq!(queue.take().await.node_id, 2);
        assert_eq!(queue.take().await.node_id, 3);
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn take_waits_for_put() {
        let queue = Arc::new(RawMessageQueue::new());
        let consumer = {
            let queue = queue.clone();
            tokio::spawn(async move { queue.take().await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!consumer.is_finished());

        queue.put(message(9));
        let received = tokio::time::timeout(Duration::from_secs(1), consumer)
            .await
            .expect("take completes")
            .expect("join");
        assert_eq!(received.node_id, 9);
    }

    #[tokio::test]
    async fn producers_from_many_tasks_lose_nothing() {
        let queue = Arc::new(RawMessageQueue::new());
        let mut producers = Vec::new();
        for producer in 0..4u8 {
            let queue = queue.clone();
            producers.push(tokio::spawn(async move {
                for _ in 0..50 {
                    queue.put(message(producer));
                }
            }));
        }
        for producer in producers {
            producer.await.expect("join");
        }
        assert_eq!(queue.len(), 200);
    }
}
