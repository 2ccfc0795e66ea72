//! 有界工作池
//!
//! 解码路径的副作用（规则评估、载荷转发）以任务形式提交到这里，
//! 不阻塞消息处理。队列满时立即返回背压错误；任务 panic 会被记录，
//! 不影响工作者继续取任务。

use crate::error::PipelineError;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

type Job = (&'static str, Pin<Box<dyn Future<Output = ()> + Send>>);

/// 工作池参数。
#[derive(Debug, Clone)]
pub struct WorkerPoolConfig {
    pub workers: usize,
    pub capacity: usize,
}

impl Default for WorkerPoolConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            capacity: 256,
        }
    }
}

impl WorkerPoolConfig {
    fn sanitized(mut self) -> Self {
        self.workers = self.workers.max(1);
        self.capacity = self.capacity.max(1);
        self
    }
}

struct WorkerPoolInner {
    sender: Mutex<Option<mpsc::Sender<Job>>>,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

/// 有界工作池。
#[derive(Clone)]
pub struct WorkerPool {
    inner: Arc<WorkerPoolInner>,
}

impl WorkerPool {
    /// 启动工作者（需在 tokio 运行时内调用）
    pub fn start(config: WorkerPoolConfig) -> Self {
        let config = config.sanitized();
        let (sender, receiver) = mpsc::channel::<Job>(config.capacity);
        let receiver = Arc::new(tokio::sync::Mutex::new(receiver));
        let handles = (0..config.workers)
            .map(|worker| {
                let receiver = receiver.clone();
                tokio::spawn(async move { run_worker(worker, receiver).await })
            })
            .collect();
        Self {
            inner: Arc::new(WorkerPoolInner {
                sender: Mutex::new(Some(sender)),
                handles: Mutex::new(handles),
            }),
        }
    }

    /// 提交任务；队列满返回 [`PipelineError::Backpressure`]。
    pub fn submit<F>(&self, name: &'static str, job: F) -> Result<(), PipelineError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let sender = self
            .inner
            .sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or(PipelineError::WorkerClosed)?;
        match sender.try_send((name, Box::pin(job))) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(_)) => {
                hc_telemetry::record_backpressure();
                warn!(target: "hc.worker", job = name, "worker_queue_full");
                Err(PipelineError::Backpressure(format!("worker queue full: {name}")))
            }
            Err(mpsc::error::TrySendError::Closed(_)) => Err(PipelineError::WorkerClosed),
        }
    }

    /// 停止接收新任务，等待已排队任务执行完毕。
    pub async fn shutdown(&self) {
        self.inner
            .sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let handles: Vec<JoinHandle<()>> = std::mem::take(
            &mut *self
                .inner
                .handles
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        );
        for handle in handles {
            if let Err(err) = handle.await {
                error!(target: "hc.worker", error = %err, "worker_join_failed");
            }
        }
    }
}

async fn run_worker(worker: usize, receiver: Arc<tokio::sync::Mutex<mpsc::Receiver<Job>>>) {
    loop {
        let next = receiver.lock().await.recv().await;
        let Some((name, job)) = next else {
            debug!(target: "hc.worker", worker, "worker_stopped");
            return;
        };
        // 单独的任务承载 panic，工作者本身不受影响
        if let Err(err) = tokio::spawn(job).await {
            error!(target: "hc.worker", worker, job = name, error = %err, "worker_job_failed");
        }
    }
}
