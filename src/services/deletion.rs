//! 批量删除防抖器
//!
//! 删除请求经无界通道进入一个独占缓冲区与定时器的控制任务：
//! - Idle 收到请求：启动 `window` 定时器，进入 Accumulating
//! - 缓冲区达到 `threshold`：取消定时器，立即刷盘，回到 Idle
//! - 定时器到期：刷盘，回到 Idle
//!
//! 每次刷盘是一个独立的后台任务，对快照中的每个请求调用一次
//! `Repository::batch_delete`。失败只记录日志，不重试也不重新入队。
//! 同时在途的刷盘任务数量没有上限。

use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use futures_util::future::join_all;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinSet;
use tokio::time::{Sleep, sleep};
use tracing::{debug, error, trace, warn};

use super::models::DeletionRequest;
use crate::config::DeletionConfig;
use crate::storage::Repository;

/// 防抖参数
#[derive(Debug, Clone, Copy)]
pub struct DebounceSettings {
    pub window: Duration,
    pub threshold: usize,
}

impl Default for DebounceSettings {
    fn default() -> Self {
        Self {
            window: Duration::from_secs(5),
            threshold: 3,
        }
    }
}

impl From<&DeletionConfig> for DebounceSettings {
    fn from(config: &DeletionConfig) -> Self {
        Self {
            window: Duration::from_secs(config.debounce_secs),
            threshold: config.flush_threshold.max(1),
        }
    }
}

/// 计数器快照
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DebouncerStats {
    pub requests_received: u64,
    pub flushes_dispatched: u64,
    pub requests_flushed: u64,
    pub failed_deletes: u64,
    /// 控制任务停止后提交、被丢弃的请求
    pub requests_dropped: u64,
}

#[derive(Default)]
struct Counters {
    requests_received: AtomicU64,
    flushes_dispatched: AtomicU64,
    requests_flushed: AtomicU64,
    failed_deletes: AtomicU64,
    requests_dropped: AtomicU64,
}

impl Counters {
    fn snapshot(&self) -> DebouncerStats {
        DebouncerStats {
            requests_received: self.requests_received.load(Ordering::Relaxed),
            flushes_dispatched: self.flushes_dispatched.load(Ordering::Relaxed),
            requests_flushed: self.requests_flushed.load(Ordering::Relaxed),
            failed_deletes: self.failed_deletes.load(Ordering::Relaxed),
            requests_dropped: self.requests_dropped.load(Ordering::Relaxed),
        }
    }
}

enum Command {
    Delete(DeletionRequest),
    Shutdown(oneshot::Sender<()>),
}

/// 防抖器句柄，可廉价克隆
#[derive(Clone)]
pub struct DeletionDebouncer {
    tx: mpsc::UnboundedSender<Command>,
    counters: Arc<Counters>,
}

impl DeletionDebouncer {
    /// 启动控制任务，必须在 tokio runtime 内调用
    pub fn spawn(repository: Arc<dyn Repository>, settings: DebounceSettings) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let counters = Arc::new(Counters::default());

        let sequencer = Sequencer {
            repository,
            settings,
            counters: counters.clone(),
            buffer: Vec::new(),
            deadline: None,
            in_flight: JoinSet::new(),
        };
        tokio::spawn(sequencer.run(rx));

        debug!(
            "DeletionDebouncer: started (window={:?}, threshold={})",
            settings.window, settings.threshold
        );
        Self { tx, counters }
    }

    /// 提交删除请求，不等待刷盘
    pub fn submit(&self, request: DeletionRequest) {
        match self.tx.send(Command::Delete(request)) {
            Ok(()) => {
                self.counters
                    .requests_received
                    .fetch_add(1, Ordering::Relaxed);
            }
            Err(mpsc::error::SendError(command)) => {
                self.counters
                    .requests_dropped
                    .fetch_add(1, Ordering::Relaxed);
                if let Command::Delete(request) = command {
                    warn!(
                        "DeletionDebouncer: stopped, dropping {} aliases for owner '{}'",
                        request.aliases.len(),
                        request.owner
                    );
                }
            }
        }
    }

    /// 刷出缓冲区并等待所有在途刷盘完成
    pub async fn shutdown(&self) {
        let (ack_tx, ack_rx) = oneshot::channel();
        if self.tx.send(Command::Shutdown(ack_tx)).is_err() {
            debug!("DeletionDebouncer: already stopped");
            return;
        }
        if ack_rx.await.is_err() {
            warn!("DeletionDebouncer: control task ended before acknowledging shutdown");
        }
    }

    pub fn stats(&self) -> DebouncerStats {
        self.counters.snapshot()
    }
}

/// 控制任务：唯一持有缓冲区与定时器
struct Sequencer {
    repository: Arc<dyn Repository>,
    settings: DebounceSettings,
    counters: Arc<Counters>,
    buffer: Vec<DeletionRequest>,
    /// `Some` 即 Accumulating
    deadline: Option<Pin<Box<Sleep>>>,
    in_flight: JoinSet<()>,
}

impl Sequencer {
    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<Command>) {
        loop {
            tokio::select! {
                command = rx.recv() => match command {
                    Some(Command::Delete(request)) => self.accept(request),
                    Some(Command::Shutdown(ack)) => {
                        self.drain().await;
                        let _ = ack.send(());
                        break;
                    }
                    None => {
                        // 所有句柄已释放
                        self.drain().await;
                        break;
                    }
                },
                _ = wait_deadline(&mut self.deadline), if self.deadline.is_some() => {
                    self.deadline = None;
                    trace!("DeletionDebouncer: window elapsed");
                    self.dispatch("timer");
                }
                Some(joined) = self.in_flight.join_next(), if !self.in_flight.is_empty() => {
                    if let Err(e) = joined {
                        error!("DeletionDebouncer: flush task panicked: {}", e);
                    }
                }
            }
        }
        debug!("DeletionDebouncer: stopped");
    }

    fn accept(&mut self, request: DeletionRequest) {
        if self.deadline.is_none() {
            self.deadline = Some(Box::pin(sleep(self.settings.window)));
            trace!("DeletionDebouncer: Idle -> Accumulating");
        }
        self.buffer.push(request);

        if self.buffer.len() >= self.settings.threshold {
            self.deadline = None;
            self.dispatch("threshold");
        }
    }

    /// 快照并清空缓冲区，派发后台刷盘任务
    fn dispatch(&mut self, reason: &str) {
        if self.buffer.is_empty() {
            return;
        }
        let snapshot = std::mem::take(&mut self.buffer);

        self.counters
            .flushes_dispatched
            .fetch_add(1, Ordering::Relaxed);
        self.counters
            .requests_flushed
            .fetch_add(snapshot.len() as u64, Ordering::Relaxed);
        debug!(
            "DeletionDebouncer: dispatching flush of {} requests ({})",
            snapshot.len(),
            reason
        );

        self.in_flight.spawn(flush(
            self.repository.clone(),
            snapshot,
            self.counters.clone(),
        ));
    }

    async fn drain(&mut self) {
        self.deadline = None;
        self.dispatch("shutdown");
        while let Some(joined) = self.in_flight.join_next().await {
            if let Err(e) = joined {
                error!("DeletionDebouncer: flush task panicked: {}", e);
            }
        }
    }
}

async fn wait_deadline(deadline: &mut Option<Pin<Box<Sleep>>>) {
    match deadline {
        Some(timer) => timer.as_mut().await,
        None => std::future::pending().await,
    }
}

async fn flush(
    repository: Arc<dyn Repository>,
    snapshot: Vec<DeletionRequest>,
    counters: Arc<Counters>,
) {
    let deletes = snapshot.into_iter().map(|request| {
        let repository = repository.clone();
        let counters = counters.clone();
        async move {
            let count = request.aliases.len();
            match repository
                .batch_delete(request.aliases, &request.owner)
                .await
            {
                Ok(marked) => {
                    trace!(
                        "DeletionDebouncer: deleted {}/{} aliases for owner '{}'",
                        marked, count, request.owner
                    );
                }
                Err(e) => {
                    counters.failed_deletes.fetch_add(1, Ordering::Relaxed);
                    warn!(
                        "DeletionDebouncer: failed to delete {} aliases for owner '{}': {}",
                        count, request.owner, e
                    );
                }
            }
        }
    });
    join_all(deletes).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::{Result, ShortenerError};
    use crate::storage::{Lookup, StoreOutcome, UrlRecord};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::sync::atomic::AtomicUsize;
    use tokio::sync::Semaphore;

    /// 只记录 batch_delete 调用的存储
    struct MockRepository {
        calls: Mutex<Vec<(String, Vec<String>)>>,
        fail: bool,
        /// 设置后 batch_delete 需要拿到许可才返回
        gate: Option<Semaphore>,
        completed: AtomicUsize,
    }

    impl MockRepository {
        fn new(fail: bool) -> Arc<Self> {
            Arc::new(Self {
                calls: Mutex::new(Vec::new()),
                fail,
                gate: None,
                completed: AtomicUsize::new(0),
            })
        }

        fn gated() -> Arc<Self> {
            Arc::new(Self {
                calls: Mutex::new(Vec::new()),
                fail: false,
                gate: Some(Semaphore::new(0)),
                completed: AtomicUsize::new(0),
            })
        }

        fn release(&self, permits: usize) {
            if let Some(gate) = &self.gate {
                gate.add_permits(permits);
            }
        }

        fn completed(&self) -> usize {
            self.completed.load(Ordering::SeqCst)
        }

        fn calls(&self) -> Vec<(String, Vec<String>)> {
            self.calls.lock().clone()
        }
    }

    #[async_trait]
    impl Repository for MockRepository {
        async fn store(&self, _record: UrlRecord) -> Result<StoreOutcome> {
            Ok(StoreOutcome::Stored)
        }

        async fn find_by_alias(&self, _alias: &str) -> Result<Lookup> {
            Ok(Lookup::NotFound)
        }

        async fn find_all(&self, _owner: &str) -> Result<Vec<UrlRecord>> {
            Ok(Vec::new())
        }

        async fn batch_store(&self, _records: Vec<UrlRecord>) -> Result<()> {
            Ok(())
        }

        async fn batch_delete(&self, aliases: Vec<String>, owner: &str) -> Result<usize> {
            let count = aliases.len();
            self.calls.lock().push((owner.to_string(), aliases));
            if let Some(gate) = &self.gate {
                let _permit = gate.acquire().await;
            }
            self.completed.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(ShortenerError::database_operation("boom"))
            } else {
                Ok(count)
            }
        }

        fn backend_name(&self) -> &'static str {
            "mock"
        }
    }

    fn request(owner: &str, alias: &str) -> DeletionRequest {
        DeletionRequest::new(owner, vec![alias.to_string()])
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_flushes_accumulated_requests() {
        let repo = MockRepository::new(false);
        let debouncer = DeletionDebouncer::spawn(repo.clone(), DebounceSettings::default());

        debouncer.submit(request("u1", "aaaaa"));
        debouncer.submit(request("u2", "bbbbb"));

        tokio::time::sleep(Duration::from_secs(4)).await;
        assert!(repo.calls().is_empty());

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(repo.calls().len(), 2);
        assert_eq!(debouncer.stats().flushes_dispatched, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_threshold_flushes_without_timer() {
        let repo = MockRepository::new(false);
        let debouncer = DeletionDebouncer::spawn(repo.clone(), DebounceSettings::default());

        for alias in ["aaaaa", "bbbbb", "ccccc"] {
            debouncer.submit(request("u1", alias));
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(repo.calls().len(), 3);

        // 定时器已取消，窗口结束也不会产生额外刷盘
        tokio::time::sleep(Duration::from_secs(10)).await;
        let stats = debouncer.stats();
        assert_eq!(stats.flushes_dispatched, 1);
        assert_eq!(stats.requests_flushed, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failures_are_counted_not_retried() {
        let repo = MockRepository::new(true);
        let debouncer = DeletionDebouncer::spawn(repo.clone(), DebounceSettings::default());

        debouncer.submit(request("u1", "aaaaa"));
        tokio::time::sleep(Duration::from_secs(6)).await;
        tokio::time::sleep(Duration::from_secs(30)).await;

        assert_eq!(repo.calls().len(), 1);
        assert_eq!(debouncer.stats().failed_deletes, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_flushes_pending_buffer() {
        let repo = MockRepository::new(false);
        let debouncer = DeletionDebouncer::spawn(repo.clone(), DebounceSettings::default());

        debouncer.submit(request("u1", "aaaaa"));
        debouncer.shutdown().await;

        assert_eq!(repo.calls(), vec![("u1".to_string(), vec!["aaaaa".to_string()])]);

        // 关闭后的请求被丢弃，且不计入 requests_received
        debouncer.submit(request("u1", "bbbbb"));
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(repo.calls().len(), 1);

        let stats = debouncer.stats();
        assert_eq!(stats.requests_received, 1);
        assert_eq!(stats.requests_dropped, 1);
        assert_eq!(stats.requests_flushed, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_intake_continues_while_flushes_are_in_flight() {
        let repo = MockRepository::gated();
        let debouncer = DeletionDebouncer::spawn(repo.clone(), DebounceSettings::default());

        for alias in ["a0000", "a0001", "a0002"] {
            debouncer.submit(request("u1", alias));
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(repo.calls().len(), 3);
        assert_eq!(repo.completed(), 0);

        // 第一批仍阻塞在存储层，新的请求照常进入并触发第二次刷盘
        for alias in ["b0000", "b0001", "b0002"] {
            debouncer.submit(request("u2", alias));
        }
        tokio::time::sleep(Duration::from_millis(10)).await;

        let stats = debouncer.stats();
        assert_eq!(stats.requests_received, 6);
        assert_eq!(stats.flushes_dispatched, 2);
        assert_eq!(repo.calls().len(), 6);
        assert_eq!(repo.completed(), 0);

        repo.release(6);
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(repo.completed(), 6);

        // 在途刷盘全部完成后才确认关闭
        debouncer.shutdown().await;
        assert_eq!(debouncer.stats().failed_deletes, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_waits_for_in_flight_flush() {
        let repo = MockRepository::gated();
        let debouncer = DeletionDebouncer::spawn(repo.clone(), DebounceSettings::default());

        debouncer.submit(request("u1", "aaaaa"));
        let shutdown = {
            let debouncer = debouncer.clone();
            tokio::spawn(async move { debouncer.shutdown().await })
        };
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert!(!shutdown.is_finished());
        assert_eq!(repo.completed(), 0);

        repo.release(1);
        shutdown.await.unwrap();
        assert_eq!(repo.completed(), 1);
    }
}
