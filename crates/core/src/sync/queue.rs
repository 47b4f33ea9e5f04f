//! Durable operation queue with retry bookkeeping.
//!
//! Application code enqueues pending remote mutations here; the record is
//! persisted immediately and the call returns without touching the
//! network. Draining is owned by the scheduler, which is nudged through
//! an explicit wakeup signal rather than called from the write path.
//!
//! A drain processes operations strictly sequentially in dequeue order
//! (priority descending, then enqueue time ascending) and is guarded so
//! that only one pass can be in flight at a time; a second caller gets an
//! empty outcome back instead of a queued duplicate.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Notify;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::sync::ports::{OperationExecutor, OperationStore};
use steeple_domain::{
    DrainOutcome, HttpMethod, OperationKind, OperationMetadata, Priority, QueueOperation,
    QueueStatsSnapshot, Result, SyncConfig, DEFAULT_MAX_RETRIES,
};

/// Parameters for a new queue entry.
///
/// `max_retries` falls back to the queue-wide default when unset.
#[derive(Debug, Clone)]
pub struct NewOperation {
    pub kind: OperationKind,
    pub endpoint: String,
    pub method: HttpMethod,
    pub payload: Option<serde_json::Value>,
    pub headers: std::collections::BTreeMap<String, String>,
    pub priority: Priority,
    pub max_retries: Option<u32>,
    pub metadata: Option<OperationMetadata>,
}

impl NewOperation {
    /// Build an enqueue request with default priority and headers.
    #[must_use]
    pub fn new(kind: OperationKind, endpoint: impl Into<String>, method: HttpMethod) -> Self {
        Self {
            kind,
            endpoint: endpoint.into(),
            method,
            payload: None,
            headers: std::collections::BTreeMap::new(),
            priority: Priority::Normal,
            max_retries: None,
            metadata: None,
        }
    }
}

/// Endpoint-level drain policy derived from the sync configuration.
///
/// Blacklisted prefixes are skipped entirely (the operations stay queued
/// and untouched); priority prefixes are drained ahead of their priority
/// class, FIFO within the promoted group.
#[derive(Debug, Clone, Default)]
pub struct DrainPolicy {
    pub priority_endpoints: Vec<String>,
    pub blacklisted_endpoints: Vec<String>,
}

impl From<&SyncConfig> for DrainPolicy {
    fn from(config: &SyncConfig) -> Self {
        Self {
            priority_endpoints: config.priority_endpoints.clone(),
            blacklisted_endpoints: config.blacklisted_endpoints.clone(),
        }
    }
}

impl DrainPolicy {
    fn is_blacklisted(&self, endpoint: &str) -> bool {
        self.blacklisted_endpoints.iter().any(|prefix| endpoint.starts_with(prefix.as_str()))
    }

    fn is_promoted(&self, endpoint: &str) -> bool {
        self.priority_endpoints.iter().any(|prefix| endpoint.starts_with(prefix.as_str()))
    }
}

/// Durable queue of pending remote mutations.
///
/// Owns dequeue ordering and retry bookkeeping; execution is delegated to
/// the injected [`OperationExecutor`], one attempt per operation per
/// drain pass.
pub struct OperationQueue {
    store: Arc<dyn OperationStore>,
    executor: Arc<dyn OperationExecutor>,
    default_max_retries: AtomicU32,
    drain_active: AtomicBool,
    drain_signal: Arc<Notify>,
}

impl OperationQueue {
    /// Create a queue over the given store and executor.
    pub fn new(store: Arc<dyn OperationStore>, executor: Arc<dyn OperationExecutor>) -> Self {
        Self {
            store,
            executor,
            default_max_retries: AtomicU32::new(DEFAULT_MAX_RETRIES),
            drain_active: AtomicBool::new(false),
            drain_signal: Arc::new(Notify::new()),
        }
    }

    /// Wakeup handle the scheduler listens on for enqueue nudges.
    #[must_use]
    pub fn drain_signal(&self) -> Arc<Notify> {
        Arc::clone(&self.drain_signal)
    }

    /// Update the retry budget applied to operations enqueued without one.
    pub fn set_default_max_retries(&self, max_retries: u32) {
        self.default_max_retries.store(max_retries, Ordering::Relaxed);
    }

    /// Persist a new operation and return its id.
    ///
    /// Never blocks on network I/O. The scheduler is nudged through the
    /// drain signal; the write path itself never drains.
    ///
    /// # Errors
    ///
    /// Returns an error when the durable store rejects the insert.
    pub async fn enqueue(&self, spec: NewOperation) -> Result<String> {
        let op = QueueOperation {
            id: Uuid::new_v4().to_string(),
            kind: spec.kind,
            endpoint: spec.endpoint,
            method: spec.method,
            payload: spec.payload,
            headers: spec.headers,
            enqueued_at: Utc::now().timestamp_millis(),
            retry_count: 0,
            max_retries: spec
                .max_retries
                .unwrap_or_else(|| self.default_max_retries.load(Ordering::Relaxed)),
            priority: spec.priority,
            metadata: spec.metadata,
        };

        self.store.insert(&op).await?;
        debug!(id = %op.id, endpoint = %op.endpoint, priority = %op.priority, "operation enqueued");

        self.drain_signal.notify_one();
        Ok(op.id)
    }

    /// All live operations in dequeue order.
    ///
    /// Priority descending (High, Normal, Low), then `enqueued_at`
    /// ascending. The sort is stable, so storage order breaks ties.
    ///
    /// # Errors
    ///
    /// Returns an error when the durable store cannot be read.
    pub async fn dequeue_all_pending(&self) -> Result<Vec<QueueOperation>> {
        let mut ops = self.store.fetch_all().await?;
        ops.sort_by_key(|op| (op.priority.rank(), op.enqueued_at));
        Ok(ops)
    }

    /// Delete an operation by id.
    ///
    /// # Errors
    ///
    /// Returns an error when the durable store rejects the delete.
    pub async fn remove(&self, id: &str) -> Result<()> {
        self.store.remove(id).await
    }

    /// Overwrite an operation's retry count.
    ///
    /// The only mutation the queue ever applies to a live operation.
    ///
    /// # Errors
    ///
    /// Returns an error when the durable store rejects the update.
    pub async fn update_retry_count(&self, id: &str, retry_count: u32) -> Result<()> {
        self.store.set_retry_count(id, retry_count).await
    }

    /// Delete every live operation.
    ///
    /// # Errors
    ///
    /// Returns an error when the durable store rejects the delete.
    pub async fn clear_queue(&self) -> Result<()> {
        self.store.clear().await
    }

    /// Point-in-time queue statistics, computed from the live list.
    ///
    /// # Errors
    ///
    /// Returns an error when the durable store cannot be read.
    pub async fn get_stats(&self) -> Result<QueueStatsSnapshot> {
        let ops = self.dequeue_all_pending().await?;

        let mut snapshot = QueueStatsSnapshot {
            total: ops.len() as u64,
            ..QueueStatsSnapshot::default()
        };

        for op in &ops {
            if op.retry_count == 0 {
                snapshot.pending += 1;
            }
            if op.is_exhausted() {
                snapshot.failed += 1;
            }
            *snapshot.by_kind.entry(op.kind.to_string()).or_insert(0) += 1;
            *snapshot.by_priority.entry(op.priority.to_string()).or_insert(0) += 1;
        }

        snapshot.oldest_operation = ops.iter().map(|op| op.enqueued_at).min();
        snapshot.newest_operation = ops.iter().map(|op| op.enqueued_at).max();

        Ok(snapshot)
    }

    /// One complete drain pass with no endpoint policy applied.
    ///
    /// # Errors
    ///
    /// Returns an error when the durable store fails mid-pass.
    pub async fn drain(&self) -> Result<DrainOutcome> {
        self.drain_with_policy(&DrainPolicy::default()).await
    }

    /// One complete drain pass honoring the given endpoint policy.
    ///
    /// Reentrant-guarded: a call arriving while another pass is in flight
    /// is a no-op returning an empty outcome, never a queued duplicate.
    ///
    /// # Errors
    ///
    /// Returns an error when the durable store fails mid-pass. The guard
    /// is released either way.
    pub async fn drain_with_policy(&self, policy: &DrainPolicy) -> Result<DrainOutcome> {
        if self
            .drain_active
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("drain already in flight; skipping");
            return Ok(DrainOutcome::default());
        }

        let result = self.drain_pass(policy).await;
        self.drain_active.store(false, Ordering::Release);
        result
    }

    async fn drain_pass(&self, policy: &DrainPolicy) -> Result<DrainOutcome> {
        let ops = self.dequeue_all_pending().await?;

        let eligible: Vec<QueueOperation> =
            ops.into_iter().filter(|op| !policy.is_blacklisted(&op.endpoint)).collect();
        let (promoted, rest): (Vec<QueueOperation>, Vec<QueueOperation>) =
            eligible.into_iter().partition(|op| policy.is_promoted(&op.endpoint));

        let mut outcome = DrainOutcome::default();

        // Strictly sequential: each attempt completes before the next
        // starts, preserving per-priority FIFO order on the wire.
        for op in promoted.into_iter().chain(rest) {
            match self.executor.execute(&op).await {
                Ok(()) => {
                    self.store.remove(&op.id).await?;
                    debug!(id = %op.id, endpoint = %op.endpoint, "operation executed");
                    outcome.success += 1;
                }
                Err(failure) => {
                    let attempted = op.retry_count + 1;
                    if attempted >= op.max_retries {
                        warn!(
                            id = %op.id,
                            endpoint = %op.endpoint,
                            attempts = attempted,
                            error = %failure,
                            "operation exhausted retry budget; evicting"
                        );
                        self.store.remove(&op.id).await?;
                        outcome.failed += 1;
                    } else {
                        debug!(
                            id = %op.id,
                            endpoint = %op.endpoint,
                            retry_count = attempted,
                            error = %failure,
                            "operation failed; retrying on a later pass"
                        );
                        self.store.set_retry_count(&op.id, attempted).await?;
                    }
                }
            }
        }

        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::time::Duration;

    use async_trait::async_trait;
    use tokio::sync::Mutex as TokioMutex;

    use super::*;
    use crate::sync::ports::ExecutionFailure;

    type OpStore = Arc<TokioMutex<Vec<QueueOperation>>>;
    type CallLog = Arc<TokioMutex<Vec<String>>>;

    struct MemStore {
        ops: OpStore,
    }

    impl MemStore {
        fn new(initial: Vec<QueueOperation>) -> Self {
            Self { ops: Arc::new(TokioMutex::new(initial)) }
        }

        async fn contents(&self) -> Vec<QueueOperation> {
            self.ops.lock().await.clone()
        }
    }

    #[async_trait]
    impl OperationStore for MemStore {
        async fn insert(&self, op: &QueueOperation) -> Result<()> {
            self.ops.lock().await.push(op.clone());
            Ok(())
        }

        // Insertion order on purpose: ordering is the queue's job.
        async fn fetch_all(&self) -> Result<Vec<QueueOperation>> {
            Ok(self.ops.lock().await.clone())
        }

        async fn remove(&self, id: &str) -> Result<()> {
            self.ops.lock().await.retain(|op| op.id != id);
            Ok(())
        }

        async fn set_retry_count(&self, id: &str, retry_count: u32) -> Result<()> {
            let mut ops = self.ops.lock().await;
            for op in ops.iter_mut() {
                if op.id == id {
                    op.retry_count = retry_count;
                }
            }
            Ok(())
        }

        async fn clear(&self) -> Result<()> {
            self.ops.lock().await.clear();
            Ok(())
        }
    }

    struct MockExecutor {
        always_fail: bool,
        delay: Option<Duration>,
        calls: CallLog,
    }

    impl MockExecutor {
        fn succeeding() -> Self {
            Self { always_fail: false, delay: None, calls: Arc::new(TokioMutex::new(Vec::new())) }
        }

        fn failing() -> Self {
            Self { always_fail: true, delay: None, calls: Arc::new(TokioMutex::new(Vec::new())) }
        }

        fn slow(delay: Duration) -> Self {
            Self {
                always_fail: false,
                delay: Some(delay),
                calls: Arc::new(TokioMutex::new(Vec::new())),
            }
        }

        async fn call_count(&self) -> usize {
            self.calls.lock().await.len()
        }

        async fn endpoints_called(&self) -> Vec<String> {
            self.calls.lock().await.clone()
        }
    }

    #[async_trait]
    impl OperationExecutor for MockExecutor {
        async fn execute(&self, op: &QueueOperation) -> std::result::Result<(), ExecutionFailure> {
            self.calls.lock().await.push(op.endpoint.clone());
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            if self.always_fail {
                Err(ExecutionFailure::Transport("connection refused".into()))
            } else {
                Ok(())
            }
        }
    }

    fn sample_op(id: &str, priority: Priority, enqueued_at: i64) -> QueueOperation {
        QueueOperation {
            id: id.to_string(),
            kind: OperationKind::Create,
            endpoint: format!("/api/members/{id}"),
            method: HttpMethod::Post,
            payload: Some(serde_json::json!({ "name": "sample" })),
            headers: BTreeMap::new(),
            enqueued_at,
            retry_count: 0,
            max_retries: 3,
            priority,
            metadata: None,
        }
    }

    fn queue_with(
        store: Arc<MemStore>,
        executor: Arc<MockExecutor>,
    ) -> OperationQueue {
        OperationQueue::new(store, executor)
    }

    #[tokio::test]
    async fn dequeue_orders_by_priority_then_enqueue_time() {
        // Low, High, Normal enqueued in that order must come back
        // High, Normal, Low.
        let store = Arc::new(MemStore::new(vec![
            sample_op("low", Priority::Low, 100),
            sample_op("high", Priority::High, 200),
            sample_op("normal", Priority::Normal, 300),
        ]));
        let queue = queue_with(store, Arc::new(MockExecutor::succeeding()));

        let ordered = queue.dequeue_all_pending().await.expect("dequeue succeeds");
        let ids: Vec<&str> = ordered.iter().map(|op| op.id.as_str()).collect();
        assert_eq!(ids, vec!["high", "normal", "low"]);
    }

    #[tokio::test]
    async fn fifo_within_priority_class() {
        let store = Arc::new(MemStore::new(vec![
            sample_op("second", Priority::Normal, 200),
            sample_op("first", Priority::Normal, 100),
        ]));
        let queue = queue_with(store, Arc::new(MockExecutor::succeeding()));

        let ordered = queue.dequeue_all_pending().await.expect("dequeue succeeds");
        assert_eq!(ordered[0].id, "first");
        assert_eq!(ordered[1].id, "second");
    }

    #[tokio::test]
    async fn enqueue_persists_before_any_network_activity() {
        let store = Arc::new(MemStore::new(Vec::new()));
        let executor = Arc::new(MockExecutor::succeeding());
        let queue = queue_with(Arc::clone(&store), Arc::clone(&executor));

        let id = queue
            .enqueue(NewOperation::new(OperationKind::Create, "/api/members", HttpMethod::Post))
            .await
            .expect("enqueue succeeds");

        let stats = queue.get_stats().await.expect("stats succeed");
        assert_eq!(stats.total, 1);
        assert_eq!(stats.pending, 1);
        assert_eq!(executor.call_count().await, 0);
        assert!(!id.is_empty());
    }

    #[tokio::test]
    async fn enqueue_uses_queue_default_retry_budget() {
        let store = Arc::new(MemStore::new(Vec::new()));
        let queue = queue_with(Arc::clone(&store), Arc::new(MockExecutor::succeeding()));
        queue.set_default_max_retries(5);

        queue
            .enqueue(NewOperation::new(OperationKind::Update, "/api/groups/1", HttpMethod::Put))
            .await
            .expect("enqueue succeeds");

        let ops = store.contents().await;
        assert_eq!(ops[0].max_retries, 5);
        assert_eq!(ops[0].retry_count, 0);
    }

    #[tokio::test]
    async fn drain_removes_successful_operations() {
        let store = Arc::new(MemStore::new(vec![
            sample_op("a", Priority::Normal, 100),
            sample_op("b", Priority::Normal, 200),
        ]));
        let queue = queue_with(Arc::clone(&store), Arc::new(MockExecutor::succeeding()));

        let outcome = queue.drain().await.expect("drain succeeds");
        assert_eq!(outcome, DrainOutcome { success: 2, failed: 0 });
        assert!(store.contents().await.is_empty());
    }

    #[tokio::test]
    async fn failing_operation_is_attempted_exactly_max_retries_times() {
        // max_retries = 3: attempts on three successive drains, then gone.
        let store = Arc::new(MemStore::new(vec![sample_op("stubborn", Priority::Normal, 100)]));
        let executor = Arc::new(MockExecutor::failing());
        let queue = queue_with(Arc::clone(&store), Arc::clone(&executor));

        let first = queue.drain().await.expect("drain succeeds");
        assert_eq!(first, DrainOutcome { success: 0, failed: 0 });
        assert_eq!(store.contents().await[0].retry_count, 1);

        let second = queue.drain().await.expect("drain succeeds");
        assert_eq!(second, DrainOutcome { success: 0, failed: 0 });
        assert_eq!(store.contents().await[0].retry_count, 2);

        let third = queue.drain().await.expect("drain succeeds");
        assert_eq!(third, DrainOutcome { success: 0, failed: 1 });

        assert!(store.contents().await.is_empty());
        assert_eq!(executor.call_count().await, 3);

        // A fourth drain finds nothing: never maxRetries + 1 attempts.
        let fourth = queue.drain().await.expect("drain succeeds");
        assert_eq!(fourth, DrainOutcome::default());
        assert_eq!(executor.call_count().await, 3);
    }

    #[tokio::test]
    async fn concurrent_drains_collapse_to_one_pass() {
        let store = Arc::new(MemStore::new(vec![sample_op("slow", Priority::Normal, 100)]));
        let executor = Arc::new(MockExecutor::slow(Duration::from_millis(200)));
        let queue = Arc::new(queue_with(Arc::clone(&store), Arc::clone(&executor)));

        let first = Arc::clone(&queue);
        let second = Arc::clone(&queue);
        let (a, b) = tokio::join!(
            tokio::spawn(async move { first.drain().await }),
            async move {
                // Let the first drain take the guard.
                tokio::time::sleep(Duration::from_millis(50)).await;
                second.drain().await
            },
        );

        let first_outcome = a.expect("task joins").expect("drain succeeds");
        let second_outcome = b.expect("drain succeeds");

        assert_eq!(first_outcome, DrainOutcome { success: 1, failed: 0 });
        assert_eq!(second_outcome, DrainOutcome::default());
        assert_eq!(executor.call_count().await, 1);
        assert!(store.contents().await.is_empty());
    }

    #[tokio::test]
    async fn drain_guard_releases_after_pass() {
        let store = Arc::new(MemStore::new(vec![sample_op("a", Priority::Normal, 100)]));
        let queue = queue_with(Arc::clone(&store), Arc::new(MockExecutor::succeeding()));

        queue.drain().await.expect("first drain succeeds");

        store.insert(&sample_op("b", Priority::Normal, 200)).await.expect("insert succeeds");
        let outcome = queue.drain().await.expect("second drain succeeds");
        assert_eq!(outcome.success, 1);
    }

    #[tokio::test]
    async fn blacklisted_endpoints_are_skipped_untouched() {
        let mut votes = sample_op("vote", Priority::High, 100);
        votes.endpoint = "/api/votes/42".into();
        let store =
            Arc::new(MemStore::new(vec![votes, sample_op("member", Priority::Normal, 200)]));
        let executor = Arc::new(MockExecutor::succeeding());
        let queue = queue_with(Arc::clone(&store), Arc::clone(&executor));

        let policy = DrainPolicy {
            blacklisted_endpoints: vec!["/api/votes".into()],
            ..DrainPolicy::default()
        };
        let outcome = queue.drain_with_policy(&policy).await.expect("drain succeeds");

        assert_eq!(outcome.success, 1);
        let remaining = store.contents().await;
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, "vote");
        assert_eq!(remaining[0].retry_count, 0);
        assert_eq!(executor.call_count().await, 1);
    }

    #[tokio::test]
    async fn priority_endpoints_drain_ahead_of_priority_class() {
        let mut urgent = sample_op("urgent", Priority::Low, 300);
        urgent.endpoint = "/api/emergencies/1".into();
        let store =
            Arc::new(MemStore::new(vec![sample_op("routine", Priority::High, 100), urgent]));
        let executor = Arc::new(MockExecutor::succeeding());
        let queue = queue_with(store, Arc::clone(&executor));

        let policy = DrainPolicy {
            priority_endpoints: vec!["/api/emergencies".into()],
            ..DrainPolicy::default()
        };
        queue.drain_with_policy(&policy).await.expect("drain succeeds");

        let order = executor.endpoints_called().await;
        assert_eq!(order[0], "/api/emergencies/1");
    }

    #[tokio::test]
    async fn stats_classify_pending_and_failed() {
        let mut retried = sample_op("retried", Priority::Normal, 200);
        retried.retry_count = 1;
        let mut exhausted = sample_op("exhausted", Priority::Low, 300);
        exhausted.retry_count = 3;
        let store = Arc::new(MemStore::new(vec![
            sample_op("fresh", Priority::High, 100),
            retried,
            exhausted,
        ]));
        let queue = queue_with(store, Arc::new(MockExecutor::succeeding()));

        let stats = queue.get_stats().await.expect("stats succeed");
        assert_eq!(stats.total, 3);
        assert_eq!(stats.pending, 1);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.by_priority.get("high"), Some(&1));
        assert_eq!(stats.by_kind.get("create"), Some(&3));
        assert_eq!(stats.oldest_operation, Some(100));
        assert_eq!(stats.newest_operation, Some(300));
    }

    #[tokio::test]
    async fn clear_queue_empties_the_store() {
        let store = Arc::new(MemStore::new(vec![
            sample_op("a", Priority::Normal, 100),
            sample_op("b", Priority::Low, 200),
        ]));
        let queue = queue_with(Arc::clone(&store), Arc::new(MockExecutor::succeeding()));

        queue.clear_queue().await.expect("clear succeeds");
        assert!(store.contents().await.is_empty());

        let stats = queue.get_stats().await.expect("stats succeed");
        assert_eq!(stats.total, 0);
    }

    #[tokio::test]
    async fn enqueue_nudges_the_drain_signal() {
        let store = Arc::new(MemStore::new(Vec::new()));
        let queue = queue_with(store, Arc::new(MockExecutor::succeeding()));
        let signal = queue.drain_signal();

        queue
            .enqueue(NewOperation::new(OperationKind::Delete, "/api/groups/9", HttpMethod::Delete))
            .await
            .expect("enqueue succeeds");

        // notified() must resolve immediately thanks to the stored permit.
        tokio::time::timeout(Duration::from_millis(100), signal.notified())
            .await
            .expect("signal fires");
    }
}
