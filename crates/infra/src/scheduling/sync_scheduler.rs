//! Interval-based sync scheduler with lifecycle management.
//!
//! Owns the background loop that drains the operation queue. Each cycle
//! re-reads the persisted policy, gates on a fresh host snapshot, drains
//! with a single in-flight pass, sweeps the read cache, and rewrites the
//! aggregated counters. Lifecycle transitions are published on the event
//! bus.
//!
//! The loop wakes on three edges: the configured interval elapsing, the
//! queue's enqueue nudge, and cancellation. `stop` cancels the loop but
//! never aborts an in-flight pass; the pass runs to completion and the
//! task is detached if it outlives the join timeout.

use std::sync::{Arc, Mutex as StdMutex};
use std::time::{Duration, Instant};

use chrono::Utc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::sync::CacheMaintainer;
use steeple_core::{
    is_eligible, ConfigStore, DrainPolicy, HostProbe, OperationQueue, StatsStore, SubscriptionId,
    SyncEventBus,
};
use steeple_domain::constants::{DEFAULT_SYNC_INTERVAL_MS, MIN_SYNC_GAP_MS};
use steeple_domain::{
    HostSnapshot, Result, SyncConfig, SyncConfigPatch, SyncEvent, SyncEventKind, SyncRunSummary,
    SyncStats,
};

type TaskHandle = Arc<Mutex<Option<JoinHandle<()>>>>;

/// Tunables for the scheduler lifecycle.
#[derive(Debug, Clone)]
pub struct SyncSchedulerOptions {
    /// Minimum wall-clock gap between the start of two cycles.
    pub min_sync_gap: Duration,
    /// How long `stop` waits for the loop before detaching it.
    pub join_timeout: Duration,
}

impl Default for SyncSchedulerOptions {
    fn default() -> Self {
        Self {
            min_sync_gap: Duration::from_millis(MIN_SYNC_GAP_MS),
            join_timeout: Duration::from_secs(5),
        }
    }
}

/// Shared state between the scheduler handle and its background loop.
struct SchedulerContext {
    queue: Arc<OperationQueue>,
    config_store: Arc<dyn ConfigStore>,
    stats_store: Arc<dyn StatsStore>,
    probe: Arc<dyn HostProbe>,
    cache: Arc<CacheMaintainer>,
    events: SyncEventBus,
    options: SyncSchedulerOptions,
    /// Start instant of the most recent cycle, for the min-gap throttle.
    last_sync: Mutex<Option<Instant>>,
}

impl SchedulerContext {
    /// Run one sync cycle end to end.
    ///
    /// Skips with an empty summary when the host is ineligible or the
    /// minimum gap since the previous cycle has not elapsed. Skipped
    /// cycles perform zero network calls and publish no events.
    async fn perform_sync(&self) -> Result<SyncRunSummary> {
        let config = self.config_store.load_config().await?;
        let snapshot = self.probe.snapshot();

        if !is_eligible(&config, &snapshot) {
            debug!(
                enabled = config.enabled,
                online = snapshot.online,
                battery = ?snapshot.battery_percent,
                "sync ineligible; skipping cycle"
            );
            return Ok(SyncRunSummary::default());
        }

        {
            let mut last = self.last_sync.lock().await;
            if let Some(previous) = *last {
                if previous.elapsed() < self.options.min_sync_gap {
                    debug!("minimum sync gap not elapsed; skipping cycle");
                    return Ok(SyncRunSummary::default());
                }
            }
            *last = Some(Instant::now());
        }

        self.events.publish(&SyncEvent::now(SyncEventKind::Started, None));
        let started = Instant::now();

        let drain_result = self.queue.drain_with_policy(&DrainPolicy::from(&config)).await;

        // Best-effort: a failed sweep never fails the cycle.
        if let Err(e) = self.cache.sweep().await {
            warn!(error = %e, "read-cache sweep failed");
        }

        let duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        match drain_result {
            Ok(outcome) => {
                let success = outcome.failed == 0;
                self.record_cycle(success, &snapshot, duration_ms).await;

                let details = serde_json::json!({
                    "executed": outcome.success,
                    "evicted": outcome.failed,
                });
                let kind =
                    if success { SyncEventKind::Completed } else { SyncEventKind::Failed };
                self.events.publish(&SyncEvent::now(kind, Some(details)));

                Ok(SyncRunSummary {
                    success,
                    operations_processed: outcome.success + outcome.failed,
                    duration_ms,
                })
            }
            Err(e) => {
                self.record_cycle(false, &snapshot, duration_ms).await;
                let details = serde_json::json!({ "error": e.to_string() });
                self.events.publish(&SyncEvent::now(SyncEventKind::Failed, Some(details)));
                Err(e)
            }
        }
    }

    /// Fold one finished cycle into the persisted counters.
    async fn record_cycle(&self, success: bool, snapshot: &HostSnapshot, duration_ms: u64) {
        let mut stats = self.stats_store.load_stats().await.unwrap_or_else(|e| {
            warn!(error = %e, "failed to load sync stats; starting fresh");
            SyncStats::default()
        });

        stats.total_syncs += 1;
        if success {
            stats.successful_syncs += 1;
        } else {
            stats.failed_syncs += 1;
        }
        stats.record_duration(duration_ms);
        stats.last_sync_at = Some(Utc::now().timestamp_millis());
        stats.battery_level = snapshot.battery_percent;
        stats.connection_type = snapshot.connection;

        if let Ok(queue_stats) = self.queue.get_stats().await {
            stats.pending_operations = queue_stats.total;
        }

        if let Err(e) = self.stats_store.save_stats(&stats).await {
            warn!(error = %e, "failed to persist sync stats");
        }
    }
}

/// Periodic sync scheduler.
pub struct SyncScheduler {
    ctx: Arc<SchedulerContext>,
    cancellation: StdMutex<CancellationToken>,
    task_handle: TaskHandle,
}

impl SyncScheduler {
    /// Create a scheduler with default options.
    pub fn new(
        queue: Arc<OperationQueue>,
        config_store: Arc<dyn ConfigStore>,
        stats_store: Arc<dyn StatsStore>,
        probe: Arc<dyn HostProbe>,
        cache: Arc<CacheMaintainer>,
    ) -> Self {
        Self::with_options(
            queue,
            config_store,
            stats_store,
            probe,
            cache,
            SyncSchedulerOptions::default(),
        )
    }

    /// Create a scheduler with explicit options.
    pub fn with_options(
        queue: Arc<OperationQueue>,
        config_store: Arc<dyn ConfigStore>,
        stats_store: Arc<dyn StatsStore>,
        probe: Arc<dyn HostProbe>,
        cache: Arc<CacheMaintainer>,
        options: SyncSchedulerOptions,
    ) -> Self {
        let token = CancellationToken::new();
        token.cancel();

        Self {
            ctx: Arc::new(SchedulerContext {
                queue,
                config_store,
                stats_store,
                probe,
                cache,
                events: SyncEventBus::new(),
                options,
                last_sync: Mutex::new(None),
            }),
            cancellation: StdMutex::new(token),
            task_handle: Arc::new(Mutex::new(None)),
        }
    }

    /// Start the background loop. Idempotent: a second call while the
    /// loop is active is a no-op.
    #[instrument(skip(self))]
    pub async fn start(&self) {
        // The running check and the handle store must happen under one
        // lock acquisition, or two callers racing here (connectivity and
        // visibility handlers both firing on a reconnect) can each spawn
        // a loop and the first one becomes uncancellable.
        let mut guard = self.task_handle.lock().await;
        if guard.as_ref().is_some_and(|handle| !handle.is_finished()) {
            warn!("sync scheduler already active; start is a no-op");
            return;
        }

        let cancel = CancellationToken::new();
        if let Ok(mut token) = self.cancellation.lock() {
            *token = cancel.clone();
        }

        let ctx = Arc::clone(&self.ctx);
        *guard = Some(tokio::spawn(async move {
            Self::run_loop(ctx, cancel).await;
        }));
        drop(guard);

        info!("sync scheduler started");
        self.ctx.events.publish(&SyncEvent::now(SyncEventKind::Resumed, None));
    }

    /// Stop the background loop.
    ///
    /// Cancels the loop and waits up to the join timeout. An in-flight
    /// cycle is never aborted; it runs to completion even after this
    /// returns.
    #[instrument(skip(self))]
    pub async fn stop(&self) {
        // Check and take under one lock acquisition, mirroring start().
        let mut guard = self.task_handle.lock().await;
        let Some(handle) = guard.take() else {
            debug!("sync scheduler not active");
            return;
        };
        if let Ok(token) = self.cancellation.lock() {
            token.cancel();
        }
        if handle.is_finished() {
            debug!("sync scheduler not active");
            return;
        }

        match tokio::time::timeout(self.ctx.options.join_timeout, handle).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(error = %e, "sync loop task failed"),
            Err(_) => warn!("sync loop still finishing an in-flight cycle; detaching"),
        }
        drop(guard);

        info!("sync scheduler stopped");
        self.ctx.events.publish(&SyncEvent::now(SyncEventKind::Paused, None));
    }

    /// Whether the background loop is currently active.
    pub fn is_active(&self) -> bool {
        self.task_handle
            .try_lock()
            .ok()
            .and_then(|guard| guard.as_ref().map(|h| !h.is_finished()))
            .unwrap_or(false)
    }

    /// Run one cycle immediately, independent of the background loop.
    ///
    /// Subject to the same eligibility and min-gap gates as scheduled
    /// cycles. Works while the scheduler is stopped.
    ///
    /// # Errors
    ///
    /// Returns an error when the policy cannot be loaded or the durable
    /// store fails mid-drain.
    pub async fn sync_now(&self) -> Result<SyncRunSummary> {
        self.ctx.perform_sync().await
    }

    /// Current persisted policy.
    ///
    /// # Errors
    ///
    /// Returns an error when the durable store cannot be read.
    pub async fn get_config(&self) -> Result<SyncConfig> {
        self.ctx.config_store.load_config().await
    }

    /// Apply a partial policy update and persist the result.
    ///
    /// The queue's default retry budget tracks the updated policy.
    /// Disabling sync also stops an active background loop.
    ///
    /// # Errors
    ///
    /// Returns an error when the durable store rejects the update.
    pub async fn update_config(&self, patch: SyncConfigPatch) -> Result<SyncConfig> {
        let mut config = self.ctx.config_store.load_config().await?;
        patch.apply_to(&mut config);
        self.ctx.config_store.save_config(&config).await?;

        self.ctx.queue.set_default_max_retries(config.max_retries);

        if !config.enabled && self.is_active() {
            self.stop().await;
        }

        Ok(config)
    }

    /// Current persisted counters.
    ///
    /// # Errors
    ///
    /// Returns an error when the durable store cannot be read.
    pub async fn get_stats(&self) -> Result<SyncStats> {
        self.ctx.stats_store.load_stats().await
    }

    /// Register a lifecycle event listener.
    pub fn subscribe<F>(&self, listener: F) -> SubscriptionId
    where
        F: Fn(&SyncEvent) + Send + Sync + 'static,
    {
        self.ctx.events.subscribe(listener)
    }

    /// Remove a lifecycle event listener.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.ctx.events.unsubscribe(id)
    }

    /// React to a host connectivity transition.
    ///
    /// Going offline stops the loop; coming back online restarts it when
    /// the policy allows, which triggers an immediate catch-up cycle.
    pub async fn handle_connectivity_change(&self, online: bool) {
        if online {
            match self.ctx.config_store.load_config().await {
                Ok(config) if config.enabled => self.start().await,
                Ok(_) => debug!("connectivity restored but sync disabled"),
                Err(e) => warn!(error = %e, "failed to load policy on connectivity change"),
            }
        } else {
            info!("host went offline; pausing sync");
            self.stop().await;
        }
    }

    /// React to the host surface being hidden or shown.
    ///
    /// Hidden pauses. Visible resumes only when the host is currently
    /// eligible, so a backgrounded app coming forward on a dead or
    /// battery-starved connection stays paused.
    pub async fn handle_visibility_change(&self, visible: bool) {
        if visible {
            match self.ctx.config_store.load_config().await {
                Ok(config) if is_eligible(&config, &self.ctx.probe.snapshot()) => {
                    self.start().await;
                }
                Ok(_) => debug!("surface visible but host not eligible for sync"),
                Err(e) => warn!(error = %e, "failed to load policy on visibility change"),
            }
        } else {
            debug!("surface hidden; pausing sync");
            self.stop().await;
        }
    }

    /// Background loop: immediate cycle, then wake on interval elapse or
    /// enqueue nudge until cancelled.
    async fn run_loop(ctx: Arc<SchedulerContext>, cancel: CancellationToken) {
        let drain_signal = ctx.queue.drain_signal();

        loop {
            if let Err(e) = ctx.perform_sync().await {
                warn!(error = %e, "sync cycle failed");
            }

            let interval = match ctx.config_store.load_config().await {
                Ok(config) => Duration::from_millis(config.interval_ms),
                Err(e) => {
                    warn!(error = %e, "failed to load policy; using default interval");
                    Duration::from_millis(DEFAULT_SYNC_INTERVAL_MS)
                }
            };

            tokio::select! {
                () = cancel.cancelled() => {
                    debug!("sync loop cancelled");
                    break;
                }
                () = tokio::time::sleep(interval) => {}
                () = drain_signal.notified() => {
                    debug!("drain signal received");
                }
            }
        }
    }
}

/// Best-effort cleanup: cancel the loop when the handle is dropped.
impl Drop for SyncScheduler {
    fn drop(&mut self) {
        if let Ok(guard) = self.cancellation.lock() {
            if !guard.is_cancelled() {
                warn!("sync scheduler dropped while active; cancelling");
                guard.cancel();
            }
        }
    }
}
