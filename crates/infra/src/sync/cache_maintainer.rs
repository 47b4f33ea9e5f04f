//! Size- and age-bounded eviction for the read cache.
//!
//! The sweep runs opportunistically at the end of each sync cycle. It
//! never blocks the drain: a failed sweep is logged and retried on the
//! next cycle.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info};

use crate::database::CacheRepository;
use steeple_domain::constants::{
    CACHE_DELETE_BATCH_SIZE, CACHE_RETENTION_DAYS, CACHE_SIZE_BUDGET_BYTES,
};
use steeple_domain::Result;

const MS_PER_DAY: i64 = 86_400_000;

/// Eviction policy for the read cache.
#[derive(Debug, Clone)]
pub struct CacheMaintainerConfig {
    /// Sweeps are skipped while total cached bytes stay at or under this.
    pub size_budget_bytes: u64,
    /// Entries older than this are eligible for eviction.
    pub retention_days: u32,
    /// Rows deleted per statement during a sweep.
    pub delete_batch_size: usize,
}

impl Default for CacheMaintainerConfig {
    fn default() -> Self {
        Self {
            size_budget_bytes: CACHE_SIZE_BUDGET_BYTES,
            retention_days: CACHE_RETENTION_DAYS,
            delete_batch_size: CACHE_DELETE_BATCH_SIZE,
        }
    }
}

/// Outcome of one sweep pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepStats {
    pub entries_deleted: usize,
    pub bytes_before: u64,
    pub bytes_after: u64,
}

/// Maintains the read cache within its size and age bounds.
pub struct CacheMaintainer {
    cache: Arc<CacheRepository>,
    config: CacheMaintainerConfig,
}

impl CacheMaintainer {
    /// Construct a maintainer with the default policy.
    pub fn new(cache: Arc<CacheRepository>) -> Self {
        Self::with_config(cache, CacheMaintainerConfig::default())
    }

    /// Construct a maintainer with an explicit policy.
    pub fn with_config(cache: Arc<CacheRepository>, config: CacheMaintainerConfig) -> Self {
        Self { cache, config }
    }

    fn cutoff(&self) -> i64 {
        Utc::now().timestamp_millis() - i64::from(self.config.retention_days) * MS_PER_DAY
    }

    /// Evict aged entries when the cache exceeds its size budget.
    ///
    /// No-op while total size stays within budget. Deletes oldest-first
    /// in batches until no entries older than the retention cutoff
    /// remain.
    ///
    /// # Errors
    ///
    /// Returns `SteepleError::Database` when a cache query or delete
    /// fails.
    pub async fn sweep(&self) -> Result<SweepStats> {
        let bytes_before = self.cache.total_size().await?;
        if bytes_before <= self.config.size_budget_bytes {
            debug!(total_bytes = bytes_before, "cache within budget, sweep skipped");
            return Ok(SweepStats { bytes_before, bytes_after: bytes_before, ..SweepStats::default() });
        }

        let cutoff = self.cutoff();
        let mut entries_deleted = 0usize;

        loop {
            let deleted = self.cache.delete_older_than(cutoff, self.config.delete_batch_size).await?;
            entries_deleted += deleted;
            if deleted < self.config.delete_batch_size {
                break;
            }
        }

        let bytes_after = self.cache.total_size().await?;
        info!(
            entries_deleted,
            bytes_before, bytes_after, "cache sweep completed"
        );

        Ok(SweepStats { entries_deleted, bytes_before, bytes_after })
    }

    /// Report what a sweep would delete without deleting anything.
    ///
    /// # Errors
    ///
    /// Returns `SteepleError::Database` when a cache query fails.
    pub async fn sweep_dry_run(&self) -> Result<SweepStats> {
        let bytes_before = self.cache.total_size().await?;
        if bytes_before <= self.config.size_budget_bytes {
            return Ok(SweepStats { bytes_before, bytes_after: bytes_before, ..SweepStats::default() });
        }

        let entries_deleted = self.cache.count_older_than(self.cutoff()).await?;
        Ok(SweepStats { entries_deleted, bytes_before, bytes_after: bytes_before })
    }
}
