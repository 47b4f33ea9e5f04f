//! Sync policy and aggregated statistics
//!
//! `SyncConfig` is owned by the configuration surface and read once per
//! scheduler cycle; `SyncStats` is rewritten in full after each cycle and
//! survives restarts.

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_BATTERY_THRESHOLD_PERCENT, DEFAULT_MAX_RETRIES, DEFAULT_RETRY_DELAY_MS,
    DEFAULT_SYNC_INTERVAL_MS,
};
use crate::types::events::ConnectionClass;

/* -------------------------------------------------------------------------- */
/* Sync Policy */
/* -------------------------------------------------------------------------- */

/// Scheduler policy snapshot
///
/// Never mutated by the queue or the executor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncConfig {
    pub enabled: bool,
    pub interval_ms: u64,
    /// Syncing is ineligible at or below this battery level
    pub battery_threshold_percent: u8,
    pub wifi_only: bool,
    /// Default retry budget for newly enqueued operations
    pub max_retries: u32,
    pub retry_delay_ms: u64,
    /// Endpoint prefixes drained ahead of their priority class
    pub priority_endpoints: Vec<String>,
    /// Endpoint prefixes skipped during drain (operations stay queued)
    pub blacklisted_endpoints: Vec<String>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_ms: DEFAULT_SYNC_INTERVAL_MS,
            battery_threshold_percent: DEFAULT_BATTERY_THRESHOLD_PERCENT,
            wifi_only: false,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_delay_ms: DEFAULT_RETRY_DELAY_MS,
            priority_endpoints: Vec::new(),
            blacklisted_endpoints: Vec::new(),
        }
    }
}

/// Partial update applied over the persisted [`SyncConfig`]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SyncConfigPatch {
    pub enabled: Option<bool>,
    pub interval_ms: Option<u64>,
    pub battery_threshold_percent: Option<u8>,
    pub wifi_only: Option<bool>,
    pub max_retries: Option<u32>,
    pub retry_delay_ms: Option<u64>,
    pub priority_endpoints: Option<Vec<String>>,
    pub blacklisted_endpoints: Option<Vec<String>>,
}

impl SyncConfigPatch {
    /// Merge this patch into `config`, leaving unset fields untouched.
    pub fn apply_to(self, config: &mut SyncConfig) {
        if let Some(enabled) = self.enabled {
            config.enabled = enabled;
        }
        if let Some(interval_ms) = self.interval_ms {
            config.interval_ms = interval_ms;
        }
        if let Some(threshold) = self.battery_threshold_percent {
            config.battery_threshold_percent = threshold;
        }
        if let Some(wifi_only) = self.wifi_only {
            config.wifi_only = wifi_only;
        }
        if let Some(max_retries) = self.max_retries {
            config.max_retries = max_retries;
        }
        if let Some(retry_delay_ms) = self.retry_delay_ms {
            config.retry_delay_ms = retry_delay_ms;
        }
        if let Some(priority_endpoints) = self.priority_endpoints {
            config.priority_endpoints = priority_endpoints;
        }
        if let Some(blacklisted_endpoints) = self.blacklisted_endpoints {
            config.blacklisted_endpoints = blacklisted_endpoints;
        }
    }
}

/* -------------------------------------------------------------------------- */
/* Sync Statistics */
/* -------------------------------------------------------------------------- */

/// Aggregated, process-durable sync counters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncStats {
    /// Unix milliseconds of the last completed cycle
    pub last_sync_at: Option<i64>,
    pub total_syncs: u64,
    pub successful_syncs: u64,
    pub failed_syncs: u64,
    /// Rolling mean over all cycles
    pub average_sync_time_ms: f64,
    pub pending_operations: u64,
    pub battery_level: Option<u8>,
    pub connection_type: ConnectionClass,
}

impl Default for SyncStats {
    fn default() -> Self {
        Self {
            last_sync_at: None,
            total_syncs: 0,
            successful_syncs: 0,
            failed_syncs: 0,
            average_sync_time_ms: 0.0,
            pending_operations: 0,
            battery_level: None,
            connection_type: ConnectionClass::Unknown,
        }
    }
}

impl SyncStats {
    /// Fold one cycle duration into the rolling average.
    ///
    /// Call after `total_syncs` has been incremented for the cycle.
    pub fn record_duration(&mut self, duration_ms: u64) {
        #[allow(clippy::cast_precision_loss)]
        let total = self.total_syncs.max(1) as f64;
        #[allow(clippy::cast_precision_loss)]
        let duration = duration_ms as f64;
        self.average_sync_time_ms += (duration - self.average_sync_time_ms) / total;
    }
}

/// Result of one manual or scheduled sync run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncRunSummary {
    pub success: bool,
    pub operations_processed: u64,
    pub duration_ms: u64,
}
