//! Application constants
//!
//! Centralized location for all domain-level constants used throughout the
//! sync engine.

// Queue defaults
pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_RETRY_DELAY_MS: u64 = 5_000;

// Scheduler defaults
pub const DEFAULT_SYNC_INTERVAL_MS: u64 = 60_000;
pub const DEFAULT_BATTERY_THRESHOLD_PERCENT: u8 = 20;
pub const MIN_SYNC_GAP_MS: u64 = 5_000;

// Network execution
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

// Read-cache maintenance
pub const CACHE_SIZE_BUDGET_BYTES: u64 = 10 * 1024 * 1024;
pub const CACHE_RETENTION_DAYS: u32 = 7;
pub const CACHE_DELETE_BATCH_SIZE: usize = 1_000;
