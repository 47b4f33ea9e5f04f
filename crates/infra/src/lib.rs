//! # Steeple Infrastructure
//!
//! Infrastructure implementations of core sync ports.
//!
//! This crate contains:
//! - SQLite-backed durable store (queue, config, stats, read cache)
//! - reqwest-backed network executor
//! - The background sync scheduler
//! - Read-cache maintenance
//! - Host configuration loading and environment probes
//!
//! ## Architecture
//! - Implements traits defined in `steeple-core`
//! - Depends on `steeple-domain` and `steeple-core`
//! - Contains all "impure" code (I/O, network, platform probes)

pub mod config;
pub mod database;
pub mod http;
pub mod platform;
pub mod scheduling;
pub mod sync;

// Re-export commonly used items
pub use database::{CacheRepository, DbManager, SqliteOperationStore, SqliteSettingsRepository};
pub use http::{HttpExecutor, HttpExecutorConfig};
pub use platform::{SharedHostProbe, StaticHostProbe};
pub use scheduling::{SyncScheduler, SyncSchedulerOptions};
pub use sync::{CacheMaintainer, CacheMaintainerConfig, SweepStats};
