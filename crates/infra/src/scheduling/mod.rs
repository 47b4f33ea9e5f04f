//! Background scheduling of sync cycles.

pub mod sync_scheduler;

pub use sync_scheduler::{SyncScheduler, SyncSchedulerOptions};
