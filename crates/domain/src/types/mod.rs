//! Domain types and models
//!
//! Queue operations, sync policy/statistics, and lifecycle events for the
//! offline-first sync engine.

pub mod events;
pub mod policy;
pub mod queue;

pub use events::{ConnectionClass, HostSnapshot, SyncEvent, SyncEventKind};
pub use policy::{SyncConfig, SyncConfigPatch, SyncRunSummary, SyncStats};
pub use queue::{
    DrainOutcome, HttpMethod, OperationKind, OperationMetadata, Priority, QueueOperation,
    QueueStatsSnapshot,
};
