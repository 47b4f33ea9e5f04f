//! Port interfaces for sync operations

use std::time::Duration;

use async_trait::async_trait;
use steeple_domain::{HostSnapshot, QueueOperation, Result, SyncConfig, SyncStats};
use thiserror::Error;

/// Uniform classification of a single failed execution attempt
///
/// Transport faults, non-2xx responses, payload problems, and timeouts
/// are all treated identically by the queue: the retry count is
/// incremented until the budget is exhausted. No variant is permanent.
#[derive(Debug, Error)]
pub enum ExecutionFailure {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Protocol error: status {status}")]
    Protocol { status: u16 },

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Timeout after {0:?}")]
    Timeout(Duration),
}

/// Durable storage for the live operation queue
///
/// Implementations must make the retry-count update a single atomic
/// statement; concurrent update and remove on the same id are serialized
/// by the storage layer, not by caller ordering.
#[async_trait]
pub trait OperationStore: Send + Sync {
    /// Persist a newly enqueued operation
    async fn insert(&self, op: &QueueOperation) -> Result<()>;

    /// Fetch every live operation
    async fn fetch_all(&self) -> Result<Vec<QueueOperation>>;

    /// Delete an operation by id
    async fn remove(&self, id: &str) -> Result<()>;

    /// Overwrite the retry count for an operation
    async fn set_retry_count(&self, id: &str, retry_count: u32) -> Result<()>;

    /// Delete every live operation
    async fn clear(&self) -> Result<()>;
}

/// Storage for the single persisted [`SyncConfig`] record
#[async_trait]
pub trait ConfigStore: Send + Sync {
    /// Load the persisted policy, falling back to defaults when absent
    async fn load_config(&self) -> Result<SyncConfig>;

    /// Replace the persisted policy
    async fn save_config(&self, config: &SyncConfig) -> Result<()>;
}

/// Storage for the single persisted [`SyncStats`] record
#[async_trait]
pub trait StatsStore: Send + Sync {
    /// Load the persisted counters, falling back to defaults when absent
    async fn load_stats(&self) -> Result<SyncStats>;

    /// Rewrite the persisted counters in full
    async fn save_stats(&self, stats: &SyncStats) -> Result<()>;
}

/// Executes exactly one queued operation against its endpoint
///
/// Stateless and side-effect-free beyond the single network call.
/// Retry and backoff belong entirely to the queue.
#[async_trait]
pub trait OperationExecutor: Send + Sync {
    /// Perform one execution attempt
    async fn execute(&self, op: &QueueOperation) -> std::result::Result<(), ExecutionFailure>;
}

/// Narrow read-only view of the host environment
///
/// Non-browser hosts supply constant or stub values without altering
/// queue or scheduler logic.
pub trait HostProbe: Send + Sync {
    /// Current connectivity and battery snapshot
    fn snapshot(&self) -> HostSnapshot;
}
