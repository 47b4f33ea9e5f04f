//! Durable operation queue types
//!
//! A `QueueOperation` is a pending remote mutation that has not yet been
//! confirmed by the server. Operations survive process restarts and are
//! drained in priority order once connectivity returns.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/* -------------------------------------------------------------------------- */
/* Operation Classification */
/* -------------------------------------------------------------------------- */

/// Kind of remote mutation represented by a queue operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    Create,
    Update,
    Delete,
}

crate::impl_domain_status_conversions!(OperationKind {
    Create => "create",
    Update => "update",
    Delete => "delete"
});

/// HTTP method used when executing an operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
}

crate::impl_domain_status_conversions!(HttpMethod {
    Get => "get",
    Post => "post",
    Put => "put",
    Delete => "delete"
});

/// Dequeue priority class
///
/// Priority plus `enqueued_at` fully determine dequeue order: priority
/// descending, then `enqueued_at` ascending (stable FIFO within a class).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    Normal,
    Low,
}

crate::impl_domain_status_conversions!(Priority {
    High => "high",
    Normal => "normal",
    Low => "low"
});

impl Priority {
    /// Sort rank: lower rank drains first.
    #[must_use]
    pub const fn rank(self) -> u8 {
        match self {
            Self::High => 0,
            Self::Normal => 1,
            Self::Low => 2,
        }
    }

    /// Inverse of [`Priority::rank`], defaulting to `Normal` for unknown
    /// ranks read back from storage.
    #[must_use]
    pub const fn from_rank(rank: u8) -> Self {
        match rank {
            0 => Self::High,
            2 => Self::Low,
            _ => Self::Normal,
        }
    }
}

/* -------------------------------------------------------------------------- */
/* Queue Operation */
/* -------------------------------------------------------------------------- */

/// Free-form attribution attached to an operation, for observability only
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationMetadata {
    pub actor: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
}

/// A pending remote mutation not yet confirmed by the server
///
/// Lifecycle: created on enqueue; mutated only by incrementing
/// `retry_count` after a failed attempt; deleted on successful execution
/// or when `retry_count` reaches `max_retries`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueOperation {
    /// Unique opaque identifier, generated at enqueue time
    pub id: String,
    pub kind: OperationKind,
    /// Target resource URI
    pub endpoint: String,
    pub method: HttpMethod,
    /// Opaque structured payload; absent for GET/DELETE
    pub payload: Option<Value>,
    /// Merged with executor defaults at execution time
    pub headers: BTreeMap<String, String>,
    /// Unix milliseconds; set once, immutable
    pub enqueued_at: i64,
    /// Failed attempts so far; 0 <= retry_count <= max_retries while queued
    pub retry_count: u32,
    pub max_retries: u32,
    pub priority: Priority,
    pub metadata: Option<OperationMetadata>,
}

impl QueueOperation {
    /// True once the operation has consumed its final permitted attempt.
    #[must_use]
    pub const fn is_exhausted(&self) -> bool {
        self.retry_count >= self.max_retries
    }
}

/* -------------------------------------------------------------------------- */
/* Queue Statistics */
/* -------------------------------------------------------------------------- */

/// Point-in-time view of the live queue
///
/// `pending` counts operations that have never failed an attempt
/// (`retry_count == 0`); `failed` counts operations observed at or past
/// their retry budget at query time.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueueStatsSnapshot {
    pub total: u64,
    pub pending: u64,
    pub failed: u64,
    pub by_kind: BTreeMap<String, u64>,
    pub by_priority: BTreeMap<String, u64>,
    /// `enqueued_at` of the oldest live operation (unix ms)
    pub oldest_operation: Option<i64>,
    /// `enqueued_at` of the newest live operation (unix ms)
    pub newest_operation: Option<i64>,
}

/// Result of one complete drain pass over the queue
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrainOutcome {
    /// Operations executed and removed
    pub success: u64,
    /// Operations evicted after exhausting their retry budget
    pub failed: u64,
}
