//! # Steeple Core
//!
//! Pure business logic layer - no infrastructure dependencies.
//!
//! This crate contains:
//! - Port/adapter interfaces (traits) for storage, execution, and probes
//! - The durable operation queue and its drain discipline
//! - The lifecycle event bus and the sync eligibility policy
//!
//! ## Architecture Principles
//! - Only depends on `steeple-domain`
//! - No database, HTTP, or platform code
//! - All external dependencies via traits
//! - Pure, testable business logic

pub mod sync;

// Re-export the port traits for adapter crates
pub use sync::eligibility::is_eligible;
pub use sync::events::{SubscriptionId, SyncEventBus};
pub use sync::ports::{
    ConfigStore, ExecutionFailure, HostProbe, OperationExecutor, OperationStore, StatsStore,
};
pub use sync::queue::{DrainPolicy, NewOperation, OperationQueue};
