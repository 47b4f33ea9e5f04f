//! # Steeple Domain
//!
//! Business domain types and models for the Steeple sync engine.
//!
//! This crate contains:
//! - Queue operation types (`QueueOperation`, `Priority`, `OperationKind`)
//! - Sync policy and statistics (`SyncConfig`, `SyncStats`)
//! - Lifecycle event types (`SyncEvent`)
//! - Domain error types and Result definitions
//!
//! ## Architecture
//! - No dependencies on other Steeple crates
//! - Only external dependencies allowed
//! - Pure domain models and data structures

pub mod constants;
pub mod errors;
pub mod macros;
pub mod types;

// Re-export commonly used items
pub use constants::*;
pub use errors::*;
pub use types::*;
