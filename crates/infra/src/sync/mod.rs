//! Background maintenance for the sync subsystem.

pub mod cache_maintainer;

pub use cache_maintainer::{CacheMaintainer, CacheMaintainerConfig, SweepStats};
