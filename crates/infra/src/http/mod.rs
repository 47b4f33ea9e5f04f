//! Network execution over HTTP.

pub mod executor;

pub use executor::{HttpExecutor, HttpExecutorConfig};
