//! Host environment probes.

pub mod probe;

pub use probe::{SharedHostProbe, StaticHostProbe};
