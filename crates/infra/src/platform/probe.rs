//! Host probe implementations.
//!
//! The scheduler only ever reads a snapshot, so hosts without live
//! connectivity or battery signals supply a constant probe. Hosts that
//! do receive change events push them into a shared probe, which the
//! next eligibility check then observes.

use std::sync::RwLock;

use tracing::debug;

use steeple_core::HostProbe;
use steeple_domain::{ConnectionClass, HostSnapshot};

/// Probe returning a fixed snapshot, for hosts with no environment signals.
pub struct StaticHostProbe {
    snapshot: HostSnapshot,
}

impl StaticHostProbe {
    /// Construct a probe that always reports the given snapshot.
    #[must_use]
    pub const fn new(snapshot: HostSnapshot) -> Self {
        Self { snapshot }
    }

    /// An always-online probe with no battery signal.
    #[must_use]
    pub fn online() -> Self {
        Self::new(HostSnapshot::default())
    }
}

impl HostProbe for StaticHostProbe {
    fn snapshot(&self) -> HostSnapshot {
        self.snapshot
    }
}

/// Probe whose snapshot is updated by host change notifications.
#[derive(Default)]
pub struct SharedHostProbe {
    state: RwLock<HostSnapshot>,
}

impl SharedHostProbe {
    /// Construct a probe seeded with the default snapshot.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Construct a probe seeded with an explicit snapshot.
    #[must_use]
    pub fn with_snapshot(snapshot: HostSnapshot) -> Self {
        Self { state: RwLock::new(snapshot) }
    }

    /// Record a connectivity transition.
    pub fn set_online(&self, online: bool) {
        if let Ok(mut state) = self.state.write() {
            debug!(online, "host connectivity changed");
            state.online = online;
        }
    }

    /// Record a connection class change.
    pub fn set_connection(&self, connection: ConnectionClass) {
        if let Ok(mut state) = self.state.write() {
            state.connection = connection;
        }
    }

    /// Record a battery level reading, or `None` when the host stops
    /// reporting one.
    pub fn set_battery(&self, battery_percent: Option<u8>) {
        if let Ok(mut state) = self.state.write() {
            state.battery_percent = battery_percent;
        }
    }

    /// Replace the whole snapshot at once.
    pub fn set_snapshot(&self, snapshot: HostSnapshot) {
        if let Ok(mut state) = self.state.write() {
            *state = snapshot;
        }
    }
}

impl HostProbe for SharedHostProbe {
    fn snapshot(&self) -> HostSnapshot {
        // A poisoned lock means a writer panicked mid-update; fall back
        // to the default (online, unknown class) rather than propagate.
        self.state.read().map(|state| *state).unwrap_or_default()
    }
}
