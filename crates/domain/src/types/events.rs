//! Lifecycle events and host environment snapshots

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/* -------------------------------------------------------------------------- */
/* Lifecycle Events */
/* -------------------------------------------------------------------------- */

/// Observable scheduler state transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncEventKind {
    Started,
    Completed,
    Failed,
    Paused,
    Resumed,
}

crate::impl_domain_status_conversions!(SyncEventKind {
    Started => "started",
    Completed => "completed",
    Failed => "failed",
    Paused => "paused",
    Resumed => "resumed"
});

/// A lifecycle notification published to subscribers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncEvent {
    pub kind: SyncEventKind,
    /// Unix milliseconds at publication time
    pub timestamp: i64,
    pub details: Option<Value>,
}

impl SyncEvent {
    /// Build an event stamped with the current wall-clock time.
    #[must_use]
    pub fn now(kind: SyncEventKind, details: Option<Value>) -> Self {
        Self { kind, timestamp: Utc::now().timestamp_millis(), details }
    }
}

/* -------------------------------------------------------------------------- */
/* Host Environment */
/* -------------------------------------------------------------------------- */

/// Coarse network connection classification reported by the host
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionClass {
    Wifi,
    Ethernet,
    Cellular,
    #[default]
    Unknown,
}

crate::impl_domain_status_conversions!(ConnectionClass {
    Wifi => "wifi",
    Ethernet => "ethernet",
    Cellular => "cellular",
    Unknown => "unknown"
});

impl ConnectionClass {
    /// Unmetered connections that satisfy a wifi-only policy.
    #[must_use]
    pub const fn is_wifi_class(self) -> bool {
        matches!(self, Self::Wifi | Self::Ethernet)
    }
}

/// Read-only environment snapshot consumed by the scheduler
///
/// Battery level is best-effort; hosts without a battery report `None`,
/// which never blocks eligibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostSnapshot {
    pub online: bool,
    pub connection: ConnectionClass,
    pub battery_percent: Option<u8>,
}

impl Default for HostSnapshot {
    fn default() -> Self {
        Self { online: true, connection: ConnectionClass::Unknown, battery_percent: None }
    }
}
