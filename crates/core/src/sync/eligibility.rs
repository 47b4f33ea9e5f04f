//! Sync eligibility policy.
//!
//! Recomputed from a fresh host snapshot at the start of every cycle.
//! When the gate is closed the scheduler performs zero network calls.

use steeple_domain::{HostSnapshot, SyncConfig};

/// The eligibility predicate:
/// `enabled ∧ online ∧ battery above threshold ∧ (¬wifi_only ∨ wifi-class)`.
///
/// Hosts that cannot report a battery level never fail the battery gate.
#[must_use]
pub fn is_eligible(config: &SyncConfig, snapshot: &HostSnapshot) -> bool {
    if !config.enabled || !snapshot.online {
        return false;
    }

    if let Some(battery) = snapshot.battery_percent {
        if battery <= config.battery_threshold_percent {
            return false;
        }
    }

    if config.wifi_only && !snapshot.connection.is_wifi_class() {
        return false;
    }

    true
}
