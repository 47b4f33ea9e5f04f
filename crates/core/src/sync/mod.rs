//! Offline-first sync engine core
//!
//! The queue persists pending remote mutations and owns ordering plus
//! retry bookkeeping; the ports abstract the durable store, the network
//! executor, and the host environment; the event bus carries scheduler
//! lifecycle notifications to subscribers.

pub mod eligibility;
pub mod events;
pub mod ports;
pub mod queue;
