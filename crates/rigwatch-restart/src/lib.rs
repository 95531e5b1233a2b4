//! rigwatch-restart — power-cycling misbehaving devices.
//!
//! A device is power-cycled through the radio outlet wired to it, switched
//! by every healthy peer able to send outlet codes.
//!
//! # Restart procedure
//!
//! ```text
//! failures += 1
//! if now - last_restart < cooldown:   no-op
//! if failures < failure_threshold:    no-op
//! if no outlet codes for device:      no-op (warning)
//! if no peer can switch outlets:      no-op (warning)
//! wait safety_delay
//! OFF code via every switcher  ─┐ every OFF completes
//! remove device from registry   │ before any ON
//! last_restart = now, failures = 0
//! ON code via every switcher   ─┘
//! ```
//!
//! `immediate_restart` skips the cooldown and threshold checks.

pub mod coordinator;

pub use coordinator::{RestartCoordinator, RestartDecision};
