//! redb table definitions.
//!
//! Every table uses `&str` keys and `&[u8]` JSON values.

use redb::TableDefinition;

/// Photo tours keyed by `{tour_id:020}`.
pub const TOURS: TableDefinition<&str, &[u8]> = TableDefinition::new("tours");

/// Trip records keyed by `{tour_id:020}:{trip_id:020}`.
pub const TRIPS: TableDefinition<&str, &[u8]> = TableDefinition::new("trips");

/// Audit events keyed by `{tour_id:020}:{seq:020}`.
pub const EVENTS: TableDefinition<&str, &[u8]> = TableDefinition::new("events");

/// One movement plan per device, keyed by device id.
pub const MOVEMENT_PLANS: TableDefinition<&str, &[u8]> = TableDefinition::new("movement_plans");

/// Outlet codes keyed by the id of the device they power.
pub const SWITCH_ASSOCIATIONS: TableDefinition<&str, &[u8]> =
    TableDefinition::new("switch_associations");

/// Well-known configuration blobs.
pub const CONFIG: TableDefinition<&str, &[u8]> = TableDefinition::new("config");

/// Temperature samples keyed by `{tour_id:020}:{seq:020}`.
pub const TEMPERATURES: TableDefinition<&str, &[u8]> = TableDefinition::new("temperatures");

/// Monotonic id counters keyed by counter name.
pub const COUNTERS: TableDefinition<&str, &[u8]> = TableDefinition::new("counters");
