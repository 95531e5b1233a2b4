//! Table key layout.

use rigwatch_core::TourId;

/// `CONFIG` key holding the JSON list of every device ever seen.
pub const ALL_SEEN_DEVICES: &str = "all_seen_devices";

pub const TOUR_COUNTER: &str = "tour";
pub const TRIP_COUNTER: &str = "trip";
pub const EVENT_COUNTER: &str = "event";
pub const TEMPERATURE_COUNTER: &str = "temperature";

pub fn tour_key(tour_id: TourId) -> String {
    format!("{tour_id:020}")
}

/// Key of a record belonging to a tour. Zero padding keeps lexicographic
/// order equal to numeric order.
pub fn child_key(tour_id: TourId, seq: u64) -> String {
    format!("{tour_id:020}:{seq:020}")
}

/// Prefix shared by every child record of a tour.
pub fn child_prefix(tour_id: TourId) -> String {
    format!("{tour_id:020}:")
}

/// Exclusive upper bound of [`child_prefix`]: `;` sorts right after `:`.
pub fn child_prefix_end(tour_id: TourId) -> String {
    format!("{tour_id:020};")
}
