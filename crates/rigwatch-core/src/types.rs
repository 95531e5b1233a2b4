//! Domain types shared by the gateway and the device-side motor tracker.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::capability::{Capability, CapabilitySet};

/// Device identity as reported by the device itself.
pub type DeviceId = String;

/// Identifier of a configured photo tour.
pub type TourId = u64;

// ── Health ─────────────────────────────────────────────────────────

/// Health report returned by a device's health endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct DeviceHealth {
    pub device_id: DeviceId,
    pub device_name: String,
    #[serde(rename = "state")]
    pub capabilities: CapabilitySet,
}

impl DeviceHealth {
    pub fn has(&self, capability: Capability) -> bool {
        self.capabilities.contains(capability)
    }
}

/// The gateway's view of one device: last known health plus poll bookkeeping.
///
/// `retry_count` is the number of consecutive failed polls; it is 0 right
/// after a successful poll.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeviceHealthState {
    pub health: DeviceHealth,
    pub retry_count: u32,
    pub ip: String,
}

impl DeviceHealthState {
    /// A freshly discovered address whose health has not been queried yet.
    pub fn discovered(ip: &str) -> Self {
        Self {
            health: DeviceHealth::default(),
            retry_count: 0,
            ip: ip.to_string(),
        }
    }

    /// Whether the device has answered at least one health query.
    pub fn is_identified(&self) -> bool {
        !self.health.device_id.is_empty()
    }
}

/// Entry of the durable "every device ever seen" log.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SeenDevice {
    pub id: DeviceId,
    pub name: String,
    pub last_ip: String,
    pub last_health: CapabilitySet,
}

// ── Outlets ────────────────────────────────────────────────────────

/// Radio codes that switch one power outlet.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct OutletCodes {
    pub on_code: i64,
    pub off_code: i64,
}

/// Operator-configured wiring: which outlet powers which device.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SwitchAssociation {
    pub device_id: DeviceId,
    pub outlet: OutletCodes,
}

// ── Movement ───────────────────────────────────────────────────────

/// One stop of a sweep, relative to the previous stop.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MovementPoint {
    pub step_offset: i32,
    pub focus_cm: f32,
    pub speed: i32,
    #[serde(default)]
    pub comment: String,
}

/// Ordered sweep for one device.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MovementPlan {
    pub device_id: DeviceId,
    pub name: String,
    pub points: Vec<MovementPoint>,
}

impl MovementPlan {
    /// Absolute target positions: the running sum of the relative offsets.
    pub fn targets(&self) -> Vec<i32> {
        self.points
            .iter()
            .scan(0i32, |acc, p| {
                *acc += p.step_offset;
                Some(*acc)
            })
            .collect()
    }

    /// `(max, min)` positions a move may reach before the rig cuts power.
    ///
    /// Covers home (0) and every target. Each side's extent is scaled by
    /// `scale` (truncated toward zero), then widened by `margin` steps.
    pub fn safety_bounds(&self, scale: f64, margin: i32) -> (i32, i32) {
        let targets = self.targets();
        let max = targets.iter().copied().chain([0]).max().unwrap_or(0);
        let min = targets.iter().copied().chain([0]).min().unwrap_or(0);
        let scaled = |extent: i32| (f64::from(extent) * scale) as i32;
        (
            scaled(max).saturating_add(margin),
            scaled(min).saturating_sub(margin),
        )
    }
}

// ── Motor ──────────────────────────────────────────────────────────

/// Authoritative motor state reported by a device.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct MotorState {
    #[serde(rename = "engaged")]
    pub is_engaged: bool,
    #[serde(rename = "position")]
    pub current_position: i32,
    #[serde(rename = "dirty")]
    pub is_dirty: bool,
}

/// Motor position at one instant. History is strictly time-ordered.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct MotorPositionSample {
    pub step_count: i32,
    pub timestamp_ms: i64,
}

/// Parameters of one motor move, as sent to the device.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct MoveCommand {
    pub steps: i32,
    /// Shortest pulse period in microseconds (plateau speed).
    pub min_time: u32,
    /// Longest pulse period in microseconds (start/stop speed).
    pub max_time: u32,
    pub ramp_length: u32,
    pub max_allowed_position: i32,
    pub min_allowed_position: i32,
}

// ── Tours ──────────────────────────────────────────────────────────

/// A recurring sweep schedule for one device.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PhotoTour {
    pub id: TourId,
    pub device_id: DeviceId,
    pub name: String,
    pub comment: String,
    pub interval_minutes: f32,
    pub finished: bool,
    /// Whether the thermal camera is part of this tour.
    pub uses_ir: bool,
    pub created_at: u64,
}

/// Result record of one trip. Written for every trip, even failed ones.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PhotoTourTrip {
    pub id: u64,
    pub tour_id: TourId,
    pub ir_folder: String,
    pub vis_folder: String,
    /// Unix milliseconds.
    pub timestamp: u64,
}

impl PhotoTourTrip {
    /// A trip that produced no image folders at all.
    pub fn is_empty(&self) -> bool {
        self.ir_folder.is_empty() && self.vis_folder.is_empty()
    }
}

/// Severity of an audit event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventSeverity {
    Debug,
    Information,
    Warning,
    Error,
    Critical,
}

impl std::fmt::Display for EventSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            EventSeverity::Debug => "debug",
            EventSeverity::Information => "information",
            EventSeverity::Warning => "warning",
            EventSeverity::Error => "error",
            EventSeverity::Critical => "critical",
        };
        f.write_str(s)
    }
}

/// One entry of a tour's audit trail.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PhotoTourEvent {
    pub tour_id: TourId,
    pub message: String,
    pub severity: EventSeverity,
    /// Unix milliseconds.
    pub timestamp: u64,
}

/// Temperature reading taken from a thermal frame during a trip.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TemperatureSample {
    pub tour_id: TourId,
    pub device_id: DeviceId,
    pub celsius: f32,
    /// Unix milliseconds.
    pub timestamp: u64,
}

pub fn epoch_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
