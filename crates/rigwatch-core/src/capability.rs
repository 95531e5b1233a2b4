//! Device capability vocabulary.
//!
//! Devices report their functional hardware as an integer bitmask. The
//! gateway never handles that integer directly; it is wrapped in
//! [`CapabilitySet`] and queried through the named [`Capability`] values.
//! The bit layout is the one the devices report, which is authoritative.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A single hardware capability a device can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    VisibleCameraFound,
    ThermalCameraFound,
    VisibleCameraFunctional,
    ThermalCameraFunctional,
    HasTemperatureSensor,
    CanSwitchOutlets,
    Calibrated,
}

impl Capability {
    /// Every capability, in bit order.
    pub const ALL: [Capability; 7] = [
        Capability::VisibleCameraFound,
        Capability::ThermalCameraFound,
        Capability::VisibleCameraFunctional,
        Capability::ThermalCameraFunctional,
        Capability::HasTemperatureSensor,
        Capability::CanSwitchOutlets,
        Capability::Calibrated,
    ];

    /// Wire bit for this capability.
    pub const fn bit(self) -> u32 {
        match self {
            Capability::VisibleCameraFound => 1,
            Capability::ThermalCameraFound => 2,
            Capability::VisibleCameraFunctional => 4,
            Capability::ThermalCameraFunctional => 8,
            Capability::HasTemperatureSensor => 16,
            Capability::CanSwitchOutlets => 32,
            Capability::Calibrated => 64,
        }
    }

    fn name(self) -> &'static str {
        match self {
            Capability::VisibleCameraFound => "visible_camera_found",
            Capability::ThermalCameraFound => "thermal_camera_found",
            Capability::VisibleCameraFunctional => "visible_camera_functional",
            Capability::ThermalCameraFunctional => "thermal_camera_functional",
            Capability::HasTemperatureSensor => "has_temperature_sensor",
            Capability::CanSwitchOutlets => "can_switch_outlets",
            Capability::Calibrated => "calibrated",
        }
    }
}

/// Set of capabilities reported by a device.
///
/// Serializes as the raw bitmask. Unknown bits sent by newer devices are
/// preserved so a round trip through the gateway does not lose them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CapabilitySet(u32);

impl CapabilitySet {
    /// The empty set.
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Wrap a bitmask exactly as reported by a device.
    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    /// The raw bitmask.
    pub const fn bits(self) -> u32 {
        self.0
    }

    pub fn contains(self, capability: Capability) -> bool {
        self.0 & capability.bit() != 0
    }

    pub fn insert(&mut self, capability: Capability) {
        self.0 |= capability.bit();
    }

    pub fn remove(&mut self, capability: Capability) {
        self.0 &= !capability.bit();
    }

    /// Builder-style insert.
    pub fn with(mut self, capability: Capability) -> Self {
        self.insert(capability);
        self
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Known capabilities present in this set.
    pub fn iter(self) -> impl Iterator<Item = Capability> {
        Capability::ALL.into_iter().filter(move |c| self.contains(*c))
    }
}

impl FromIterator<Capability> for CapabilitySet {
    fn from_iter<I: IntoIterator<Item = Capability>>(iter: I) -> Self {
        let mut set = CapabilitySet::empty();
        for capability in iter {
            set.insert(capability);
        }
        set
    }
}

impl fmt::Display for CapabilitySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("none");
        }
        let names: Vec<&str> = self.iter().map(Capability::name).collect();
        f.write_str(&names.join("|"))
    }
}
