pub mod capability;
pub mod config;
pub mod duration;
pub mod frame;
pub mod guard;
pub mod types;

pub use capability::{Capability, CapabilitySet};
pub use config::{
    GatewayConfig, HealthSettings, MotorProfile, NetworkSettings, RestartSettings, TourSettings,
};
pub use duration::parse_duration;
pub use frame::{CameraKind, StreamFrame};
pub use guard::{BusyFlag, BusyGuard, OwnedBusyGuard};
pub use types::*;
