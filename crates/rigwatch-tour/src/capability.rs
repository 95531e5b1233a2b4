//! Narrow views of the rest of the gateway the orchestrator depends on.

use async_trait::async_trait;
use rigwatch_core::{DeviceHealthState, TourId};
use rigwatch_device::StreamProgress;
use rigwatch_health::HealthRegistry;
use rigwatch_restart::RestartCoordinator;
use tracing::debug;

/// Current health of a device.
pub trait HealthSource: Send + Sync {
    fn device(&self, device_id: &str) -> Option<DeviceHealthState>;
}

impl HealthSource for HealthRegistry {
    fn device(&self, device_id: &str) -> Option<DeviceHealthState> {
        self.find(device_id)
    }
}

/// Asks for a device to be power-cycled.
#[async_trait]
pub trait RestartRequester: Send + Sync {
    /// Count a failure; the requester decides whether it restarts.
    async fn request_restart(&self, device_id: &str, tour_id: TourId, device_name: &str);

    /// Restart regardless of failure count and cooldown.
    async fn immediate_restart(&self, device_id: &str, tour_id: TourId, device_name: &str);
}

#[async_trait]
impl RestartRequester for RestartCoordinator {
    async fn request_restart(&self, device_id: &str, tour_id: TourId, device_name: &str) {
        let decision = RestartCoordinator::request_restart(self, device_id, tour_id, device_name).await;
        debug!(%device_id, tour_id, ?decision, "restart requested");
    }

    async fn immediate_restart(&self, device_id: &str, tour_id: TourId, device_name: &str) {
        let decision =
            RestartCoordinator::immediate_restart(self, device_id, tour_id, device_name).await;
        debug!(%device_id, tour_id, ?decision, "immediate restart requested");
    }
}

/// Motor position as observed through a camera stream.
pub trait PositionSource: Send + Sync {
    /// Step the newest frame was tagged with.
    fn step_index(&self) -> Option<i32>;

    fn is_faulted(&self) -> bool;
}

impl PositionSource for StreamProgress {
    fn step_index(&self) -> Option<i32> {
        StreamProgress::step_index(self)
    }

    fn is_faulted(&self) -> bool {
        StreamProgress::is_faulted(self)
    }
}
