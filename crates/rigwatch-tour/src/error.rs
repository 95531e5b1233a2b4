//! Tour orchestrator error types.

use rigwatch_core::CameraKind;
use thiserror::Error;

/// Errors returned to the operator by tour actions.
#[derive(Debug, Error)]
pub enum TourError {
    #[error("device not found: {0}")]
    DeviceNotFound(String),

    #[error("{camera} camera of device {device_id} is not functional")]
    CameraNotFunctional {
        device_id: String,
        camera: CameraKind,
    },

    #[error("no movement plan for device: {0}")]
    MovementPlanMissing(String),

    #[error("device {device_id} is already used by tour {tour_id}")]
    DeviceBusy { device_id: String, tour_id: u64 },

    #[error("tour not found: {0}")]
    TourNotFound(u64),

    #[error("state store error: {0}")]
    State(#[from] rigwatch_state::StateError),
}

pub type TourResult<T> = Result<T, TourError>;
