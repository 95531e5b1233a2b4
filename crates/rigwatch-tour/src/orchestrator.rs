//! Tour orchestrator — owns everything a trip needs.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use rigwatch_core::{BusyFlag, CameraKind, MotorProfile, TourId, TourSettings};
use rigwatch_device::{CameraStreamer, DeviceApi};
use rigwatch_state::{EventLog, StateStore};

use crate::capability::{HealthSource, RestartRequester};

/// Collaborators of the orchestrator.
pub struct TourDeps {
    pub store: StateStore,
    pub health: Arc<dyn HealthSource>,
    pub restart: Arc<dyn RestartRequester>,
    pub api: Arc<dyn DeviceApi>,
    pub streamer: Arc<dyn CameraStreamer>,
}

/// Schedules trips and runs them one at a time.
///
/// Operator actions live in `operator`, the trip state machine in `trip`
/// and the periodic loop in `scheduler`.
pub struct TourOrchestrator {
    pub(crate) store: StateStore,
    pub(crate) events: EventLog,
    pub(crate) health: Arc<dyn HealthSource>,
    pub(crate) restart: Arc<dyn RestartRequester>,
    pub(crate) api: Arc<dyn DeviceApi>,
    pub(crate) streamer: Arc<dyn CameraStreamer>,
    pub(crate) settings: TourSettings,
    pub(crate) motor: MotorProfile,
    /// Held while any trip runs; the rig hardware is shared by all tours.
    pub(crate) trip_running: Arc<BusyFlag>,
    /// Cameras that produced no image in the previous trip, per tour.
    pub(crate) silent: Mutex<HashMap<TourId, Vec<CameraKind>>>,
}

impl TourOrchestrator {
    pub fn new(deps: TourDeps, settings: TourSettings, motor: MotorProfile) -> Self {
        Self {
            events: EventLog::new(deps.store.clone()),
            store: deps.store,
            health: deps.health,
            restart: deps.restart,
            api: deps.api,
            streamer: deps.streamer,
            settings,
            motor,
            trip_running: Arc::new(BusyFlag::new()),
            silent: Mutex::new(HashMap::new()),
        }
    }

    pub fn is_trip_running(&self) -> bool {
        self.trip_running.is_busy()
    }
}
