//! In-process stand-ins for a rig, its camera streams and the restart
//! coordinator.

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use rigwatch_core::{
    CameraKind, CapabilitySet, DeviceHealth, DeviceHealthState, MotorState, MoveCommand,
    MovementPlan, MovementPoint, MotorProfile, TourId, TourSettings,
};
use rigwatch_device::{
    CameraStreamer, DeviceApi, DeviceError, DeviceResult, FrameNotice, StreamProgress,
    StreamSession,
};
use rigwatch_health::HealthRegistry;
use rigwatch_state::StateStore;
use rigwatch_tour::{NewTour, RestartRequester, TourDeps, TourOrchestrator};
use tokio::sync::mpsc;

pub const DEVICE: &str = "rig-1";
pub const IP: &str = "10.0.0.9";

/// Simulated rig. Moves advance every open stream; kills end them.
#[derive(Default)]
pub struct FakeRig {
    pub position: Mutex<i32>,
    pub dirty: AtomicBool,
    pub preview_fails: AtomicBool,
    /// Streams never see the motor move.
    pub frozen: AtomicBool,
    /// Frames carry no image data.
    pub blind: AtomicBool,
    pub moves: Mutex<Vec<MoveCommand>>,
    pub kills: Mutex<Vec<CameraKind>>,
    pub ffc_runs: AtomicU32,
    streams: Mutex<Vec<(CameraKind, Arc<StreamProgress>)>>,
}

impl FakeRig {
    pub fn move_steps(&self) -> Vec<i32> {
        self.moves.lock().unwrap().iter().map(|m| m.steps).collect()
    }

    fn attach(&self, camera: CameraKind, progress: Arc<StreamProgress>) {
        self.streams.lock().unwrap().push((camera, progress));
    }
}

fn refused() -> DeviceError {
    DeviceError::Connect {
        address: IP.to_string(),
        reason: "refused".to_string(),
    }
}

#[async_trait]
impl DeviceApi for FakeRig {
    async fn health(&self, _ip: &str) -> DeviceResult<DeviceHealth> {
        Err(refused())
    }

    async fn switch_outlet(&self, _ip: &str, _code: i64) -> DeviceResult<()> {
        Ok(())
    }

    async fn motor_position(&self, _ip: &str) -> DeviceResult<MotorState> {
        Ok(MotorState {
            is_engaged: true,
            current_position: *self.position.lock().unwrap(),
            is_dirty: self.dirty.load(Ordering::SeqCst),
        })
    }

    async fn move_motor(&self, _ip: &str, command: MoveCommand) -> DeviceResult<()> {
        self.moves.lock().unwrap().push(command);
        let position = {
            let mut position = self.position.lock().unwrap();
            *position += command.steps;
            *position
        };
        if self.frozen.load(Ordering::SeqCst) {
            return Ok(());
        }
        for (_, progress) in self.streams.lock().unwrap().iter() {
            if progress.is_finished() {
                continue;
            }
            progress.record_step(position);
            if !self.blind.load(Ordering::SeqCst) {
                progress.record_image();
            }
        }
        Ok(())
    }

    async fn toggle_engage(&self, _ip: &str, _engage: bool) -> DeviceResult<()> {
        Ok(())
    }

    async fn reset_history(&self, _ip: &str) -> DeviceResult<()> {
        Ok(())
    }

    async fn preview_image(&self, _ip: &str, _camera: CameraKind) -> DeviceResult<()> {
        if self.preview_fails.load(Ordering::SeqCst) {
            return Err(refused());
        }
        Ok(())
    }

    async fn kill_camera(&self, _ip: &str, camera: CameraKind) -> DeviceResult<()> {
        self.kills.lock().unwrap().push(camera);
        for (kind, progress) in self.streams.lock().unwrap().iter() {
            if *kind == camera {
                progress.mark_finished();
            }
        }
        Ok(())
    }

    async fn run_ffc(&self, _ip: &str) -> DeviceResult<()> {
        self.ffc_runs.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Opens streams attached to a [`FakeRig`].
pub struct FakeStreamer {
    pub rig: Arc<FakeRig>,
    /// Fault every stream this long after it opens.
    pub fault_after: Option<Duration>,
}

#[async_trait]
impl CameraStreamer for FakeStreamer {
    async fn open(
        &self,
        _ip: &str,
        device_id: &str,
        camera: CameraKind,
        notices: mpsc::UnboundedSender<FrameNotice>,
    ) -> DeviceResult<StreamSession> {
        if camera == CameraKind::Thermal {
            let _ = notices.send(FrameNotice::Temperature {
                celsius: 21.5,
                captured_at_ms: 1_700_000_000_000,
            });
        }
        let progress = Arc::new(StreamProgress::new());
        self.rig.attach(camera, progress.clone());
        if let Some(delay) = self.fault_after {
            let progress = progress.clone();
            tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                progress.mark_faulted();
                progress.mark_finished();
            });
        }
        Ok(StreamSession {
            camera,
            folder: PathBuf::from(format!("pictures/{device_id}/{camera}")),
            progress,
        })
    }
}

#[derive(Default)]
pub struct FakeRestarts {
    pub requested: Mutex<Vec<(String, TourId)>>,
    pub immediate: Mutex<Vec<(String, TourId)>>,
}

impl FakeRestarts {
    pub fn requested(&self) -> usize {
        self.requested.lock().unwrap().len()
    }

    pub fn immediate(&self) -> usize {
        self.immediate.lock().unwrap().len()
    }
}

#[async_trait]
impl RestartRequester for FakeRestarts {
    async fn request_restart(&self, device_id: &str, tour_id: TourId, _device_name: &str) {
        self.requested
            .lock()
            .unwrap()
            .push((device_id.to_string(), tour_id));
    }

    async fn immediate_restart(&self, device_id: &str, tour_id: TourId, _device_name: &str) {
        self.immediate
            .lock()
            .unwrap()
            .push((device_id.to_string(), tour_id));
    }
}

pub struct Harness {
    pub store: StateStore,
    pub registry: Arc<HealthRegistry>,
    pub rig: Arc<FakeRig>,
    pub restarts: Arc<FakeRestarts>,
    pub orchestrator: Arc<TourOrchestrator>,
}

pub fn settings() -> TourSettings {
    TourSettings {
        schedule_interval: Duration::from_millis(10),
        position_poll: Duration::from_millis(2),
        ffc_settle: Duration::ZERO,
        position_reach_timeout: None,
        flush_timeout: Duration::from_millis(200),
        picture_root: PathBuf::from("pictures"),
        safety_scale: 1.05,
        safety_margin: 0,
    }
}

pub fn plan() -> MovementPlan {
    let point = |step_offset| MovementPoint {
        step_offset,
        focus_cm: 120.0,
        speed: 100,
        comment: String::new(),
    };
    MovementPlan {
        device_id: DEVICE.to_string(),
        name: "row".to_string(),
        points: vec![point(100), point(200), point(-50)],
    }
}

/// Capability bits of a rig with both cameras found and functional.
pub const BOTH_CAMERAS: u32 = 1 | 2 | 4 | 8;

pub fn harness(fault_after: Option<Duration>) -> Harness {
    let store = StateStore::open_in_memory().unwrap();
    store.put_movement_plan(&plan()).unwrap();
    let registry = Arc::new(HealthRegistry::new(store.clone()).unwrap());
    registry.publish(vec![DeviceHealthState {
        health: DeviceHealth {
            device_id: DEVICE.to_string(),
            device_name: "north rig".to_string(),
            capabilities: CapabilitySet::from_bits(BOTH_CAMERAS),
        },
        retry_count: 0,
        ip: IP.to_string(),
    }]);
    let rig = Arc::new(FakeRig::default());
    let restarts = Arc::new(FakeRestarts::default());
    let orchestrator = Arc::new(TourOrchestrator::new(
        TourDeps {
            store: store.clone(),
            health: registry.clone(),
            restart: restarts.clone(),
            api: rig.clone(),
            streamer: Arc::new(FakeStreamer {
                rig: rig.clone(),
                fault_after,
            }),
        },
        settings(),
        MotorProfile::default(),
    ));
    Harness {
        store,
        registry,
        rig,
        restarts,
        orchestrator,
    }
}

pub fn new_tour(uses_ir: bool) -> NewTour {
    NewTour {
        device_id: DEVICE.to_string(),
        name: "north field".to_string(),
        comment: String::new(),
        interval_minutes: 30.0,
        uses_ir,
    }
}

/// Let fire-and-forget restart requests run.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(20)).await;
}
