//! Trip state machine.
//!
//! ```text
//! precheck ──> prepare ──> sweep ──> finish ──> persist ──> escalate
//!    │            │          │
//!    │            └──────────┴──> abort: Error event, restart request,
//!    │                                   cameras killed, empty trip
//!    └──> dirty motor: tour finished
//!    └──> device/camera not ready: restart request, empty trip
//! ```
//!
//! Every trip that gets past the dirty-motor check is recorded, even when
//! it produced nothing.

use std::sync::PoisonError;
use std::time::Duration;

use rigwatch_core::{
    CameraKind, MoveCommand, PhotoTour, PhotoTourTrip, TemperatureSample, TourId, epoch_millis,
};
use rigwatch_device::{FrameNotice, StreamSession};
use rigwatch_state::keys::TRIP_COUNTER;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::capability::PositionSource;
use crate::error::TourResult;
use crate::orchestrator::TourOrchestrator;

/// How a trip ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TripOutcome {
    /// The sweep ran to the end and the trip was recorded.
    Completed(PhotoTourTrip),
    /// The device was not ready to start; an empty trip was recorded.
    PrecheckFailed(PhotoTourTrip),
    /// The sweep was cut short; an empty trip was recorded.
    Aborted(PhotoTourTrip),
    /// The motor position is untrusted and the tour was finished.
    TourStopped,
}

/// Result of waiting for the streams to report a target position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arrival {
    Reached,
    Faulted,
    TimedOut,
}

/// Whether `step` has reached or passed `target` in the direction of travel.
pub fn has_reached(step: Option<i32>, target: i32, forward: bool) -> bool {
    match step {
        Some(step) if forward => step >= target,
        Some(step) => step <= target,
        None => false,
    }
}

/// Poll `sources` until all of them report `target`, any of them faults,
/// or `timeout` elapses. Without a timeout only a fault ends the wait early.
pub async fn wait_for_arrival(
    sources: &[&dyn PositionSource],
    target: i32,
    forward: bool,
    poll: Duration,
    timeout: Option<Duration>,
) -> Arrival {
    let deadline = timeout.map(|t| Instant::now() + t);
    loop {
        if sources.iter().any(|s| s.is_faulted()) {
            return Arrival::Faulted;
        }
        if sources
            .iter()
            .all(|s| has_reached(s.step_index(), target, forward))
        {
            return Arrival::Reached;
        }
        if deadline.is_some_and(|d| Instant::now() >= d) {
            return Arrival::TimedOut;
        }
        tokio::time::sleep(poll).await;
    }
}

/// Cameras a tour records with.
pub fn expected_cameras(tour: &PhotoTour) -> Vec<CameraKind> {
    if tour.uses_ir {
        vec![CameraKind::Visible, CameraKind::Thermal]
    } else {
        vec![CameraKind::Visible]
    }
}

struct Rig<'a> {
    tour: &'a PhotoTour,
    name: String,
    ip: String,
    cameras: Vec<CameraKind>,
    /// `(max, min)` positions allowed before the rig cuts power.
    bounds: (i32, i32),
}

impl TourOrchestrator {
    /// Run one trip of `tour` from precheck to escalation.
    pub async fn run_trip(&self, tour: &PhotoTour) -> TourResult<TripOutcome> {
        let tour_id = tour.id;
        let Some(plan) = self.store.get_movement_plan(&tour.device_id)? else {
            self.events.error(
                tour_id,
                format!("no movement plan for device {}, trip skipped", tour.device_id),
            );
            self.remember_silent(tour_id, expected_cameras(tour));
            return Ok(TripOutcome::PrecheckFailed(self.record_trip(tour_id, &[])?));
        };

        // Precheck.
        let Some(device) = self.health.device(&tour.device_id) else {
            return self.precheck_failed(tour, &tour.device_id, "device is not available".to_string());
        };
        let mut rig = Rig {
            tour,
            name: device.health.device_name.clone(),
            ip: device.ip.clone(),
            cameras: expected_cameras(tour),
            bounds: plan.safety_bounds(self.settings.safety_scale, self.settings.safety_margin),
        };

        let motor = match self.api.motor_position(&rig.ip).await {
            Ok(motor) => motor,
            Err(e) => {
                return self.precheck_failed(tour, &rig.name, format!("motor state unavailable: {e}"));
            }
        };
        if motor.is_dirty {
            let mut stopped = tour.clone();
            stopped.finished = true;
            self.store.put_tour(&stopped)?;
            self.events.error(
                tour_id,
                format!(
                    "{}: motor position is dirty, tour stopped until the motor is zeroed",
                    rig.name
                ),
            );
            return Ok(TripOutcome::TourStopped);
        }
        for camera in &rig.cameras {
            if let Err(e) = self.api.preview_image(&rig.ip, *camera).await {
                return self.precheck_failed(tour, &rig.name, format!("{camera} preview failed: {e}"));
            }
        }

        // Prepare.
        if let Err(e) = self.api.reset_history(&rig.ip).await {
            return self.abort(&rig, format!("history reset failed: {e}"), &[]).await;
        }
        let home = motor.current_position;
        if home != 0 {
            rig.bounds = (rig.bounds.0.max(home), rig.bounds.1.min(home));
            if let Err(e) = self.api.move_motor(&rig.ip, self.command(-home, rig.bounds)).await {
                return self.abort(&rig, format!("move to home failed: {e}"), &[]).await;
            }
        }

        let (notice_tx, notice_rx) = mpsc::unbounded_channel();
        let mut sessions = Vec::with_capacity(rig.cameras.len());
        for camera in &rig.cameras {
            match self
                .streamer
                .open(&rig.ip, &tour.device_id, *camera, notice_tx.clone())
                .await
            {
                Ok(session) => sessions.push(session),
                Err(e) => {
                    return self
                        .abort(&rig, format!("{camera} stream failed to open: {e}"), &sessions)
                        .await;
                }
            }
        }
        drop(notice_tx);
        self.spawn_notice_sink(tour, notice_rx);

        // Sweep.
        let mut position = 0;
        for (index, (point, target)) in plan.points.iter().zip(plan.targets()).enumerate() {
            debug!(tour_id, index, target, "moving to point");
            if let Err(e) = self
                .api
                .move_motor(&rig.ip, self.command(point.step_offset, rig.bounds))
                .await
            {
                return self
                    .abort(&rig, format!("move to point {index} failed: {e}"), &sessions)
                    .await;
            }
            let sources: Vec<&dyn PositionSource> =
                sessions.iter().map(|s| s.progress.as_ref() as &dyn PositionSource).collect();
            match wait_for_arrival(
                &sources,
                target,
                target >= position,
                self.settings.position_poll,
                self.settings.position_reach_timeout,
            )
            .await
            {
                Arrival::Reached => {}
                Arrival::Faulted => {
                    return self
                        .abort(&rig, format!("camera stream failed before point {index}"), &sessions)
                        .await;
                }
                Arrival::TimedOut => {
                    return self
                        .abort(&rig, format!("point {index} (step {target}) never reached"), &sessions)
                        .await;
                }
            }
            position = target;

            if tour.uses_ir
                && let Err(e) = self.api.run_ffc(&rig.ip).await
            {
                self.events
                    .warn(tour_id, format!("{}: flat-field calibration failed: {e}", rig.name));
            }
            tokio::time::sleep(self.settings.ffc_settle).await;
        }

        // Finish.
        self.kill_cameras(&rig, &sessions).await;
        if position != 0
            && let Err(e) = self.api.move_motor(&rig.ip, self.command(-position, rig.bounds)).await
        {
            self.events
                .warn(tour_id, format!("{}: return to zero failed: {e}", rig.name));
        }
        for session in &sessions {
            if !session.progress.wait_finished(self.settings.flush_timeout).await {
                self.events.warn(
                    tour_id,
                    format!("{}: {} stream did not finish writing in time", rig.name, session.camera),
                );
            }
        }

        // Persist.
        let trip = self.record_trip(tour_id, &sessions)?;
        let counts = image_counts(&rig.cameras, &sessions);
        let summary: Vec<String> = counts
            .iter()
            .map(|(camera, images)| format!("{camera}: {images} images"))
            .collect();
        self.events.info(
            tour_id,
            format!("{}: trip finished, {}", rig.name, summary.join(", ")),
        );

        self.escalate(&rig, &counts);
        Ok(TripOutcome::Completed(trip))
    }

    fn command(&self, steps: i32, bounds: (i32, i32)) -> MoveCommand {
        MoveCommand {
            steps,
            min_time: self.motor.min_pulse_us,
            max_time: self.motor.max_pulse_us,
            ramp_length: self.motor.ramp_length,
            max_allowed_position: bounds.0,
            min_allowed_position: bounds.1,
        }
    }

    fn precheck_failed(
        &self,
        tour: &PhotoTour,
        name: &str,
        reason: String,
    ) -> TourResult<TripOutcome> {
        self.events.warn(tour.id, format!("{name}: {reason}"));
        self.spawn_restart(&tour.device_id, tour.id, name, false);
        self.remember_silent(tour.id, expected_cameras(tour));
        Ok(TripOutcome::PrecheckFailed(self.record_trip(tour.id, &[])?))
    }

    async fn abort(
        &self,
        rig: &Rig<'_>,
        reason: String,
        sessions: &[StreamSession],
    ) -> TourResult<TripOutcome> {
        let tour_id = rig.tour.id;
        self.events
            .error(tour_id, format!("{}: trip aborted, {reason}", rig.name));
        self.spawn_restart(&rig.tour.device_id, tour_id, &rig.name, false);
        self.kill_cameras(rig, sessions).await;
        let trip = self.record_trip(tour_id, &[])?;
        if sessions.is_empty() {
            self.remember_silent(tour_id, rig.cameras.clone());
        } else {
            self.escalate(rig, &image_counts(&rig.cameras, sessions));
        }
        Ok(TripOutcome::Aborted(trip))
    }

    async fn kill_cameras(&self, rig: &Rig<'_>, sessions: &[StreamSession]) {
        for session in sessions {
            if let Err(e) = self.api.kill_camera(&rig.ip, session.camera).await {
                warn!(ip = %rig.ip, camera = %session.camera, error = %e, "failed to stop camera");
            }
        }
    }

    fn record_trip(&self, tour_id: TourId, sessions: &[StreamSession]) -> TourResult<PhotoTourTrip> {
        let folder = |camera: CameraKind| {
            sessions
                .iter()
                .find(|s| s.camera == camera)
                .map(|s| s.folder.display().to_string())
                .unwrap_or_default()
        };
        let trip = PhotoTourTrip {
            id: self.store.next_id(TRIP_COUNTER)?,
            tour_id,
            ir_folder: folder(CameraKind::Thermal),
            vis_folder: folder(CameraKind::Visible),
            timestamp: epoch_millis(),
        };
        self.store.put_trip(&trip)?;
        Ok(trip)
    }

    /// Count a trip that never opened its streams as silent on `cameras`.
    fn remember_silent(&self, tour_id: TourId, cameras: Vec<CameraKind>) {
        self.silent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(tour_id, cameras);
    }

    /// Restart the device when a camera stayed silent in this trip and the
    /// previous one.
    fn escalate(&self, rig: &Rig<'_>, counts: &[(CameraKind, u64)]) {
        let tour_id = rig.tour.id;
        let silent: Vec<CameraKind> = counts
            .iter()
            .filter(|(_, images)| *images == 0)
            .map(|(camera, _)| *camera)
            .collect();

        let repeated: Vec<CameraKind> = {
            let mut memory = self.silent.lock().unwrap_or_else(PoisonError::into_inner);
            let previous = memory.remove(&tour_id).unwrap_or_default();
            let repeated: Vec<CameraKind> = silent
                .iter()
                .copied()
                .filter(|camera| previous.contains(camera))
                .collect();
            if repeated.is_empty() && !silent.is_empty() {
                memory.insert(tour_id, silent);
            }
            repeated
        };
        if repeated.is_empty() {
            return;
        }

        let cameras: Vec<&str> = repeated.iter().map(|c| c.as_str()).collect();
        self.events.error(
            tour_id,
            format!(
                "{}: no {} images in two consecutive trips, restarting device",
                rig.name,
                cameras.join("/")
            ),
        );
        self.spawn_restart(&rig.tour.device_id, tour_id, &rig.name, true);
    }

    fn spawn_restart(&self, device_id: &str, tour_id: TourId, name: &str, immediate: bool) {
        let restart = self.restart.clone();
        let device_id = device_id.to_string();
        let name = name.to_string();
        tokio::spawn(async move {
            if immediate {
                restart.immediate_restart(&device_id, tour_id, &name).await;
            } else {
                restart.request_restart(&device_id, tour_id, &name).await;
            }
        });
    }

    fn spawn_notice_sink(&self, tour: &PhotoTour, mut notices: mpsc::UnboundedReceiver<FrameNotice>) {
        let events = self.events.clone();
        let store = self.store.clone();
        let tour_id = tour.id;
        let device_id = tour.device_id.clone();
        tokio::spawn(async move {
            while let Some(notice) = notices.recv().await {
                match notice {
                    FrameNotice::FirstImage { camera } => {
                        events.debug(tour_id, format!("first {camera} image received"));
                    }
                    FrameNotice::Temperature {
                        celsius,
                        captured_at_ms,
                    } => {
                        let sample = TemperatureSample {
                            tour_id,
                            device_id: device_id.clone(),
                            celsius,
                            timestamp: u64::try_from(captured_at_ms).unwrap_or_default(),
                        };
                        if let Err(e) = store.append_temperature(&sample) {
                            warn!(tour_id, error = %e, "failed to store temperature sample");
                        }
                    }
                }
            }
            info!(tour_id, "trip streams closed");
        });
    }
}

fn image_counts(cameras: &[CameraKind], sessions: &[StreamSession]) -> Vec<(CameraKind, u64)> {
    cameras
        .iter()
        .map(|camera| {
            let images = sessions
                .iter()
                .find(|s| s.camera == *camera)
                .map_or(0, |s| s.progress.image_count());
            (*camera, images)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};

    struct FakeSource {
        step: AtomicI32,
        faulted: AtomicBool,
    }

    impl FakeSource {
        fn at(step: i32) -> Self {
            Self {
                step: AtomicI32::new(step),
                faulted: AtomicBool::new(false),
            }
        }
    }

    impl PositionSource for FakeSource {
        fn step_index(&self) -> Option<i32> {
            Some(self.step.load(Ordering::SeqCst))
        }

        fn is_faulted(&self) -> bool {
            self.faulted.load(Ordering::SeqCst)
        }
    }

    #[test]
    fn arrival_follows_direction_of_travel() {
        assert!(has_reached(Some(300), 300, true));
        assert!(has_reached(Some(310), 300, true));
        assert!(!has_reached(Some(290), 300, true));
        assert!(has_reached(Some(240), 250, false));
        assert!(!has_reached(Some(260), 250, false));
        assert!(!has_reached(None, 0, true));
    }

    #[tokio::test]
    async fn waits_for_every_stream() {
        let vis = FakeSource::at(100);
        let ir = FakeSource::at(40);
        let sources: [&dyn PositionSource; 2] = [&vis, &ir];

        let waiting = wait_for_arrival(&sources, 100, true, Duration::from_millis(5), None);
        let bump = async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            ir.step.store(100, Ordering::SeqCst);
        };
        let (arrival, ()) = tokio::join!(waiting, bump);
        assert_eq!(arrival, Arrival::Reached);
    }

    #[tokio::test]
    async fn fault_ends_wait_without_deadline() {
        let vis = FakeSource::at(0);
        let sources: [&dyn PositionSource; 1] = [&vis];
        let waiting = wait_for_arrival(&sources, 100, true, Duration::from_millis(5), None);
        let fault = async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            vis.faulted.store(true, Ordering::SeqCst);
        };
        let (arrival, ()) = tokio::join!(waiting, fault);
        assert_eq!(arrival, Arrival::Faulted);
    }

    #[tokio::test]
    async fn optional_deadline_times_out() {
        let vis = FakeSource::at(0);
        let sources: [&dyn PositionSource; 1] = [&vis];
        let arrival = wait_for_arrival(
            &sources,
            100,
            true,
            Duration::from_millis(5),
            Some(Duration::from_millis(20)),
        )
        .await;
        assert_eq!(arrival, Arrival::TimedOut);
    }
}
