//! Operator actions. Unlike background work, these report failures to the
//! caller.

use rigwatch_core::{Capability, CameraKind, PhotoTour, PhotoTourEvent, TourId, epoch_millis};
use rigwatch_state::keys::TOUR_COUNTER;
use tracing::info;

use crate::error::{TourError, TourResult};
use crate::orchestrator::TourOrchestrator;

/// Operator request to start a tour.
#[derive(Debug, Clone)]
pub struct NewTour {
    pub device_id: String,
    pub name: String,
    pub comment: String,
    pub interval_minutes: f32,
    pub uses_ir: bool,
}

impl TourOrchestrator {
    /// Validate and store a new tour. It runs on the next schedule tick.
    pub fn start_tour(&self, request: NewTour) -> TourResult<PhotoTour> {
        let device = self
            .health
            .device(&request.device_id)
            .ok_or_else(|| TourError::DeviceNotFound(request.device_id.clone()))?;
        if !device.health.has(Capability::VisibleCameraFunctional) {
            return Err(TourError::CameraNotFunctional {
                device_id: request.device_id,
                camera: CameraKind::Visible,
            });
        }
        if request.uses_ir && !device.health.has(Capability::ThermalCameraFunctional) {
            return Err(TourError::CameraNotFunctional {
                device_id: request.device_id,
                camera: CameraKind::Thermal,
            });
        }
        if self.store.get_movement_plan(&request.device_id)?.is_none() {
            return Err(TourError::MovementPlanMissing(request.device_id));
        }
        if let Some(running) = self
            .store
            .list_tours()?
            .into_iter()
            .find(|t| !t.finished && t.device_id == request.device_id)
        {
            return Err(TourError::DeviceBusy {
                device_id: request.device_id,
                tour_id: running.id,
            });
        }

        let tour = PhotoTour {
            id: self.store.next_id(TOUR_COUNTER)?,
            device_id: request.device_id,
            name: request.name,
            comment: request.comment,
            interval_minutes: request.interval_minutes,
            finished: false,
            uses_ir: request.uses_ir,
            created_at: epoch_millis(),
        };
        self.store.put_tour(&tour)?;
        self.events.info(
            tour.id,
            format!(
                "tour '{}' started on {} every {} minutes",
                tour.name, device.health.device_name, tour.interval_minutes
            ),
        );
        Ok(tour)
    }

    /// Pause (`paused = true`) or resume a tour.
    pub fn pause_tour(&self, tour_id: TourId, paused: bool) -> TourResult<PhotoTour> {
        let mut tour = self.tour(tour_id)?;
        tour.finished = paused;
        self.store.put_tour(&tour)?;
        let action = if paused { "paused" } else { "resumed" };
        self.events.info(tour_id, format!("tour {action}"));
        Ok(tour)
    }

    pub fn update_tour(&self, tour_id: TourId, interval_minutes: f32) -> TourResult<PhotoTour> {
        let mut tour = self.tour(tour_id)?;
        tour.interval_minutes = interval_minutes;
        self.store.put_tour(&tour)?;
        self.events
            .info(tour_id, format!("interval changed to {interval_minutes} minutes"));
        Ok(tour)
    }

    /// Events of a tour; debug entries only when `all` is set.
    pub fn events(&self, tour_id: TourId, all: bool) -> TourResult<Vec<PhotoTourEvent>> {
        self.tour(tour_id)?;
        Ok(self.events.events(tour_id, all)?)
    }

    pub fn list_tours(&self) -> TourResult<Vec<PhotoTour>> {
        Ok(self.store.list_tours()?)
    }

    /// Stop every tour left running by a previous gateway process.
    ///
    /// Trips are not resumable, and the rig may have been left mid-sweep.
    pub fn recover_after_restart(&self) -> TourResult<usize> {
        let mut stopped = 0;
        for mut tour in self.store.list_tours()?.into_iter().filter(|t| !t.finished) {
            tour.finished = true;
            self.store.put_tour(&tour)?;
            self.events
                .critical(tour.id, "tour stopped after gateway restart");
            stopped += 1;
        }
        if stopped > 0 {
            info!(stopped, "unfinished tours stopped after restart");
        }
        Ok(stopped)
    }

    fn tour(&self, tour_id: TourId) -> TourResult<PhotoTour> {
        self.store
            .get_tour(tour_id)?
            .ok_or(TourError::TourNotFound(tour_id))
    }
}
