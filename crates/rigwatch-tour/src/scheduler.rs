//! Scheduling loop — launches due trips, one at a time.
//!
//! A tour is due when it has no trip yet or its last trip is at least
//! `interval_minutes` old. Only one trip runs at a time across all tours;
//! a tick that finds a trip running does nothing.

use std::sync::Arc;

use rigwatch_core::{PhotoTour, PhotoTourTrip, TourId, epoch_millis};
use tokio::sync::watch;
use tracing::{debug, error, info};

use crate::error::TourResult;
use crate::orchestrator::TourOrchestrator;
use crate::task::spawn_logged;

/// Whether `tour` should run again at `now` (Unix ms).
pub fn is_due(tour: &PhotoTour, last: Option<&PhotoTourTrip>, now: u64) -> bool {
    let Some(last) = last else {
        return true;
    };
    let interval_ms = (f64::from(tour.interval_minutes.max(0.0)) * 60_000.0) as u64;
    now.saturating_sub(last.timestamp) >= interval_ms
}

impl TourOrchestrator {
    /// Launch the first due tour, if no trip is running.
    ///
    /// Returns the id of the tour whose trip was started.
    pub fn tick(self: &Arc<Self>) -> TourResult<Option<TourId>> {
        if self.trip_running.is_busy() {
            debug!("trip running, schedule tick skipped");
            return Ok(None);
        }
        let now = epoch_millis();
        for tour in self.store.list_tours()?.into_iter().filter(|t| !t.finished) {
            let last = self.store.last_trip(tour.id)?;
            if !is_due(&tour, last.as_ref(), now) {
                continue;
            }
            let Some(guard) = self.trip_running.try_acquire_owned() else {
                return Ok(None);
            };
            let tour_id = tour.id;
            info!(tour_id, device_id = %tour.device_id, "starting trip");
            let this = self.clone();
            spawn_logged(self.events.clone(), tour_id, "trip", async move {
                let _guard = guard;
                let outcome = this.run_trip(&tour).await?;
                debug!(tour_id, ?outcome, "trip ended");
                Ok(())
            });
            return Ok(Some(tour_id));
        }
        Ok(None)
    }

    /// Tick every `schedule_interval` until shutdown.
    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        info!(interval = ?self.settings.schedule_interval, "tour scheduler starting");
        loop {
            tokio::select! {
                _ = tokio::time::sleep(self.settings.schedule_interval) => {
                    if let Err(e) = self.tick() {
                        error!(error = %e, "schedule tick failed");
                    }
                }
                _ = shutdown.changed() => {
                    debug!("tour scheduler shutting down");
                    break;
                }
            }
        }
    }
}
