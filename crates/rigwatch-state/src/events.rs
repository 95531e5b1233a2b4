//! Per-tour audit log.
//!
//! Operators see orchestration decisions only through this log. Every entry
//! is stored as a [`PhotoTourEvent`] and mirrored to `tracing` at the
//! matching level. Writing an event never fails outward: a storage error is
//! itself reported through `tracing`.

use rigwatch_core::{EventSeverity, PhotoTourEvent, TourId, epoch_millis};
use tracing::{debug, error, info, warn};

use crate::error::StateResult;
use crate::store::StateStore;

#[derive(Clone)]
pub struct EventLog {
    store: StateStore,
}

impl EventLog {
    pub fn new(store: StateStore) -> Self {
        Self { store }
    }

    pub fn log(&self, tour_id: TourId, severity: EventSeverity, message: impl Into<String>) {
        let message = message.into();
        match severity {
            EventSeverity::Debug => debug!(tour_id, "{message}"),
            EventSeverity::Information => info!(tour_id, "{message}"),
            EventSeverity::Warning => warn!(tour_id, "{message}"),
            EventSeverity::Error | EventSeverity::Critical => {
                error!(tour_id, %severity, "{message}")
            }
        }
        let event = PhotoTourEvent {
            tour_id,
            message,
            severity,
            timestamp: epoch_millis(),
        };
        if let Err(e) = self.store.append_event(&event) {
            error!(tour_id, error = %e, "failed to persist tour event");
        }
    }

    pub fn debug(&self, tour_id: TourId, message: impl Into<String>) {
        self.log(tour_id, EventSeverity::Debug, message);
    }

    pub fn info(&self, tour_id: TourId, message: impl Into<String>) {
        self.log(tour_id, EventSeverity::Information, message);
    }

    pub fn warn(&self, tour_id: TourId, message: impl Into<String>) {
        self.log(tour_id, EventSeverity::Warning, message);
    }

    pub fn error(&self, tour_id: TourId, message: impl Into<String>) {
        self.log(tour_id, EventSeverity::Error, message);
    }

    pub fn critical(&self, tour_id: TourId, message: impl Into<String>) {
        self.log(tour_id, EventSeverity::Critical, message);
    }

    /// Events of a tour. Debug entries are hidden unless `all` is set.
    pub fn events(&self, tour_id: TourId, all: bool) -> StateResult<Vec<PhotoTourEvent>> {
        let mut events = self.store.list_events(tour_id)?;
        if !all {
            events.retain(|e| e.severity != EventSeverity::Debug);
        }
        Ok(events)
    }
}
