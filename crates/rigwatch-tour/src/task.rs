//! Background task spawning.

use std::future::Future;

use rigwatch_core::TourId;
use rigwatch_state::EventLog;
use tokio::task::JoinHandle;

use crate::error::TourResult;

/// Run `work` in the background. An error or panic ends up in the tour's
/// event log instead of taking the gateway down.
pub fn spawn_logged<F>(events: EventLog, tour_id: TourId, what: &'static str, work: F) -> JoinHandle<()>
where
    F: Future<Output = TourResult<()>> + Send + 'static,
{
    tokio::spawn(async move {
        match tokio::spawn(work).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => events.error(tour_id, format!("{what} failed: {e}")),
            Err(e) if e.is_panic() => events.critical(tour_id, format!("{what} panicked")),
            Err(e) => events.warn(tour_id, format!("{what} cancelled: {e}")),
        }
    })
}
