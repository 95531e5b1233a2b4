//! rigwatch-tour — recurring photo tours.
//!
//! A tour sweeps one rig through its movement plan every
//! `interval_minutes`, recording both camera streams. The orchestrator:
//!
//! - Launches due trips from a periodic loop, one trip at a time
//! - Runs each trip through precheck, prepare, sweep, finish and persist
//! - Escalates to an immediate restart after two silent trips in a row
//! - Serves operator actions (start, pause, update, events)
//!
//! # Architecture
//!
//! ```text
//! TourOrchestrator
//!   ├── StateStore (tours, trips, plans, temperatures)
//!   ├── EventLog (per-tour audit trail)
//!   ├── HealthSource (device lookup)        ← HealthRegistry
//!   ├── RestartRequester (power cycling)    ← RestartCoordinator
//!   ├── DeviceApi (rig REST calls)
//!   └── CameraStreamer (frame streams)
//!         └── PositionSource (stream step index) ← StreamProgress
//! ```

pub mod capability;
pub mod error;
pub mod operator;
pub mod orchestrator;
pub mod scheduler;
pub mod task;
pub mod trip;

pub use capability::{HealthSource, PositionSource, RestartRequester};
pub use error::{TourError, TourResult};
pub use operator::NewTour;
pub use orchestrator::{TourDeps, TourOrchestrator};
pub use task::spawn_logged;
pub use trip::TripOutcome;
