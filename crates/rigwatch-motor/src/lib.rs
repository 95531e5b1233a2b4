//! rigwatch-motor — stepper motor position tracking on the rig.
//!
//! ```text
//! MotorTracker
//!   ├── Ramp            (pulse period per step index)
//!   ├── StepperDriver   (direction / enable / step lines)
//!   ├── PositionStore   (durable {position, dirty})
//!   ├── Clock           (timestamps for position samples)
//!   └── history         (time-ordered samples, time → step lookup)
//! ```
//!
//! # Crash safety
//!
//! The dirty flag is written before the first pulse of a move and cleared
//! only after the move ended cleanly. A tracker that starts with a dirty
//! flag refuses every move until the position is re-zeroed.

pub mod clock;
pub mod driver;
pub mod error;
pub mod ramp;
pub mod store;
pub mod tracker;

pub use clock::{Clock, ManualClock, SystemClock};
pub use driver::{SimulatedDriver, StepperDriver};
pub use error::{MotorError, MotorResult};
pub use ramp::Ramp;
pub use store::{FilePositionStore, MemoryPositionStore, PersistedPosition, PositionStore};
pub use tracker::{MotorTracker, MoveOutcome};
