//! Authoritative motor position on the rig.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, TryLockError};

use rigwatch_core::{MotorPositionSample, MotorState, MoveCommand, StreamFrame};
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::driver::StepperDriver;
use crate::error::{MotorError, MotorResult};
use crate::ramp::Ramp;
use crate::store::{PersistedPosition, PositionStore};

/// How a move ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MoveOutcome {
    pub steps_taken: u32,
    /// The safety bounds were exceeded and the enable line dropped.
    pub cut_off: bool,
    pub position: i32,
}

#[derive(Debug)]
struct TrackerState {
    engaged: bool,
    position: i32,
    dirty: bool,
    history: Vec<MotorPositionSample>,
}

/// Tracks the stepper position, one move at a time.
///
/// The driver lock is held for the duration of a move; the state lock only
/// for single updates, so position queries and frame tagging stay
/// responsive while the motor runs.
pub struct MotorTracker {
    driver: Mutex<Box<dyn StepperDriver>>,
    state: Mutex<TrackerState>,
    store: Arc<dyn PositionStore>,
    clock: Arc<dyn Clock>,
}

impl MotorTracker {
    /// Restore the persisted position and engage the driver.
    pub fn open(
        mut driver: Box<dyn StepperDriver>,
        store: Arc<dyn PositionStore>,
        clock: Arc<dyn Clock>,
    ) -> MotorResult<Self> {
        let persisted = store.load()?;
        if persisted.dirty {
            warn!(
                position = persisted.position,
                "motor position is dirty after restart, zeroing required"
            );
        }
        driver.set_enabled(true);
        Ok(Self {
            driver: Mutex::new(driver),
            state: Mutex::new(TrackerState {
                engaged: true,
                position: persisted.position,
                dirty: persisted.dirty,
                history: Vec::new(),
            }),
            store,
            clock,
        })
    }

    fn state(&self) -> MutexGuard<'_, TrackerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn current(&self) -> MotorState {
        let state = self.state();
        MotorState {
            is_engaged: state.engaged,
            current_position: state.position,
            is_dirty: state.dirty,
        }
    }

    fn persist(&self, position: i32, dirty: bool) -> MotorResult<()> {
        self.store.save(PersistedPosition { position, dirty })
    }

    /// Execute a relative move.
    ///
    /// Rejected while another move runs, while the position is dirty, and
    /// while the motor is disengaged. Before each step the current position
    /// is checked against the command's bounds; outside them the enable
    /// line drops and the move ends.
    pub fn move_steps(&self, command: MoveCommand) -> MotorResult<MoveOutcome> {
        let mut driver = match self.driver.try_lock() {
            Ok(driver) => driver,
            Err(TryLockError::WouldBlock) => return Err(MotorError::MoveInFlight),
            Err(TryLockError::Poisoned(e)) => e.into_inner(),
        };

        let start = {
            let mut state = self.state();
            if state.dirty {
                return Err(MotorError::DirtyPosition);
            }
            if !state.engaged {
                return Err(MotorError::Disengaged);
            }
            state.dirty = true;
            state.position
        };
        // Checkpoint before the first pulse.
        self.persist(start, true)?;

        let forward = command.steps >= 0;
        let unit = if forward { 1 } else { -1 };
        let total = command.steps.unsigned_abs();
        let ramp = Ramp::new(total, command.min_time, command.max_time, command.ramp_length);
        driver.set_direction(forward);
        debug!(steps = command.steps, start, "move started");

        let mut steps_taken = 0;
        let mut cut_off = false;
        for i in 0..total {
            {
                let mut state = self.state();
                if state.engaged
                    && (state.position > command.max_allowed_position
                        || state.position < command.min_allowed_position)
                {
                    state.engaged = false;
                    cut_off = true;
                }
            }
            if cut_off {
                driver.set_enabled(false);
                break;
            }

            driver.pulse(ramp.half_period(i));

            let now = self.clock.now_ms();
            let mut state = self.state();
            state.position += unit;
            let sample = MotorPositionSample {
                step_count: state.position,
                timestamp_ms: now,
            };
            state.history.push(sample);
            steps_taken += 1;
        }

        let position = {
            let mut state = self.state();
            state.dirty = false;
            state.position
        };
        self.persist(position, false)?;

        if cut_off {
            warn!(
                position,
                max = command.max_allowed_position,
                min = command.min_allowed_position,
                "position out of bounds, motor disengaged"
            );
        } else {
            debug!(position, steps_taken, "move finished");
        }
        Ok(MoveOutcome {
            steps_taken,
            cut_off,
            position,
        })
    }

    /// Declare the current physical position as zero. Clears a dirty flag.
    ///
    /// Rejected while a move runs.
    pub fn zero_position(&self) -> MotorResult<()> {
        let _driver = match self.driver.try_lock() {
            Ok(driver) => driver,
            Err(TryLockError::WouldBlock) => return Err(MotorError::MoveInFlight),
            Err(TryLockError::Poisoned(e)) => e.into_inner(),
        };
        {
            let mut state = self.state();
            state.position = 0;
            state.dirty = false;
        }
        self.persist(0, false)?;
        info!("motor position zeroed");
        Ok(())
    }

    pub fn toggle_engage(&self, engage: bool) {
        self.state().engaged = engage;
        self.driver
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .set_enabled(engage);
        info!(engage, "motor engage toggled");
    }

    /// Drop the position history, keeping one sample at the current position.
    pub fn reset_history(&self) {
        let now = self.clock.now_ms();
        let mut state = self.state();
        let sample = MotorPositionSample {
            step_count: state.position,
            timestamp_ms: now,
        };
        state.history.clear();
        state.history.push(sample);
    }

    /// Motor step at time `t_ms`: the latest sample at or before `t_ms`,
    /// the first sample if `t_ms` precedes the history, `None` if the
    /// history is empty.
    pub fn step_for_time(&self, t_ms: i64) -> Option<i32> {
        let state = self.state();
        let first = state.history.first()?;
        let after = state.history.partition_point(|s| s.timestamp_ms <= t_ms);
        match after {
            0 => Some(first.step_count),
            n => Some(state.history[n - 1].step_count),
        }
    }

    /// Stamp a captured frame with the step it was taken at.
    pub fn tag_frame(&self, frame: &mut StreamFrame) {
        frame.step_index = self
            .step_for_time(frame.capture_unix_ms())
            .unwrap_or(i32::MIN);
    }
}
