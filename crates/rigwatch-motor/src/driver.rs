//! Stepper driver lines.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

/// The three control lines of a stepper driver.
pub trait StepperDriver: Send {
    /// Drive the enable line. A disabled driver holds no torque and ignores pulses.
    fn set_enabled(&mut self, enabled: bool);

    fn set_direction(&mut self, forward: bool);

    /// Emit one step: high for `half_period`, then low for `half_period`.
    fn pulse(&mut self, half_period: Duration);
}

/// Observable line state of a [`SimulatedDriver`].
#[derive(Debug, Default)]
pub struct DriverLines {
    pub pulses: AtomicU64,
    pub enabled: AtomicBool,
    pub forward: AtomicBool,
}

/// Driver for rigs without motor hardware (development boards, tests).
///
/// Counts pulses; with `realtime` set it also spends the pulse time.
#[derive(Debug, Clone)]
pub struct SimulatedDriver {
    lines: Arc<DriverLines>,
    realtime: bool,
}

impl SimulatedDriver {
    pub fn new(realtime: bool) -> Self {
        Self {
            lines: Arc::new(DriverLines::default()),
            realtime,
        }
    }

    pub fn lines(&self) -> Arc<DriverLines> {
        self.lines.clone()
    }
}

impl StepperDriver for SimulatedDriver {
    fn set_enabled(&mut self, enabled: bool) {
        self.lines.enabled.store(enabled, Ordering::SeqCst);
    }

    fn set_direction(&mut self, forward: bool) {
        self.lines.forward.store(forward, Ordering::SeqCst);
    }

    fn pulse(&mut self, half_period: Duration) {
        if self.realtime {
            std::thread::sleep(half_period * 2);
        }
        self.lines.pulses.fetch_add(1, Ordering::SeqCst);
    }
}
