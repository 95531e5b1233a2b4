//! Acceleration ramp for stepper moves.
//!
//! The pulse period starts at `max_time`, falls along a logistic curve to
//! `min_time` over the ramp, holds there, and climbs back symmetrically
//! over the last steps of the move. The curve is sampled at 100 points and
//! resampled to the configured ramp length.

use std::time::Duration;

const SAMPLE_LENGTH: usize = 100;
const MIDPOINT: f32 = 50.0;
const STEEPNESS: f32 = 0.12;

/// Pulse period (µs) for every step of one move.
#[derive(Debug, Clone)]
pub struct Ramp {
    table: Vec<u32>,
    ramp_length: i64,
    falling_start: i64,
    min_time: u32,
}

impl Ramp {
    /// Build the profile of a move of `total_steps` steps.
    ///
    /// Short moves that cannot fit two full ramps use half the move for
    /// each flank.
    pub fn new(total_steps: u32, min_time: u32, max_time: u32, max_ramp_length: u32) -> Self {
        let ramp_length = if u64::from(total_steps) < 2 * u64::from(max_ramp_length) {
            total_steps.div_ceil(2)
        } else {
            max_ramp_length
        };
        let samples = logistic_samples(min_time, max_time);
        Self {
            table: resample(&samples, max_ramp_length as usize),
            ramp_length: i64::from(ramp_length),
            falling_start: i64::from(total_steps) - i64::from(ramp_length),
            min_time,
        }
    }

    /// Pulse period in µs for step `step` (0-based).
    pub fn delay(&self, step: u32) -> u32 {
        if self.table.is_empty() {
            return self.min_time;
        }
        let x = i64::from(step);
        let index = if x < self.ramp_length {
            x
        } else if x > self.falling_start {
            self.ramp_length + self.falling_start - x
        } else {
            self.ramp_length - 1
        };
        let last = self.table.len() as i64 - 1;
        self.table[index.clamp(0, last) as usize]
    }

    /// Length of each of the high and low phases of one pulse.
    pub fn half_period(&self, step: u32) -> Duration {
        Duration::from_micros(u64::from(self.delay(step) / 2))
    }
}

/// 101 samples of the logistic curve from `max_time` down to `min_time`.
/// The final sample repeats the one before it.
fn logistic_samples(min_time: u32, max_time: u32) -> Vec<i64> {
    let max = max_time as f32;
    let span = max_time as f32 - min_time as f32;
    let mut samples: Vec<i64> = (1..=SAMPLE_LENGTH)
        .map(|x| (max - span / (1.0 + (-STEEPNESS * (x as f32 - MIDPOINT)).exp())) as i64)
        .collect();
    let last = samples[SAMPLE_LENGTH - 1];
    samples.push(last);
    samples
}

fn resample(samples: &[i64], ramp_size: usize) -> Vec<u32> {
    let values: Vec<i64> = if ramp_size == 0 {
        Vec::new()
    } else if ramp_size < SAMPLE_LENGTH {
        let stride = SAMPLE_LENGTH / ramp_size;
        (0..ramp_size).map(|i| samples[i * stride]).collect()
    } else if ramp_size > SAMPLE_LENGTH {
        let step = SAMPLE_LENGTH as f32 / ramp_size as f32;
        (0..ramp_size)
            .map(|x| {
                let position = x as f32 * step;
                let first = position as usize;
                let fraction = first as f32 - position;
                let (a, b) = (samples[first], samples[first + 1]);
                (a as f32 - (b - a) as f32 * fraction) as i64
            })
            .collect()
    } else {
        samples[..SAMPLE_LENGTH].to_vec()
    };
    values.into_iter().map(|v| v.max(0) as u32).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_move_profile() {
        let ramp = Ramp::new(80, 10, 2000, 50);
        assert_eq!(ramp.delay(0), 1994);
        assert_eq!(ramp.delay(39), 69);
        assert_eq!(ramp.delay(40), 69);
        assert_eq!(ramp.delay(80), 1994);
    }

    #[test]
    fn profile_is_symmetric() {
        let ramp = Ramp::new(80, 10, 2000, 50);
        for i in 1..40 {
            assert_eq!(ramp.delay(i), ramp.delay(80 - i), "step {i}");
        }
    }

    #[test]
    fn long_move_holds_plateau() {
        let ramp = Ramp::new(1000, 1000, 4000, 400);
        assert_eq!(ramp.delay(0), 3991);
        assert_eq!(ramp.delay(500), 1007);
        assert_eq!(ramp.delay(399), ramp.delay(600));
        assert_eq!(ramp.delay(999), ramp.delay(1));
    }

    #[test]
    fn interpolated_flank_never_speeds_backwards() {
        let ramp = Ramp::new(1000, 1000, 4000, 400);
        for i in 1..400 {
            assert!(ramp.delay(i) <= ramp.delay(i - 1), "step {i}");
        }
    }

    #[test]
    fn zero_ramp_runs_at_min_time() {
        let ramp = Ramp::new(10, 700, 4000, 0);
        assert_eq!(ramp.delay(0), 700);
        assert_eq!(ramp.delay(9), 700);
    }

    #[test]
    fn half_period_splits_delay() {
        let ramp = Ramp::new(80, 10, 2000, 50);
        assert_eq!(ramp.half_period(0), Duration::from_micros(997));
    }
}
