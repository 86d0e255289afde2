// SPDX-License-Identifier: GPL-3.0-only

//! Time-based zoom ramps
//!
//! A ramp moves the zoom factor linearly from its value at ramp start towards
//! a target at a fixed rate (zoom units per second). The current factor is
//! computed on demand from the elapsed time, so no thread is needed to
//! advance it.

use std::time::{Duration, Instant};

/// A single linear zoom transition
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ZoomRamp {
    from: f64,
    target: f64,
    rate: f64,
    started_at: Instant,
}

impl ZoomRamp {
    /// Start a ramp at `now`
    ///
    /// A non-positive rate jumps straight to the target.
    pub fn new(from: f64, target: f64, rate: f64, now: Instant) -> Self {
        Self {
            from,
            target,
            rate,
            started_at: now,
        }
    }

    /// Target factor of this ramp
    pub fn target(&self) -> f64 {
        self.target
    }

    /// Zoom factor at the given instant
    pub fn factor_at(&self, now: Instant) -> f64 {
        if self.rate <= 0.0 {
            return self.target;
        }
        let elapsed = now.saturating_duration_since(self.started_at).as_secs_f64();
        let travelled = self.rate * elapsed;
        if self.target >= self.from {
            (self.from + travelled).min(self.target)
        } else {
            (self.from - travelled).max(self.target)
        }
    }

    /// Total time the ramp takes
    pub fn duration(&self) -> Duration {
        if self.rate <= 0.0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64((self.target - self.from).abs() / self.rate)
    }

    /// Whether the target has been reached at the given instant
    pub fn is_complete_at(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.started_at) >= self.duration()
    }
}

/// Zoom state of one device: a resting factor or a ramp in flight
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ZoomState {
    resting: f64,
    ramp: Option<ZoomRamp>,
}

impl ZoomState {
    /// Resting state at the given factor
    pub fn new(factor: f64) -> Self {
        Self {
            resting: factor,
            ramp: None,
        }
    }

    /// Current zoom factor
    pub fn factor_at(&self, now: Instant) -> f64 {
        match &self.ramp {
            Some(ramp) => ramp.factor_at(now),
            None => self.resting,
        }
    }

    /// Whether a ramp is still moving at the given instant
    pub fn is_ramping_at(&self, now: Instant) -> bool {
        self.ramp.is_some_and(|ramp| !ramp.is_complete_at(now))
    }

    /// Begin a ramp from wherever the zoom currently is
    ///
    /// A ramp already in flight is replaced, starting from its current value.
    pub fn ramp_to(&mut self, target: f64, rate: f64, now: Instant) -> ZoomRamp {
        let from = self.factor_at(now);
        let ramp = ZoomRamp::new(from, target, rate, now);
        self.resting = target;
        self.ramp = Some(ramp);
        ramp
    }

    /// Jump to a factor without ramping
    pub fn set(&mut self, factor: f64) {
        self.resting = factor;
        self.ramp = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ramp_progresses_linearly() {
        let start = Instant::now();
        let ramp = ZoomRamp::new(1.0, 2.0, 1.0, start);
        let half = ramp.factor_at(start + Duration::from_millis(500));
        assert!((half - 1.5).abs() < 1e-9);
        assert_eq!(ramp.factor_at(start + Duration::from_secs(3)), 2.0);
    }

    #[test]
    fn test_ramp_down_stops_at_target() {
        let start = Instant::now();
        let ramp = ZoomRamp::new(4.0, 3.0, 1.0, start);
        assert_eq!(ramp.factor_at(start + Duration::from_secs(10)), 3.0);
        assert!(ramp.is_complete_at(start + Duration::from_secs(1)));
        assert!(!ramp.is_complete_at(start + Duration::from_millis(200)));
    }

    #[test]
    fn test_zero_rate_jumps() {
        let start = Instant::now();
        let ramp = ZoomRamp::new(1.0, 5.0, 0.0, start);
        assert_eq!(ramp.factor_at(start), 5.0);
        assert_eq!(ramp.duration(), Duration::ZERO);
    }

    #[test]
    fn test_retarget_starts_from_current_value() {
        let start = Instant::now();
        let mut state = ZoomState::new(1.0);
        state.ramp_to(3.0, 1.0, start);
        let mid = start + Duration::from_secs(1);
        let ramp = state.ramp_to(1.0, 1.0, mid);
        assert!((ramp.factor_at(mid) - 2.0).abs() < 1e-9);
        assert!(state.is_ramping_at(mid));
    }
}
