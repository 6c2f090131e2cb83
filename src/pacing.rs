// SPDX-License-Identifier: Apache-2.0

//! Adaptive idle pacing.
//!
//! A pure function of elapsed time since process start producing a
//! smoothly varying multiplier used to scale idle-sleep durations. It is
//! a self-throttling governor so that quiet read loops do not poll on a
//! fixed cadence; it is not derived from load or backpressure.

use std::f64::consts::PI;
use std::time::{Duration, Instant};

/// Default oscillation period.
pub const DEFAULT_PERIOD: Duration = Duration::from_secs(600);

/// Base idle interval between read attempts on a quiet stream.
pub const READ_IDLE_INTERVAL: Duration = Duration::from_millis(50);

/// Base sleep of the top-level keepalive loop.
pub const KEEPALIVE_INTERVAL: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Copy)]
pub struct Pacing {
    start: Instant,
    period: Duration,
}

impl Pacing {
    pub fn new() -> Self {
        Self::with_period(DEFAULT_PERIOD)
    }

    pub fn with_period(period: Duration) -> Self {
        Self {
            start: Instant::now(),
            period,
        }
    }

    /// Pacing factor for a given elapsed time: `2 + sin(sin(2π·t/period))`.
    /// Composing the two sines keeps the factor within roughly [1.16, 2.84].
    pub fn factor_at(&self, elapsed: Duration) -> f64 {
        let cycles = elapsed.as_secs_f64() / self.period.as_secs_f64();
        2.0 + (2.0 * PI * cycles).sin().sin()
    }

    /// Current pacing factor.
    pub fn factor(&self) -> f64 {
        self.factor_at(self.start.elapsed())
    }

    /// Scale a base idle duration by the current factor.
    pub fn scale(&self, base: Duration) -> Duration {
        base.mul_f64(self.factor())
    }
}

impl Default for Pacing {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_factor_at_origin() {
        let pacing = Pacing::new();
        assert_eq!(pacing.factor_at(Duration::ZERO), 2.0);
    }

    #[test]
    fn test_factor_stays_in_range() {
        let pacing = Pacing::new();
        // Sample a bit over one full period.
        for secs in 0..700 {
            let f = pacing.factor_at(Duration::from_secs(secs));
            assert!(f >= 1.0 && f <= 3.0, "factor {} out of range at {}s", f, secs);
        }
    }

    #[test]
    fn test_factor_oscillates() {
        let pacing = Pacing::with_period(Duration::from_secs(600));
        // Quarter period is the sine peak, three quarters the trough.
        let peak = pacing.factor_at(Duration::from_secs(150));
        let trough = pacing.factor_at(Duration::from_secs(450));
        assert!(peak > 2.5);
        assert!(trough < 1.5);
    }

    #[test]
    fn test_scale() {
        let pacing = Pacing::new();
        let scaled = pacing.factor_at(Duration::ZERO);
        assert_eq!(scaled, 2.0);

        // scale() uses the live clock; just bound it.
        let d = pacing.scale(Duration::from_millis(50));
        assert!(d >= Duration::from_millis(50) && d <= Duration::from_millis(150));
    }
}
