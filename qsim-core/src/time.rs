//! Simulation time management

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Sub};
use std::time::Duration;

/// A point in simulation time, stored as nanoseconds since the run start.
///
/// `SimTime` is simulation time, not wall-clock time; the event loop advances
/// it strictly event-to-event, which keeps runs deterministic and
/// reproducible. Delay samples are [`Duration`]s and are added onto a
/// `SimTime` to schedule timers.
///
/// "No pending event" is always expressed as `Option<SimTime>` being `None`,
/// never as a sentinel value; `None` sorts after every real time when the
/// event loop computes the tick minimum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SimTime(u64);

impl SimTime {
    /// The simulation start (time zero).
    pub const fn zero() -> Self {
        SimTime(0)
    }

    /// Build a `SimTime` from raw nanoseconds.
    pub const fn from_nanos(nanos: u64) -> Self {
        SimTime(nanos)
    }

    /// Build a `SimTime` from milliseconds.
    pub const fn from_millis(millis: u64) -> Self {
        SimTime(millis * 1_000_000)
    }

    /// Build a `SimTime` from whole seconds.
    pub const fn from_secs(secs: u64) -> Self {
        SimTime(secs * 1_000_000_000)
    }

    /// Build a `SimTime` from a `Duration` offset from the run start.
    pub fn from_duration(duration: Duration) -> Self {
        SimTime(duration.as_nanos() as u64)
    }

    /// Raw nanosecond value.
    pub const fn as_nanos(&self) -> u64 {
        self.0
    }

    /// Elapsed seconds since the run start, as a float.
    ///
    /// Time-weighted statistics (queue-length and busy-device integrals) are
    /// kept in float seconds, so this is the bridge used by the accumulator.
    pub fn as_secs_f64(&self) -> f64 {
        self.0 as f64 / 1_000_000_000.0
    }

    /// Convert to a `Duration` since the run start.
    pub fn as_duration(&self) -> Duration {
        Duration::from_nanos(self.0)
    }

    /// Duration elapsed since an earlier `SimTime` (saturating at zero).
    pub fn duration_since(&self, earlier: SimTime) -> Duration {
        Duration::from_nanos(self.0.saturating_sub(earlier.0))
    }
}

impl Add<Duration> for SimTime {
    type Output = SimTime;

    fn add(self, rhs: Duration) -> Self::Output {
        SimTime(self.0.saturating_add(rhs.as_nanos() as u64))
    }
}

impl Sub<SimTime> for SimTime {
    type Output = Duration;

    fn sub(self, rhs: SimTime) -> Self::Output {
        self.duration_since(rhs)
    }
}

impl Default for SimTime {
    fn default() -> Self {
        SimTime::zero()
    }
}

impl From<f64> for SimTime {
    /// Convert from seconds (as f64) to `SimTime`.
    ///
    /// # Panics
    ///
    /// Panics if the input is negative, infinite, or NaN, or overflows the
    /// nanosecond range.
    fn from(secs: f64) -> Self {
        if !secs.is_finite() {
            panic!("SimTime cannot be created from non-finite value: {secs}");
        }
        if secs < 0.0 {
            panic!("SimTime cannot be negative: {secs}");
        }
        const MAX_SECS: f64 = (u64::MAX as f64) / 1_000_000_000.0;
        if secs > MAX_SECS {
            panic!("SimTime value too large: {secs} seconds (max: {MAX_SECS})");
        }
        SimTime::from_nanos((secs * 1_000_000_000.0) as u64)
    }
}

impl fmt::Display for SimTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let duration = self.as_duration();
        let secs = duration.as_secs();
        let millis = duration.subsec_millis();
        if secs > 0 || millis > 0 {
            write!(f, "{secs}.{millis:03}s")
        } else {
            write!(f, "{}ns", duration.subsec_nanos())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn creation() {
        assert_eq!(SimTime::zero().as_nanos(), 0);
        assert_eq!(SimTime::from_millis(1).as_nanos(), 1_000_000);
        assert_eq!(SimTime::from_secs(1).as_nanos(), 1_000_000_000);
        assert_eq!(SimTime::from(2.5).as_nanos(), 2_500_000_000);
    }

    #[test]
    fn arithmetic() {
        let t = SimTime::from_millis(100);
        assert_eq!(t + Duration::from_millis(25), SimTime::from_millis(125));
        assert_eq!(t - SimTime::from_millis(40), Duration::from_millis(60));
        // Saturating: earlier minus later is zero, not a panic.
        assert_eq!(SimTime::from_millis(40) - t, Duration::ZERO);
    }

    #[test]
    fn none_sorts_after_every_real_value() {
        let times = [Some(SimTime::from_secs(3)), None, Some(SimTime::from_secs(1))];
        let min = times.iter().flatten().min().copied();
        assert_eq!(min, Some(SimTime::from_secs(1)));

        let empty: [Option<SimTime>; 2] = [None, None];
        assert_eq!(empty.iter().flatten().min(), None);
    }

    #[test]
    fn seconds_roundtrip() {
        let t = SimTime::from(1.5);
        assert_eq!(t.as_secs_f64(), 1.5);
    }

    #[test]
    #[should_panic(expected = "SimTime cannot be negative")]
    fn negative_seconds_panic() {
        let _ = SimTime::from(-1.0);
    }

    #[test]
    #[should_panic(expected = "non-finite")]
    fn nan_seconds_panic() {
        let _ = SimTime::from(f64::NAN);
    }
}
