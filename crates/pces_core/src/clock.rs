//! Wall-clock abstraction.
//!
//! Segment names, retention and the replay throttle all read time through
//! [`Time`], so tests can drive them with [`FakeTime`].

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::time::Duration;

/// A source of wall-clock time.
pub trait Time: Send + Sync {
    /// Returns the current time.
    fn now(&self) -> DateTime<Utc>;
}

/// The system clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Time for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A manually driven clock.
///
/// Starts at a fixed instant and only moves when told to, or by a fixed step
/// on every read when auto-increment is set.
#[derive(Debug)]
pub struct FakeTime {
    now: Mutex<DateTime<Utc>>,
    auto_increment: chrono::Duration,
}

impl FakeTime {
    /// Creates a clock at 2024-01-01T00:00:00Z that does not advance by itself.
    #[must_use]
    pub fn new() -> Self {
        let start = DateTime::from_timestamp(1_704_067_200, 0).unwrap_or_default();
        Self::starting_at(start)
    }

    /// Creates a clock at `start` that does not advance by itself.
    #[must_use]
    pub fn starting_at(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
            auto_increment: chrono::Duration::zero(),
        }
    }

    /// Makes every call to [`Time::now`] advance the clock by `step`.
    #[must_use]
    pub fn with_auto_increment(mut self, step: Duration) -> Self {
        self.auto_increment = to_chrono(step);
        self
    }

    /// Advances the clock.
    pub fn tick(&self, elapsed: Duration) {
        let mut now = self.now.lock();
        *now += to_chrono(elapsed);
    }

    /// Sets the clock to an absolute time.
    pub fn set(&self, time: DateTime<Utc>) {
        *self.now.lock() = time;
    }
}

impl Default for FakeTime {
    fn default() -> Self {
        Self::new()
    }
}

impl Time for FakeTime {
    fn now(&self) -> DateTime<Utc> {
        let mut now = self.now.lock();
        let current = *now;
        *now += self.auto_increment;
        current
    }
}

/// Converts a std duration, saturating at the chrono maximum.
pub(crate) fn to_chrono(duration: Duration) -> chrono::Duration {
    chrono::Duration::from_std(duration).unwrap_or(chrono::Duration::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fake_time_stands_still() {
        let time = FakeTime::new();
        assert_eq!(time.now(), time.now());
    }

    #[test]
    fn tick_advances() {
        let time = FakeTime::new();
        let before = time.now();
        time.tick(Duration::from_secs(90));
        assert_eq!(time.now() - before, chrono::Duration::seconds(90));
    }

    #[test]
    fn auto_increment_advances_per_read() {
        let time = FakeTime::new().with_auto_increment(Duration::from_millis(5));
        let a = time.now();
        let b = time.now();
        assert_eq!(b - a, chrono::Duration::milliseconds(5));
    }

    #[test]
    fn system_clock_moves_forward() {
        let a = SystemClock.now();
        let b = SystemClock.now();
        assert!(b >= a);
    }
}
