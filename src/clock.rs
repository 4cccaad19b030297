//! Time sources and hour-boundary scheduling math
//!
//! The rate-limit sweep and the hourly telemetry rollup both run on wall-clock
//! time. Components take an injected [`Clock`] so tests can drive time
//! deterministically instead of sleeping.

use chrono::{DateTime, Utc};
use std::time::Duration;

/// Wall-clock time source
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// The real system clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Start of the next wall-clock hour after `now`
pub fn next_hour_boundary(now: DateTime<Utc>) -> DateTime<Utc> {
    let secs = now.timestamp();
    let next = secs - secs.rem_euclid(3600) + 3600;
    DateTime::from_timestamp(next, 0).unwrap_or(now)
}

/// Sleep duration from `now` until `target`; zero if `target` already passed
pub fn delay_until(now: DateTime<Utc>, target: DateTime<Utc>) -> Duration {
    (target - now).to_std().unwrap_or(Duration::ZERO)
}

/// Manually-advanced clock for deterministic tests
#[cfg(test)]
pub struct ManualClock {
    now: std::sync::Mutex<DateTime<Utc>>,
}

#[cfg(test)]
impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: std::sync::Mutex::new(start),
        }
    }

    pub fn advance(&self, delta: chrono::Duration) {
        let mut now = self.now.lock().unwrap();
        *now += delta;
    }
}

#[cfg(test)]
impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_next_hour_boundary_truncates_to_hour() {
        let now = Utc.with_ymd_and_hms(2024, 3, 5, 14, 37, 22).unwrap();
        let boundary = next_hour_boundary(now);
        assert_eq!(boundary, Utc.with_ymd_and_hms(2024, 3, 5, 15, 0, 0).unwrap());
    }

    #[test]
    fn test_next_hour_boundary_on_exact_hour() {
        // An exact boundary schedules the *next* hour, not itself
        let now = Utc.with_ymd_and_hms(2024, 3, 5, 14, 0, 0).unwrap();
        let boundary = next_hour_boundary(now);
        assert_eq!(boundary, Utc.with_ymd_and_hms(2024, 3, 5, 15, 0, 0).unwrap());
    }

    #[test]
    fn test_next_hour_boundary_crosses_midnight() {
        let now = Utc.with_ymd_and_hms(2024, 3, 5, 23, 59, 59).unwrap();
        let boundary = next_hour_boundary(now);
        assert_eq!(boundary, Utc.with_ymd_and_hms(2024, 3, 6, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_delay_until() {
        let now = Utc.with_ymd_and_hms(2024, 3, 5, 14, 30, 0).unwrap();
        let target = Utc.with_ymd_and_hms(2024, 3, 5, 15, 0, 0).unwrap();
        assert_eq!(delay_until(now, target), Duration::from_secs(1800));
    }

    #[test]
    fn test_delay_until_past_target_is_zero() {
        let now = Utc.with_ymd_and_hms(2024, 3, 5, 15, 30, 0).unwrap();
        let target = Utc.with_ymd_and_hms(2024, 3, 5, 15, 0, 0).unwrap();
        assert_eq!(delay_until(now, target), Duration::ZERO);
    }

    #[test]
    fn test_manual_clock_advance() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let clock = ManualClock::new(start);
        assert_eq!(clock.now(), start);

        clock.advance(chrono::Duration::hours(25));
        assert_eq!(clock.now(), start + chrono::Duration::hours(25));
    }
}
