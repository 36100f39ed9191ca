//! Time abstractions for replay checks and health reporting.
//!
//! Replay protection compares a request timestamp against "now"; routing
//! that through a `Clock` lets tests pin the current instant and move it in
//! both directions.

use std::{
    sync::{
        atomic::{AtomicI64, AtomicU64, Ordering},
        Arc,
    },
    time::{Duration, Instant, SystemTime, UNIX_EPOCH},
};

/// Clock abstraction for time operations.
pub trait Clock: Send + Sync + std::fmt::Debug {
    /// Returns the current instant for duration measurements.
    fn now(&self) -> Instant;

    /// Returns the current system time for timestamps.
    fn now_system(&self) -> SystemTime;

    /// Returns the current system time as milliseconds since the Unix epoch.
    ///
    /// Times before the epoch are reported as negative values.
    fn now_millis(&self) -> i64 {
        match self.now_system().duration_since(UNIX_EPOCH) {
            Ok(since) => i64::try_from(since.as_millis()).unwrap_or(i64::MAX),
            Err(before) => -i64::try_from(before.duration().as_millis()).unwrap_or(i64::MAX),
        }
    }
}

/// Real clock implementation using system time.
#[derive(Debug, Clone, Copy, Default)]
pub struct RealClock;

impl Clock for RealClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn now_system(&self) -> SystemTime {
        SystemTime::now()
    }
}

impl RealClock {
    /// Creates a new real clock instance.
    pub fn new() -> Self {
        Self
    }
}

/// Test clock for deterministic time control.
///
/// Monotonic time only moves forward. System time can be set anywhere,
/// including backwards, to simulate skewed senders.
#[derive(Debug, Clone)]
pub struct TestClock {
    /// Monotonic time in nanoseconds since start
    monotonic_ns: Arc<AtomicU64>,
    /// System time as milliseconds since UNIX_EPOCH
    system_ms: Arc<AtomicI64>,
    /// Base instant for monotonic time calculations
    base_instant: Instant,
}

impl TestClock {
    /// Creates a new test clock starting at the current time.
    pub fn new() -> Self {
        Self::with_start_time(SystemTime::now())
    }

    /// Creates a test clock starting at a specific time.
    pub fn with_start_time(start: SystemTime) -> Self {
        let since_epoch = start.duration_since(UNIX_EPOCH).unwrap_or_default();
        Self::at_millis(i64::try_from(since_epoch.as_millis()).unwrap_or(i64::MAX))
    }

    /// Creates a test clock whose system time is `millis` after the epoch.
    pub fn at_millis(millis: i64) -> Self {
        Self {
            monotonic_ns: Arc::new(AtomicU64::new(0)),
            system_ms: Arc::new(AtomicI64::new(millis)),
            base_instant: Instant::now(),
        }
    }

    /// Advances both clocks by the specified duration.
    pub fn advance(&self, duration: Duration) {
        let duration_ns = u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX);
        let duration_ms = i64::try_from(duration.as_millis()).unwrap_or(i64::MAX);

        self.monotonic_ns.fetch_add(duration_ns, Ordering::AcqRel);
        self.system_ms.fetch_add(duration_ms, Ordering::AcqRel);
    }

    /// Moves system time backwards; monotonic time is untouched.
    pub fn rewind(&self, duration: Duration) {
        let duration_ms = i64::try_from(duration.as_millis()).unwrap_or(i64::MAX);
        self.system_ms.fetch_sub(duration_ms, Ordering::AcqRel);
    }

    /// Jumps system time to `millis` after the epoch.
    pub fn jump_to_millis(&self, millis: i64) {
        self.system_ms.store(millis, Ordering::Release);
    }
}

impl Default for TestClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for TestClock {
    fn now(&self) -> Instant {
        let elapsed_ns = self.monotonic_ns.load(Ordering::Acquire);
        self.base_instant + Duration::from_nanos(elapsed_ns)
    }

    fn now_system(&self) -> SystemTime {
        let ms = self.system_ms.load(Ordering::Acquire);
        if ms >= 0 {
            UNIX_EPOCH + Duration::from_millis(ms.unsigned_abs())
        } else {
            UNIX_EPOCH - Duration::from_millis(ms.unsigned_abs())
        }
    }

    fn now_millis(&self) -> i64 {
        self.system_ms.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clock_advances() {
        let clock = TestClock::new();
        let start = clock.now();

        clock.advance(Duration::from_secs(10));

        assert_eq!(clock.now().duration_since(start), Duration::from_secs(10));
    }

    #[test]
    fn test_clock_system_time() {
        let start = UNIX_EPOCH + Duration::from_secs(1000);
        let clock = TestClock::with_start_time(start);

        assert_eq!(clock.now_system(), start);
        assert_eq!(clock.now_millis(), 1_000_000);

        clock.advance(Duration::from_secs(60));
        assert_eq!(clock.now_system(), start + Duration::from_secs(60));
    }

    #[test]
    fn test_clock_rewind_keeps_monotonic_time() {
        let clock = TestClock::at_millis(10_000);
        let before = clock.now();

        clock.rewind(Duration::from_secs(4));

        assert_eq!(clock.now_millis(), 6_000);
        assert_eq!(clock.now(), before);
    }

    #[test]
    fn real_clock_reports_millis_after_epoch() {
        let millis = RealClock::new().now_millis();
        // 2020-01-01T00:00:00Z
        assert!(millis > 1_577_836_800_000);
    }
}
