//! Clock abstraction for testable timing operations.
//!
//! Backoff and rate-limit waits go through a [`Clock`] so tests can observe
//! and skip delays instead of sleeping through them. Production code uses
//! [`RealClock`]; tests inject [`TestClock`].

use std::{
    future::Future,
    pin::Pin,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex,
    },
    time::{Duration, Instant},
};

/// Time source for the client's retry and circuit-breaker logic.
///
/// `now` drives circuit-breaker cooldown checks, `sleep` drives backoff and
/// rate-limit waits.
pub trait Clock: Send + Sync + std::fmt::Debug {
    /// Returns the current instant for duration measurements.
    fn now(&self) -> Instant;

    /// Sleeps for the specified duration.
    fn sleep(&self, duration: Duration) -> Pin<Box<dyn Future<Output = ()> + Send + '_>>;
}

/// Production clock backed by system time and tokio's timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct RealClock;

impl RealClock {
    /// Creates a new real clock instance.
    pub fn new() -> Self {
        Self
    }
}

impl Clock for RealClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, duration: Duration) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        Box::pin(tokio::time::sleep(duration))
    }
}

/// Deterministic clock for tests.
///
/// `sleep` returns immediately, advances virtual time by the requested
/// duration, and records it. Tests assert on [`TestClock::recorded_sleeps`]
/// to verify backoff sequences without waiting through them. `advance` moves
/// virtual time forward without recording, e.g. to expire a circuit-breaker
/// cooldown.
#[derive(Debug, Clone)]
pub struct TestClock {
    /// Virtual nanoseconds elapsed since clock creation.
    elapsed_ns: Arc<AtomicU64>,
    /// Base instant for translating virtual time back to `Instant`.
    base_instant: Instant,
    /// Every duration passed to `sleep`, in call order.
    sleeps: Arc<Mutex<Vec<Duration>>>,
}

impl TestClock {
    /// Creates a new test clock starting at the current instant.
    pub fn new() -> Self {
        Self {
            elapsed_ns: Arc::new(AtomicU64::new(0)),
            base_instant: Instant::now(),
            sleeps: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Advances virtual time without recording a sleep.
    pub fn advance(&self, duration: Duration) {
        let duration_ns = u64::try_from(duration.as_nanos().min(u128::from(u64::MAX))).unwrap_or(0);
        self.elapsed_ns.fetch_add(duration_ns, Ordering::AcqRel);
    }

    /// Returns every duration slept through this clock, in call order.
    pub fn recorded_sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().map(|sleeps| sleeps.clone()).unwrap_or_default()
    }

    /// Returns virtual time elapsed since clock creation.
    pub fn elapsed(&self) -> Duration {
        Duration::from_nanos(self.elapsed_ns.load(Ordering::Acquire))
    }
}

impl Default for TestClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for TestClock {
    fn now(&self) -> Instant {
        self.base_instant + self.elapsed()
    }

    fn sleep(&self, duration: Duration) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        if let Ok(mut sleeps) = self.sleeps.lock() {
            sleeps.push(duration);
        }
        self.advance(duration);
        // Yield so other tasks can observe the advanced time
        Box::pin(tokio::task::yield_now())
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

    #[tokio::test]
    async fn test_clock_records_sleeps() {
        let clock = TestClock::new();

        clock.sleep(Duration::from_millis(250)).await;
        clock.sleep(Duration::from_secs(2)).await;

        assert_eq!(
            clock.recorded_sleeps(),
            vec![Duration::from_millis(250), Duration::from_secs(2)]
        );
        assert_eq!(clock.elapsed(), Duration::from_millis(2250));
    }

    #[tokio::test]
    async fn real_clock_sleeps_for_requested_duration() {
        let clock = RealClock::new();
        let start = Instant::now();

        clock.sleep(Duration::from_millis(20)).await;

        assert!(start.elapsed() >= Duration::from_millis(20));
    }
}
