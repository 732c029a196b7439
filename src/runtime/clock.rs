use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::time::Duration;

/// Time as the actors see it: a wall-clock reading for timestamps and an
/// awaitable sleep for timers. Injected so tests can run on virtual time.
#[async_trait]
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
    async fn sleep(&self, duration: Duration);
}

/// Production clock: real wall time, tokio timers.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

#[async_trait]
impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Deterministic clock for tests: wall time is derived from tokio's virtual
/// instant, so `tokio::time::pause()` + `advance()` move both sleeps and
/// `now()` in lockstep.
#[derive(Debug, Clone)]
pub struct TestClock {
    base: DateTime<Utc>,
    origin: tokio::time::Instant,
}

impl TestClock {
    pub fn new(base: DateTime<Utc>) -> Self {
        Self {
            base,
            origin: tokio::time::Instant::now(),
        }
    }
}

impl Default for TestClock {
    fn default() -> Self {
        Self::new(Utc::now())
    }
}

#[async_trait]
impl Clock for TestClock {
    fn now(&self) -> DateTime<Utc> {
        let elapsed = self.origin.elapsed();
        self.base
            + ChronoDuration::from_std(elapsed).unwrap_or_else(|_| ChronoDuration::seconds(0))
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_clock_advances_with_virtual_time() {
        let clock = TestClock::default();
        let before = clock.now();
        tokio::time::advance(Duration::from_secs(90)).await;
        let after = clock.now();
        assert_eq!((after - before).num_seconds(), 90);
    }

    #[tokio::test(start_paused = true)]
    async fn sleeps_complete_on_virtual_time() {
        let clock = TestClock::default();
        let sleep = clock.sleep(Duration::from_secs(3600));
        tokio::pin!(sleep);
        tokio::time::advance(Duration::from_secs(3601)).await;
        sleep.await;
    }
}
