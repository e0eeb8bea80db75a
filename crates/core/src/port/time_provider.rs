// Time Provider Port (for testability)

/// Time provider interface (allows mocking in tests)
pub trait TimeProvider: Send + Sync {
    /// Get current time in milliseconds since epoch
    fn now_millis(&self) -> i64;
}

/// System time provider (production)
pub struct SystemTimeProvider;

impl TimeProvider for SystemTimeProvider {
    fn now_millis(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

pub mod mocks {
    use super::TimeProvider;
    use crate::port::Sleeper;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicI64, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    /// Clock that only moves when something sleeps on it.
    ///
    /// Every `sleep` advances `now_millis` by the requested duration and is recorded,
    /// so backoff schedules and deadlines can be asserted without real waiting.
    pub struct ManualClock {
        now_ms: AtomicI64,
        sleeps: Mutex<Vec<Duration>>,
    }

    impl ManualClock {
        pub fn new(start_ms: i64) -> Self {
            Self {
                now_ms: AtomicI64::new(start_ms),
                sleeps: Mutex::new(Vec::new()),
            }
        }

        pub fn advance(&self, by: Duration) {
            self.now_ms.fetch_add(by.as_millis() as i64, Ordering::SeqCst);
        }

        pub fn sleeps(&self) -> Vec<Duration> {
            self.sleeps.lock().unwrap().clone()
        }
    }

    impl Default for ManualClock {
        fn default() -> Self {
            Self::new(0)
        }
    }

    impl TimeProvider for ManualClock {
        fn now_millis(&self) -> i64 {
            self.now_ms.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Sleeper for ManualClock {
        async fn sleep(&self, duration: Duration) {
            self.sleeps.lock().unwrap().push(duration);
            self.advance(duration);
            tokio::task::yield_now().await;
        }
    }
}
