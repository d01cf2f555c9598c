// Clock Port
// Durations of commands and termination windows are measured through it

/// Wall clock in milliseconds since the epoch
pub trait TimeProvider: Send + Sync {
    fn now_millis(&self) -> i64;

    /// Milliseconds elapsed since `start`. Never negative, even when the
    /// wall clock was set back in between.
    fn millis_since(&self, start: i64) -> i64 {
        self.now_millis().saturating_sub(start).max(0)
    }
}

/// chrono-backed clock (production)
pub struct SystemTimeProvider;

impl TimeProvider for SystemTimeProvider {
    fn now_millis(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

pub mod mocks {
    use super::*;
    use std::sync::atomic::{AtomicI64, Ordering};

    /// Clock that only moves when told to
    #[derive(Default)]
    pub struct ManualClock {
        now: AtomicI64,
    }

    impl ManualClock {
        pub fn at(millis: i64) -> Self {
            Self {
                now: AtomicI64::new(millis),
            }
        }

        pub fn set(&self, millis: i64) {
            self.now.store(millis, Ordering::SeqCst);
        }

        pub fn advance(&self, millis: i64) {
            self.now.fetch_add(millis, Ordering::SeqCst);
        }
    }

    impl TimeProvider for ManualClock {
        fn now_millis(&self) -> i64 {
            self.now.load(Ordering::SeqCst)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::mocks::ManualClock;
    use super::*;

    #[test]
    fn test_millis_since() {
        let clock = ManualClock::at(10_000);
        let start = clock.now_millis();
        clock.advance(250);
        assert_eq!(clock.millis_since(start), 250);
    }

    #[test]
    fn test_clock_set_back_is_zero_elapsed() {
        let clock = ManualClock::at(10_000);
        let start = clock.now_millis();
        clock.set(9_000);
        assert_eq!(clock.millis_since(start), 0);
    }
}
