use std::fmt;
use std::time::Instant;

/// Source of monotonic time for the rate limiters and the poller.
///
/// Every time-sensitive call in this crate goes through a [`Clock`] so that
/// tests can substitute virtual time. Production code uses [`SystemClock`].
pub trait Clock: fmt::Debug + Send + Sync {
    /// Current monotonic time.
    fn now(&self) -> Instant;
}

/// [`Clock`] backed by [`Instant::now`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

#[cfg(test)]
pub(crate) mod manual {
    use super::Clock;
    use std::sync::Mutex;
    use std::time::{Duration, Instant};

    /// Virtual-time clock that only moves when told to.
    #[derive(Debug)]
    pub(crate) struct ManualClock {
        start: Instant,
        offset: Mutex<Duration>,
    }

    impl ManualClock {
        pub(crate) fn new() -> Self {
            ManualClock {
                start: Instant::now(),
                offset: Mutex::new(Duration::ZERO),
            }
        }

        pub(crate) fn advance(&self, duration: Duration) {
            *self.offset.lock().unwrap() += duration;
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> Instant {
            self.start + *self.offset.lock().unwrap()
        }
    }
}
