//! Monotonic time sources.

/// A monotonic microsecond counter.
///
/// Pulse widths are derived from differences between two readings, so the counter must not go
/// backwards and should resolve at least one microsecond.
pub trait Clock {
    fn now_us(&self) -> u64;
}

impl<T: Clock + ?Sized> Clock for &T {
    fn now_us(&self) -> u64 {
        T::now_us(self)
    }
}

#[cfg(feature = "std")]
pub use self::host::{StdClock, StdDelay};

#[cfg(feature = "std")]
mod host {
    use std::time::{Duration, Instant};

    use embedded_hal::delay::DelayNs;

    use super::Clock;

    /// [`Clock`] backed by [`Instant`], counting from its creation.
    #[derive(Clone, Copy, Debug)]
    pub struct StdClock {
        origin: Instant,
    }

    impl StdClock {
        pub fn new() -> Self {
            StdClock {
                origin: Instant::now(),
            }
        }
    }

    impl Default for StdClock {
        fn default() -> Self {
            Self::new()
        }
    }

    impl Clock for StdClock {
        fn now_us(&self) -> u64 {
            u64::try_from(self.origin.elapsed().as_micros()).unwrap_or(u64::MAX)
        }
    }

    /// [`DelayNs`] implementation that puts the calling thread to sleep.
    #[derive(Clone, Copy, Debug, Default)]
    pub struct StdDelay;

    impl DelayNs for StdDelay {
        fn delay_ns(&mut self, ns: u32) {
            std::thread::sleep(Duration::from_nanos(ns.into()));
        }

        fn delay_us(&mut self, us: u32) {
            std::thread::sleep(Duration::from_micros(us.into()));
        }

        fn delay_ms(&mut self, ms: u32) {
            std::thread::sleep(Duration::from_millis(ms.into()));
        }
    }

}
