//! Host wall-clock access.

use std::time::{Duration, Instant};

/// Wall-clock services provided by the host.
///
/// The interpreter uses this for two things only: the cooperative pause
/// while the emulated CPU sits in STOP, and the elapsed-time check behind
/// the optional dead-man's switch.
pub trait HostClock {
    /// Milliseconds since an arbitrary, fixed epoch.
    fn now_millis(&self) -> u64;

    /// Yield the host thread for a short, host-defined interval.
    ///
    /// Called once per idle tick, so the emulated timers that advance on
    /// idle ticks do not run faster than real time.
    fn delay(&mut self);
}

/// [`HostClock`] backed by [`Instant`] and [`std::thread::sleep`].
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    epoch: Instant,
    delay: Duration,
}

impl SystemClock {
    /// Default pause per idle tick.
    pub const DEFAULT_DELAY: Duration = Duration::from_millis(1);

    #[must_use]
    pub fn new() -> Self {
        Self::with_delay(Self::DEFAULT_DELAY)
    }

    /// A clock that sleeps for `delay` on every idle tick.
    #[must_use]
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            epoch: Instant::now(),
            delay,
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl HostClock for SystemClock {
    fn now_millis(&self) -> u64 {
        self.epoch.elapsed().as_millis() as u64
    }

    fn delay(&mut self) {
        if self.delay.is_zero() {
            std::thread::yield_now();
        } else {
            std::thread::sleep(self.delay);
        }
    }
}
