//! Time sources for rate limiters.
//!
//! Every process that shares a bucket must measure time the same way, so
//! rate limiters read wall-clock seconds rather than a monotonic clock. The
//! [`FakeRelativeClock`] in this module lets tests move time forward by hand.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::timestamp::Timestamp;

/// A time source used by rate limiters.
pub trait Clock: Clone + Send + Sync {
    /// Returns the current time, in whole seconds since the unix epoch.
    fn now(&self) -> Timestamp;
}

/// A mock implementation of a clock. All it does is keep track of
/// what "now" is (relative to the unix epoch, unless constructed with
/// [`FakeRelativeClock::starting_at`]), and returns that.
///
/// # Thread safety
/// The mock time is represented as an atomic u64 count of nanoseconds, behind an [`Arc`].
/// Clones of this clock will all show the same time, even if the original advances.
#[derive(Debug, Clone, Default)]
pub struct FakeRelativeClock {
    now: Arc<AtomicU64>,
}

impl FakeRelativeClock {
    /// Constructs a fake clock that reads `start` until it is advanced.
    pub fn starting_at(start: Timestamp) -> Self {
        let nanos = start.as_secs().saturating_mul(1_000_000_000);
        FakeRelativeClock {
            now: Arc::new(AtomicU64::new(nanos)),
        }
    }

    /// Advances the fake clock by the given amount.
    ///
    /// Sub-second advances accumulate: advancing by 600ms twice moves
    /// [`now`](Clock::now) forward by one second.
    pub fn advance(&self, by: Duration) {
        let by = u64::try_from(by.as_nanos()).unwrap_or(u64::MAX);
        let mut prev = self.now.load(Ordering::Acquire);
        let mut next = prev.saturating_add(by);
        while let Err(next_prev) =
            self.now
                .compare_exchange_weak(prev, next, Ordering::Release, Ordering::Relaxed)
        {
            prev = next_prev;
            next = prev.saturating_add(by);
        }
    }
}

impl PartialEq for FakeRelativeClock {
    fn eq(&self, other: &Self) -> bool {
        self.now.load(Ordering::Relaxed) == other.now.load(Ordering::Relaxed)
    }
}

impl Clock for FakeRelativeClock {
    fn now(&self) -> Timestamp {
        Timestamp::from_secs(self.now.load(Ordering::Relaxed) / 1_000_000_000)
    }
}

mod with_std;
pub use with_std::*;

/// The default clock: the system's wall clock.
pub type DefaultClock = SystemClock;
