use std::ops::Add;
use std::time::Duration;

#[cfg(feature = "jitter")]
use rand::distributions::{Distribution, Uniform};

/// An interval specification for deviating from the nominal wait time.
///
/// Jitter can be added to wait time `Duration`s to ensure that multiple tasks
/// waiting on the same bucket don't all wake up and hit the store in the
/// same instant.
///
/// Jitter is sampled from a uniform distribution between `min` and `max`.
/// Without the `jitter` feature, no randomness is available and `min` is
/// always used.
///
/// # Examples
///
/// ```rust
/// # use remote_governor::Jitter;
/// # use std::time::Duration;
/// let reference = Duration::from_millis(100);
/// let jitter = Jitter::new(Duration::from_millis(10), Duration::from_millis(20));
/// let result = jitter + reference;
/// assert!(result >= Duration::from_millis(110));
/// assert!(result < Duration::from_millis(130));
/// ```
#[derive(Debug, PartialEq, Eq, Default, Clone, Copy)]
pub struct Jitter {
    min: Duration,
    max: Duration,
}

impl Jitter {
    /// The "empty" jitter interval - no jitter at all.
    pub const NONE: Jitter = Jitter {
        min: Duration::ZERO,
        max: Duration::ZERO,
    };

    /// Constructs a new Jitter interval, waiting at most a duration of `max`.
    pub fn up_to(max: Duration) -> Jitter {
        Jitter {
            min: Duration::ZERO,
            max,
        }
    }

    /// Constructs a new Jitter interval, waiting at least `min` and at most `min+interval`.
    pub fn new(min: Duration, interval: Duration) -> Jitter {
        let max = min + interval;
        Jitter { min, max }
    }

    /// Returns a random amount of jitter within the configured interval.
    #[cfg(feature = "jitter")]
    pub(crate) fn get(&self) -> Duration {
        if self.min == self.max {
            return self.min;
        }
        let uniform = Uniform::new(self.min, self.max);
        uniform.sample(&mut rand::thread_rng())
    }

    #[cfg(not(feature = "jitter"))]
    pub(crate) fn get(&self) -> Duration {
        self.min
    }
}

impl Add<Duration> for Jitter {
    type Output = Duration;

    fn add(self, rhs: Duration) -> Duration {
        rhs + self.get()
    }
}
