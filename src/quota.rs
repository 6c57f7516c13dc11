use std::time::Duration;

use crate::errors::InvalidRate;

/// A rate-limiting quota.
///
/// Quotas are expressed as a number of tokens per second ("QPS"). The same
/// number is used for both the bucket's capacity and its refill rate: a
/// bucket never holds more than one second's worth of tokens, so a caller
/// can burst at most `qps` tokens at once and then sustain `qps` tokens per
/// second.
///
/// A quota of zero tokens per second can be constructed (e.g. from a
/// configuration file), but any rate limiter using it refuses every check
/// with [`InvalidRate`].
///
/// # Examples
///
/// ```rust
/// # use remote_governor::Quota;
/// # use std::time::Duration;
/// let q = Quota::per_second(50);
/// assert_eq!(q.capacity(), 50);
/// assert_eq!(q.refill_rate(), 50);
/// assert_eq!(q.delay_for(1), Duration::from_millis(20));
/// assert_eq!(q.idle_expiry(), Duration::from_secs(2));
/// ```
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
pub struct Quota {
    qps: u32,
}

/// Constructors for Quotas
impl Quota {
    /// Construct a quota for a number of tokens per second. The given number of tokens is also
    /// the bucket's capacity.
    pub const fn per_second(qps: u32) -> Quota {
        Quota { qps }
    }
}

/// Retrieving information about a quota
impl Quota {
    /// The configured number of tokens per second.
    pub const fn qps(&self) -> u32 {
        self.qps
    }

    /// The maximum number of tokens a bucket can hold.
    pub const fn capacity(&self) -> u32 {
        self.qps
    }

    /// The number of tokens added to a bucket every second.
    pub const fn refill_rate(&self) -> u32 {
        self.qps
    }

    /// Checks that the quota can ever refill a bucket.
    pub const fn validate(&self) -> Result<(), InvalidRate> {
        if self.qps == 0 {
            Err(InvalidRate(self.qps))
        } else {
            Ok(())
        }
    }

    /// How long an untouched bucket is kept by the store: long enough for
    /// two full refills, and never less than one second.
    ///
    /// Returns the zero duration for an invalid quota.
    pub const fn idle_expiry(&self) -> Duration {
        Duration::from_secs(expiry_secs(self.capacity(), self.refill_rate()))
    }

    /// The estimated time for `n` tokens to be refilled.
    ///
    /// Returns the zero duration for an invalid quota.
    pub fn delay_for(&self, n: u32) -> Duration {
        if self.qps == 0 {
            return Duration::ZERO;
        }
        let nanos = u128::from(n) * 1_000_000_000 / u128::from(self.qps);
        Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX))
    }
}

/// `ceil(2 * capacity / rate)`, at least 1; zero if `rate` is zero.
pub(crate) const fn expiry_secs(capacity: u32, rate: u32) -> u64 {
    if rate == 0 {
        return 0;
    }
    let twice = 2 * capacity as u64;
    let rate = rate as u64;
    let secs = (twice + rate - 1) / rate;
    if secs == 0 {
        1
    } else {
        secs
    }
}
