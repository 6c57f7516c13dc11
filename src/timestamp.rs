use std::fmt;
use std::time::Duration;

/// A point in wall-clock time, in whole seconds since the unix epoch.
///
/// Bucket state is shared between processes that only agree on wall-clock
/// time, so this is the only time unit that crosses the wire. Sub-second
/// precision is deliberately discarded.
#[derive(PartialEq, Eq, Default, Debug, Clone, Copy, PartialOrd, Ord, Hash)]
pub struct Timestamp(u64);

impl Timestamp {
    /// The unix epoch.
    pub const EPOCH: Timestamp = Timestamp(0);

    /// Constructs a timestamp from a number of seconds since the unix epoch.
    pub const fn from_secs(secs: u64) -> Timestamp {
        Timestamp(secs)
    }

    /// Seconds since the unix epoch.
    pub const fn as_secs(self) -> u64 {
        self.0
    }

    /// Whole seconds between `earlier` and `self`.
    ///
    /// Returns zero if `earlier` is actually later than `self` (e.g. when
    /// two hosts' clocks disagree).
    pub const fn saturating_since(self, earlier: Timestamp) -> u64 {
        self.0.saturating_sub(earlier.0)
    }

    /// Returns the timestamp `duration` later, truncated to whole seconds.
    pub const fn saturating_add(self, duration: Duration) -> Timestamp {
        Timestamp(self.0.saturating_add(duration.as_secs()))
    }
}

impl From<u64> for Timestamp {
    fn from(secs: u64) -> Self {
        Timestamp(secs)
    }
}

impl From<Timestamp> for u64 {
    fn from(ts: Timestamp) -> Self {
        ts.0
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}s", self.0)
    }
}
