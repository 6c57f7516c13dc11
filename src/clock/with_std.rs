use super::Clock;

use crate::timestamp::Timestamp;
use std::time::{SystemTime, UNIX_EPOCH};

/// The non-monotonic clock implemented by [`SystemTime`].
///
/// Readings before the unix epoch (a badly misconfigured host) are reported
/// as the epoch itself.
#[derive(Clone, Debug, Default)]
pub struct SystemClock();

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        let since_epoch = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        Timestamp::from_secs(since_epoch.as_secs())
    }
}
