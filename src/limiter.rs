use std::time::Duration;

use tracing::{debug, trace, warn};

use crate::clock::{self, Clock};
use crate::config::LimiterConfig;
use crate::errors::Error;
use crate::script::ScriptArgs;
use crate::state::BucketStore;
use crate::Quota;

/// Identity used when a rate limiter is constructed with an empty key.
pub const DEFAULT_KEY: &str = "default";

/// Suffix appended to every identity to form its storage key.
pub const KEY_SUFFIX: &str = "_token_limiter";

/// Maps a limiter identity to the key its bucket is stored under.
///
/// ```rust
/// # use remote_governor::storage_key;
/// assert_eq!(storage_key(""), "default_token_limiter");
/// assert_eq!(storage_key("api"), "api_token_limiter");
/// ```
pub fn storage_key(identity: &str) -> String {
    let identity = if identity.is_empty() {
        DEFAULT_KEY
    } else {
        identity
    };
    format!("{}{}", identity, KEY_SUFFIX)
}

/// A token-bucket rate limiter whose bucket lives in a shared store.
///
/// Every process that constructs a `RateLimiter` with the same key against the
/// same store draws from the same bucket. The limiter itself holds no mutable
/// state and takes no locks: each check is one atomic round trip to the
/// store, so a single limiter can be shared (e.g. in an [`Arc`](std::sync::Arc))
/// between any number of threads and tasks.
///
/// Time is measured in whole wall-clock seconds. Within one second, a bucket
/// only ever shrinks; tokens come back when the second rolls over.
#[derive(Debug)]
pub struct RateLimiter<S, C = clock::DefaultClock>
where
    S: BucketStore,
    C: Clock,
{
    store: S,
    key: String,
    quota: Quota,
    clock: C,
}

/// # Constructors
impl<S> RateLimiter<S, clock::DefaultClock>
where
    S: BucketStore,
{
    /// Constructs a rate limiter for `identity` on `store`, reading the
    /// system's wall clock.
    ///
    /// The store is pinged before this returns; an unreachable store is
    /// reported as [`Error::Connection`] rather than on the first check.
    pub async fn new(store: S, identity: &str, quota: Quota) -> Result<Self, Error> {
        Self::with_clock(store, identity, quota, clock::DefaultClock::default()).await
    }

    /// Constructs a rate limiter from a deserialized [`LimiterConfig`].
    pub async fn from_config(store: S, config: &LimiterConfig) -> Result<Self, Error> {
        Self::new(store, &config.key, config.quota()).await
    }
}

impl<S, C> RateLimiter<S, C>
where
    S: BucketStore,
    C: Clock,
{
    /// Constructs a rate limiter with a custom clock.
    pub async fn with_clock(store: S, identity: &str, quota: Quota, clock: C) -> Result<Self, Error> {
        let key = storage_key(identity);
        if let Err(source) = store.ping().await {
            warn!(%key, error = %source, "bucket store is unreachable");
            return Err(Error::Connection { key, source });
        }
        if let Err(error) = store.prepare().await {
            // Execution submits the script itself when it isn't registered.
            warn!(%key, %error, "could not preload token bucket script");
        }
        debug!(%key, qps = quota.qps(), "constructed rate limiter");
        Ok(RateLimiter {
            store,
            key,
            quota,
            clock,
        })
    }

    /// The namespaced key the limiter's bucket is stored under.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// The limiter's quota.
    pub fn quota(&self) -> Quota {
        self.quota
    }

    /// The store holding the limiter's bucket.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// The clock the limiter reads.
    pub fn clock(&self) -> &C {
        &self.clock
    }
}

/// # Checking tokens
impl<S, C> RateLimiter<S, C>
where
    S: BucketStore,
    C: Clock,
{
    /// Takes a single token, if one is available.
    ///
    /// See [`check_n`](RateLimiter::check_n).
    pub async fn check(&self) -> Result<bool, Error> {
        self.check_n(1).await
    }

    /// Takes `n` tokens if *all* of them are available right now.
    ///
    /// Returns `Ok(true)` if the tokens were taken and `Ok(false)` if the
    /// bucket doesn't hold enough; a bucket never hands out part of a
    /// request. Requesting more than the quota's capacity is never granted.
    ///
    /// Fails with [`Error::InvalidRate`] (without contacting the store) if
    /// the quota's rate is zero, and with [`Error::Execution`] if the store
    /// could not run the check. Callers must treat both as a denial.
    pub async fn check_n(&self, n: u32) -> Result<bool, Error> {
        self.quota.validate()?;
        if n == 0 {
            return Ok(true);
        }

        let args = ScriptArgs::new(n, &self.quota, self.clock.now());
        let granted = match self.store.execute(&self.key, &args).await {
            Ok(granted) => granted,
            Err(source) => {
                warn!(key = %self.key, n, error = %source, "token bucket script failed");
                return Err(Error::Execution {
                    key: self.key.clone(),
                    source,
                });
            }
        };

        // Anything short of the full request is a denial: there is no way
        // to hand back a partial grant.
        let allowed = granted == i64::from(n);
        trace!(key = %self.key, n, granted, allowed, now = %args.now, "checked token bucket");
        Ok(allowed)
    }

    /// Takes a single token, or estimates how long to wait for one.
    ///
    /// See [`delay_n`](RateLimiter::delay_n).
    pub async fn delay(&self) -> Result<Duration, Error> {
        self.delay_n(1).await
    }

    /// Takes `n` tokens and returns the zero duration, or returns the
    /// time it takes to refill `n` tokens (`n / qps` seconds) if they are
    /// not available.
    ///
    /// The returned duration is an estimate: other callers may drain the
    /// bucket in the meantime, so after waiting, check again. The
    /// [`until_n_ready`](RateLimiter::until_n_ready) family does exactly
    /// that.
    pub async fn delay_n(&self, n: u32) -> Result<Duration, Error> {
        if self.check_n(n).await? {
            Ok(Duration::ZERO)
        } else {
            Ok(self.quota.delay_for(n))
        }
    }
}

mod future;
