use futures_timer::Delay;

use super::RateLimiter;
use crate::clock::Clock;
use crate::errors::Error;
use crate::state::BucketStore;
use crate::Jitter;

/// # Waiting for tokens
///
/// These methods repeatedly check the bucket and sleep for the estimated
/// refill time in between. They never give up on their own: to stop waiting,
/// drop the future (e.g. by racing it against a timeout).
impl<S, C> RateLimiter<S, C>
where
    S: BucketStore,
    C: Clock,
{
    /// Asynchronously resolves as soon as the rate limiter hands out a token.
    pub async fn until_ready(&self) -> Result<(), Error> {
        self.until_ready_with_jitter(Jitter::NONE).await
    }

    /// Asynchronously resolves as soon as the rate limiter hands out a token.
    ///
    /// Every sleep is extended by a sample of `jitter`, which spreads out
    /// callers that were denied at the same time.
    pub async fn until_ready_with_jitter(&self, jitter: Jitter) -> Result<(), Error> {
        self.until_n_ready_with_jitter(1, jitter).await
    }

    /// Asynchronously resolves as soon as the rate limiter hands out `n`
    /// tokens at once.
    ///
    /// Fails immediately with [`Error::InsufficientCapacity`] if `n` exceeds
    /// the bucket's capacity, since such a request can never be granted.
    pub async fn until_n_ready(&self, n: u32) -> Result<(), Error> {
        self.until_n_ready_with_jitter(n, Jitter::NONE).await
    }

    /// Asynchronously resolves as soon as the rate limiter hands out `n`
    /// tokens at once, extending each sleep by a sample of `jitter`.
    pub async fn until_n_ready_with_jitter(&self, n: u32, jitter: Jitter) -> Result<(), Error> {
        let capacity = self.quota.capacity();
        if n > capacity {
            self.quota.validate()?;
            return Err(Error::InsufficientCapacity(n, capacity));
        }
        loop {
            let delay = self.delay_n(n).await?;
            if delay.is_zero() {
                return Ok(());
            }
            Delay::new(jitter + delay).await;
        }
    }
}
