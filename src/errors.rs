//! Error types returned by rate limiters and bucket stores.

use thiserror::Error;

/// A boxed error from a bucket store's transport or driver.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Error indicating that a quota's rate (the argument) is not positive.
///
/// No bucket can ever be refilled at that rate, so this is a
/// configuration mistake rather than something worth retrying.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("rate of {0} tokens per second is non-positive")]
pub struct InvalidRate(pub u32);

/// Failures reported by a [`BucketStore`](crate::state::BucketStore).
#[derive(Debug, Error)]
pub enum StoreError {
    /// The store could not be reached, or rejected the command.
    #[error("bucket store transport failed: {0}")]
    Transport(#[source] BoxError),

    /// The store answered with something other than an integer token count.
    #[error("bucket store returned an unexpected reply: {0}")]
    UnexpectedReply(String),
}

impl StoreError {
    /// Wraps a backend error as a transport failure.
    pub fn transport(error: impl Into<BoxError>) -> Self {
        StoreError::Transport(error.into())
    }
}

#[cfg(feature = "redis")]
impl From<redis::RedisError> for StoreError {
    fn from(error: redis::RedisError) -> Self {
        StoreError::Transport(Box::new(error))
    }
}

/// Errors returned by a [`RateLimiter`](crate::RateLimiter).
///
/// None of these mean "allowed": callers must treat every error as a
/// negative decision for the current attempt.
#[derive(Debug, Error)]
pub enum Error {
    /// The limiter's quota has a non-positive rate. The store was not contacted.
    #[error(transparent)]
    InvalidRate(#[from] InvalidRate),

    /// The store could not be reached while constructing the limiter.
    #[error("could not reach the bucket store for `{key}`")]
    Connection {
        /// Namespaced storage key of the limiter being constructed.
        key: String,
        /// What the store reported.
        #[source]
        source: StoreError,
    },

    /// Running the refill-and-debit script failed in transit or inside the store.
    #[error("token bucket script for `{key}` failed")]
    Execution {
        /// Namespaced storage key of the limiter.
        key: String,
        /// What the store reported.
        #[source]
        source: StoreError,
    },

    /// The number of tokens waited for (the first field) is larger than the
    /// bucket's capacity (the second field), so waiting would never end.
    #[error("required number of tokens {0} exceeds bucket's capacity of {1}")]
    InsufficientCapacity(u32, u32),
}

impl Error {
    /// Whether repeating the failed operation could succeed without a
    /// configuration change.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Connection { .. } | Error::Execution { .. })
    }

    /// The storage key the error concerns, if the error came from the store.
    pub fn key(&self) -> Option<&str> {
        match self {
            Error::Connection { key, .. } | Error::Execution { key, .. } => Some(key),
            Error::InvalidRate(_) | Error::InsufficientCapacity(..) => None,
        }
    }
}
