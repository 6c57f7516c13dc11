//! # remote-governor - a token-bucket rate limiter for many processes
//!
//! This crate lets any number of independent processes share one rate limit
//! per named resource, without talking to each other. Each resource gets a
//! token bucket that lives in a shared store; every admission check is a
//! single atomic round trip in which the store refills the bucket for the
//! time that passed and takes the requested tokens out, if there are enough.
//!
//! A [`Quota`] of `qps` tokens per second gives a bucket that holds at most
//! `qps` tokens and regains `qps` tokens every second: at most one second's
//! worth of burst, and at most `qps` admissions per second on average.
//! A bucket that was never used starts out full.
//!
//! Two stores ship with this crate:
//! * [`RedisStore`](state::RedisStore) (feature `redis`, on by default)
//!   runs the check as a Lua script on a Redis-compatible server.
//! * [`InMemoryStore`](state::InMemoryStore) runs the same check under a
//!   per-key lock, for tests and for limiters that only need to coordinate
//!   within one process.
//!
//! Other stores can be plugged in by implementing
//! [`BucketStore`](state::BucketStore).
//!
//! # Example
//!
//! ```rust
//! use remote_governor::{state::InMemoryStore, Quota, RateLimiter};
//! # futures::executor::block_on(async {
//! let limiter = RateLimiter::new(InMemoryStore::new(), "api", Quota::per_second(2)).await?;
//! assert_eq!(limiter.key(), "api_token_limiter");
//! assert!(limiter.check().await?);
//! # Ok::<(), remote_governor::Error>(())
//! # }).unwrap();
//! ```
//!
//! # Failure handling
//!
//! A rate limiter never guesses: if the store can't be reached or the check
//! fails, the call returns an [`Error`] and nothing is admitted. See
//! [`Error::is_retryable`] for telling configuration mistakes apart from
//! transient store failures.

#![deny(missing_docs)]

pub mod clock;
mod config;
pub mod errors;
mod jitter;
mod limiter;
mod quota;
pub mod script;
pub mod state;
mod timestamp;

pub use config::LimiterConfig;
pub use errors::{Error, InvalidRate, StoreError};
pub use jitter::Jitter;
pub use limiter::{storage_key, RateLimiter, DEFAULT_KEY, KEY_SUFFIX};
pub use quota::Quota;
pub use timestamp::Timestamp;
