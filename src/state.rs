//! State stores for rate limiters

use std::sync::Arc;

use async_trait::async_trait;

use crate::errors::StoreError;
use crate::script::ScriptArgs;

mod in_memory;
pub use in_memory::InMemoryStore;

#[cfg(feature = "redis")]
mod redis;
#[cfg(feature = "redis")]
pub use self::redis::RedisStore;

/// A place where rate limiters keep their buckets.
///
/// Bucket state never lives in the rate limiter itself: every decision is a
/// single round trip in which the store runs the refill-and-debit step (see
/// the [`script`](crate::script) module) against one key. Any number of
/// processes can share a store; what makes their decisions consistent is
/// that the store must linearize [`execute`](BucketStore::execute) calls on
/// the same key. Calls on different keys may run in any order.
///
/// Stores never apply half a step: either the new bucket state is stored and
/// the grant returned, or an error is returned and nothing changed.
#[async_trait]
pub trait BucketStore: Send + Sync {
    /// Checks that the store is reachable.
    async fn ping(&self) -> Result<(), StoreError>;

    /// Registers the refill-and-debit script with the store ahead of use.
    ///
    /// This is purely an optimization; stores must be able to execute the
    /// script without it. The default does nothing.
    async fn prepare(&self) -> Result<(), StoreError> {
        Ok(())
    }

    /// Runs the refill-and-debit step on `key`, returning the number of
    /// tokens granted.
    async fn execute(&self, key: &str, args: &ScriptArgs) -> Result<i64, StoreError>;
}

#[async_trait]
impl<T: BucketStore + ?Sized> BucketStore for Arc<T> {
    async fn ping(&self) -> Result<(), StoreError> {
        (**self).ping().await
    }

    async fn prepare(&self) -> Result<(), StoreError> {
        (**self).prepare().await
    }

    async fn execute(&self, key: &str, args: &ScriptArgs) -> Result<i64, StoreError> {
        (**self).execute(key, args).await
    }
}
