use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;

use crate::errors::StoreError;
use crate::script::{BucketState, ScriptArgs};
use crate::state::BucketStore;
use crate::timestamp::Timestamp;

/// A bucket and the second at which it expires.
#[derive(Debug, Default)]
struct Slot(Option<(BucketState, Timestamp)>);

impl Slot {
    fn live_at(&self, now: Timestamp) -> Option<BucketState> {
        self.0
            .filter(|(_, expires_at)| now < *expires_at)
            .map(|(state, _)| state)
    }

    fn refill_and_debit(&mut self, args: &ScriptArgs) -> u32 {
        let (state, granted) = BucketState::refill_and_debit(self.live_at(args.now), args);
        self.0 = Some((state, args.expires_at()));
        granted
    }
}

/// An in-process bucket store backed by a [`DashMap`].
///
/// The refill-and-debit step runs while holding the map's lock for the key,
/// which serializes decisions on one bucket the same way a scripting server
/// does. Clones share the same buckets, so a single store can back any number
/// of rate limiters within one process.
///
/// Buckets expire like they would in a remote store: a bucket that has been
/// idle for longer than its quota's [idle expiry](crate::Quota::idle_expiry)
/// is treated as missing (and therefore full) on its next use.
/// Expired buckets are only dropped from memory by
/// [`retain_recent`](InMemoryStore::retain_recent).
#[derive(Clone, Default)]
pub struct InMemoryStore {
    buckets: Arc<DashMap<String, Slot>>,
}

impl InMemoryStore {
    /// Constructs an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the bucket stored at `key` as of `now`, without touching it.
    pub fn peek(&self, key: &str, now: Timestamp) -> Option<BucketState> {
        self.buckets.get(key).and_then(|slot| slot.live_at(now))
    }

    /// Drops every bucket that has expired as of `now`.
    pub fn retain_recent(&self, now: Timestamp) {
        self.buckets.retain(|_, slot| slot.live_at(now).is_some());
    }

    /// Shrinks the capacity of the store's map as much as possible.
    pub fn shrink_to_fit(&self) {
        self.buckets.shrink_to_fit();
    }

    /// The number of buckets held in memory, expired or not.
    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    /// Whether the store holds no buckets at all.
    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    pub(crate) fn refill_and_debit(&self, key: &str, args: &ScriptArgs) -> u32 {
        if let Some(mut slot) = self.buckets.get_mut(key) {
            // fast path: the bucket exists
            return slot.refill_and_debit(args);
        }
        // make an entry and measure that:
        let mut slot = self.buckets.entry(key.to_owned()).or_default();
        slot.refill_and_debit(args)
    }
}

impl fmt::Debug for InMemoryStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InMemoryStore")
            .field("buckets", &self.buckets.len())
            .finish()
    }
}

#[async_trait]
impl BucketStore for InMemoryStore {
    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn execute(&self, key: &str, args: &ScriptArgs) -> Result<i64, StoreError> {
        Ok(i64::from(self.refill_and_debit(key, args)))
    }
}
