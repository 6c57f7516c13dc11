//! The refill-and-debit step executed atomically inside a bucket store.
//!
//! Stores that can run server-side scripts (Redis and compatible servers) are
//! handed [`TOKEN_BUCKET_LUA`]. Stores that can't run the equivalent
//! [`BucketState::refill_and_debit`] while holding the key's lock. Both
//! compute exactly the same thing:
//!
//! 1. Load the bucket; a missing bucket is full and was last refilled `now`.
//! 2. Add `elapsed_seconds * refill_rate` tokens, capped at `capacity`.
//!    Elapsed time is clamped at zero, so callers with lagging clocks never
//!    shrink a bucket.
//! 3. If the bucket holds at least `need` tokens, remove them and grant
//!    `need`; otherwise grant nothing and leave the tokens alone.
//! 4. Store the new token count with `now` as the refill time, and
//!    (re-)arm the bucket's idle expiry.

use std::time::Duration;

use crate::quota::{expiry_secs, Quota};
use crate::timestamp::Timestamp;

/// Lua source of the refill-and-debit script.
///
/// `KEYS[1]` is the bucket's storage key. `ARGV` holds, in this order, the
/// requested tokens, the capacity, the refill rate per second and the current
/// unix second (see [`ScriptArgs::argv`]). Returns the number of tokens granted.
///
/// The bucket is a hash with the fields `last_ts` and `stored_tokens`.
pub const TOKEN_BUCKET_LUA: &str = r#"
local need = tonumber(ARGV[1])
local capacity = tonumber(ARGV[2])
local rate = tonumber(ARGV[3])
local now = tonumber(ARGV[4])

local last_ts = now
local stored = capacity
local bucket = redis.call('HMGET', KEYS[1], 'last_ts', 'stored_tokens')
if bucket[1] and bucket[2] then
    last_ts = tonumber(bucket[1])
    stored = tonumber(bucket[2])
end

local elapsed = math.max(now - last_ts, 0)
stored = math.min(stored + elapsed * rate, capacity)

local granted = 0
if stored >= need then
    stored = stored - need
    granted = need
end

redis.call('HMSET', KEYS[1], 'last_ts', now, 'stored_tokens', stored)
redis.call('EXPIRE', KEYS[1], math.max(math.ceil(2 * capacity / rate), 1))

return granted
"#;

/// Arguments of one refill-and-debit invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScriptArgs {
    /// Tokens requested.
    pub need: u32,
    /// Maximum tokens the bucket may hold.
    pub capacity: u32,
    /// Tokens added per elapsed second.
    pub refill_rate: u32,
    /// The caller's current wall-clock second.
    pub now: Timestamp,
}

impl ScriptArgs {
    /// Arguments requesting `need` tokens from a bucket governed by `quota`.
    pub const fn new(need: u32, quota: &Quota, now: Timestamp) -> Self {
        ScriptArgs {
            need,
            capacity: quota.capacity(),
            refill_rate: quota.refill_rate(),
            now,
        }
    }

    /// The script's `ARGV`: `[need, capacity, refill_rate, now]`.
    pub fn argv(&self) -> [u64; 4] {
        [
            u64::from(self.need),
            u64::from(self.capacity),
            u64::from(self.refill_rate),
            self.now.as_secs(),
        ]
    }

    /// How long the bucket outlives its last access.
    pub const fn idle_expiry(&self) -> Duration {
        Duration::from_secs(expiry_secs(self.capacity, self.refill_rate))
    }

    /// The second at which a bucket written by this invocation expires.
    pub const fn expires_at(&self) -> Timestamp {
        self.now.saturating_add(self.idle_expiry())
    }
}

/// One bucket's persisted state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BucketState {
    /// When the token count was last brought up to date.
    pub last_refill: Timestamp,
    /// Tokens currently available.
    pub stored_tokens: u64,
}

impl BucketState {
    /// A full bucket as of `args.now`.
    pub const fn full(args: &ScriptArgs) -> Self {
        BucketState {
            last_refill: args.now,
            stored_tokens: args.capacity as u64,
        }
    }

    /// Runs the refill-and-debit step against `prev` (`None` if the bucket
    /// doesn't exist yet). Returns the state to persist and the number of
    /// tokens granted, which is either `args.need` or zero.
    ///
    /// Callers must run this under whatever lock serializes access to the
    /// bucket's key.
    pub fn refill_and_debit(prev: Option<BucketState>, args: &ScriptArgs) -> (BucketState, u32) {
        let prev = prev.unwrap_or_else(|| BucketState::full(args));
        let elapsed = args.now.saturating_since(prev.last_refill);
        let refilled = prev
            .stored_tokens
            .saturating_add(elapsed.saturating_mul(u64::from(args.refill_rate)))
            .min(u64::from(args.capacity));

        let need = u64::from(args.need);
        let (stored_tokens, granted) = if refilled >= need {
            (refilled - need, args.need)
        } else {
            (refilled, 0)
        };
        (
            BucketState {
                last_refill: args.now,
                stored_tokens,
            },
            granted,
        )
    }
}
