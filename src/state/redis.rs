use std::fmt;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{Client, Script, Value};
use tracing::debug;

use crate::errors::{Error, StoreError};
use crate::limiter::storage_key;
use crate::script::{ScriptArgs, TOKEN_BUCKET_LUA};
use crate::state::BucketStore;
use crate::{clock, Quota, RateLimiter};

/// A bucket store on a Redis (or Redis-compatible) server.
///
/// Each decision is a single `EVALSHA` of [`TOKEN_BUCKET_LUA`], which Redis
/// runs without interleaving other commands. If the server doesn't know the
/// script yet (after a restart or failover), the call transparently falls
/// back to `EVAL`.
///
/// The store owns a [`ConnectionManager`], which reconnects on its own and is
/// cheap to clone: clones share the underlying multiplexed connection.
///
/// The script only uses `HMGET`, `HMSET` and `EXPIRE`, so any server that
/// speaks those and `EVALSHA` (Redis 2.6 and later, and most compatible
/// servers) can hold buckets.
#[derive(Clone)]
pub struct RedisStore {
    connection: ConnectionManager,
    script: Script,
}

impl RedisStore {
    /// How often a failed connection attempt is retried, both while
    /// connecting and when reconnecting later.
    pub const CONNECT_RETRIES: usize = 2;

    /// Base delay in milliseconds between connection attempts. Each retry
    /// waits a random time of up to `factor * 2^attempt` milliseconds.
    const RETRY_FACTOR_MS: u64 = 25;

    /// Connects to the server at `url` (e.g. `redis://127.0.0.1:6379/0`).
    ///
    /// An unreachable server is reported after [`CONNECT_RETRIES`] quick
    /// retries, well within a second.
    ///
    /// [`CONNECT_RETRIES`]: RedisStore::CONNECT_RETRIES
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        Self::connect_with_retries(url, Self::CONNECT_RETRIES).await
    }

    /// Connects to the server at `url`, retrying a failed connection attempt
    /// up to `retries` times with exponential backoff.
    pub async fn connect_with_retries(url: &str, retries: usize) -> Result<Self, StoreError> {
        let client = Client::open(url)?;
        let connection =
            ConnectionManager::new_with_backoff(client, 2, Self::RETRY_FACTOR_MS, retries).await?;
        Ok(Self::from_connection(connection))
    }

    /// Uses an already established connection.
    pub fn from_connection(connection: ConnectionManager) -> Self {
        RedisStore {
            connection,
            script: Script::new(TOKEN_BUCKET_LUA),
        }
    }

    /// The SHA1 digest the server knows the script by.
    pub fn script_hash(&self) -> &str {
        self.script.get_hash()
    }
}

/// # Rate limiters - Redis-backed
impl RateLimiter<RedisStore, clock::DefaultClock> {
    /// Connects to the Redis server at `url` and constructs a rate limiter
    /// for `identity` on it.
    ///
    /// Failing to connect is reported as [`Error::Connection`], just like a
    /// failed ping.
    pub async fn redis(url: &str, identity: &str, quota: Quota) -> Result<Self, Error> {
        match RedisStore::connect(url).await {
            Ok(store) => RateLimiter::new(store, identity, quota).await,
            Err(source) => Err(Error::Connection {
                key: storage_key(identity),
                source,
            }),
        }
    }
}

impl fmt::Debug for RedisStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisStore")
            .field("script", &self.script_hash())
            .finish()
    }
}

#[async_trait]
impl BucketStore for RedisStore {
    async fn ping(&self) -> Result<(), StoreError> {
        let mut connection = self.connection.clone();
        let _pong: String = redis::cmd("PING").query_async(&mut connection).await?;
        Ok(())
    }

    async fn prepare(&self) -> Result<(), StoreError> {
        let mut connection = self.connection.clone();
        let sha: String = redis::cmd("SCRIPT")
            .arg("LOAD")
            .arg(TOKEN_BUCKET_LUA)
            .query_async(&mut connection)
            .await?;
        debug!(%sha, "loaded token bucket script");
        Ok(())
    }

    async fn execute(&self, key: &str, args: &ScriptArgs) -> Result<i64, StoreError> {
        let mut connection = self.connection.clone();
        let mut invocation = self.script.key(key);
        for arg in args.argv() {
            invocation.arg(arg);
        }
        let reply: Value = invocation.invoke_async(&mut connection).await?;
        match reply {
            Value::Int(granted) => Ok(granted),
            other => Err(StoreError::UnexpectedReply(format!("{:?}", other))),
        }
    }
}
