use async_trait::async_trait;
use futures::executor::block_on;
use remote_governor::{
    clock::{Clock, FakeRelativeClock},
    script::{BucketState, ScriptArgs},
    state::{BucketStore, InMemoryStore},
    Error, LimiterConfig, Quota, RateLimiter, StoreError, Timestamp,
};
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

fn limiter(qps: u32) -> (RateLimiter<InMemoryStore, FakeRelativeClock>, FakeRelativeClock) {
    let clock = FakeRelativeClock::starting_at(Timestamp::from_secs(1_000));
    let lim = block_on(RateLimiter::with_clock(
        InMemoryStore::new(),
        "",
        Quota::per_second(qps),
        clock.clone(),
    ))
    .unwrap();
    (lim, clock)
}

fn stored(lim: &RateLimiter<InMemoryStore, FakeRelativeClock>) -> Option<BucketState> {
    lim.store().peek(lim.key(), lim.clock().now())
}

/// A store that answers every script call with a fixed reply.
#[derive(Debug)]
struct FixedReply {
    reply: Result<i64, &'static str>,
    calls: AtomicUsize,
}

impl FixedReply {
    fn granting(granted: i64) -> Self {
        FixedReply {
            reply: Ok(granted),
            calls: AtomicUsize::new(0),
        }
    }

    fn failing(reason: &'static str) -> Self {
        FixedReply {
            reply: Err(reason),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl BucketStore for FixedReply {
    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn execute(&self, _key: &str, _args: &ScriptArgs) -> Result<i64, StoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.reply {
            Ok(granted) => Ok(granted),
            Err("garbage") => Err(StoreError::UnexpectedReply("Status(\"OK\")".to_string())),
            Err(reason) => Err(StoreError::transport(io::Error::new(
                io::ErrorKind::BrokenPipe,
                reason,
            ))),
        }
    }
}

/// A store that can't be reached.
#[derive(Debug, Default)]
struct Unreachable {
    executed: AtomicUsize,
}

#[async_trait]
impl BucketStore for Unreachable {
    async fn ping(&self) -> Result<(), StoreError> {
        Err(StoreError::transport(io::Error::new(
            io::ErrorKind::ConnectionRefused,
            "connection refused",
        )))
    }

    async fn execute(&self, _key: &str, _args: &ScriptArgs) -> Result<i64, StoreError> {
        self.executed.fetch_add(1, Ordering::SeqCst);
        Ok(0)
    }
}

#[test]
fn accepts_first_cell() {
    let (lb, _clock) = limiter(5);
    assert!(block_on(lb.check()).unwrap());
}

#[test]
fn fresh_bucket_grants_up_to_capacity() {
    for n in 1..=10 {
        let (lb, _clock) = limiter(10);
        assert!(block_on(lb.check_n(n)).unwrap(), "n = {}", n);
    }
}

#[test]
fn rejects_more_than_capacity() {
    let (lb, clock) = limiter(5);
    assert!(!block_on(lb.check_n(6)).unwrap());
    clock.advance(Duration::from_secs(20));
    assert!(!block_on(lb.check_n(6)).unwrap());
    // the bucket is still full:
    assert!(block_on(lb.check_n(5)).unwrap());
}

#[test]
fn rejects_too_many() {
    let (lb, clock) = limiter(2);
    let ms = Duration::from_millis(1);

    // use up our burst capacity (2 in the first second):
    assert!(block_on(lb.check()).unwrap(), "Now: {:?}", clock.now());
    clock.advance(ms);
    assert!(block_on(lb.check()).unwrap(), "Now: {:?}", clock.now());

    clock.advance(ms);
    assert!(!block_on(lb.check()).unwrap(), "Now: {:?}", clock.now());

    // should be ok again in 1s:
    clock.advance(ms * 1000);
    assert!(block_on(lb.check()).unwrap(), "Now: {:?}", clock.now());
    clock.advance(ms);
    assert!(block_on(lb.check()).unwrap());

    clock.advance(ms);
    assert!(!block_on(lb.check()).unwrap(), "{:?}", lb);
}

#[test]
fn never_oversubscribes_within_a_second() {
    let (lb, clock) = limiter(10);
    let mut granted = 0;
    for n in [3u32, 4, 2, 3, 1, 5, 1] {
        if block_on(lb.check_n(n)).unwrap() {
            granted += n;
        }
        clock.advance(Duration::from_millis(100));
    }
    assert_eq!(granted, 10);
    assert_eq!(stored(&lb).map(|s| s.stored_tokens), Some(0));
}

#[test]
fn denial_leaves_bucket_untouched() {
    let (lb, _clock) = limiter(4);
    assert!(block_on(lb.check_n(3)).unwrap());
    let before = stored(&lb);
    assert!(!block_on(lb.check_n(2)).unwrap());
    assert_eq!(stored(&lb), before);
    // the remaining token is still there:
    assert!(block_on(lb.check()).unwrap());
}

#[test]
fn refills_by_rate_up_to_capacity() {
    let (lb, clock) = limiter(10);
    assert!(block_on(lb.check_n(10)).unwrap());

    clock.advance(Duration::from_secs(1));
    assert!(block_on(lb.check_n(10)).unwrap());

    clock.advance(Duration::from_secs(5));
    assert!(!block_on(lb.check_n(11)).unwrap());
    assert_eq!(stored(&lb).map(|s| s.stored_tokens), Some(10));
}

#[test]
fn keys_are_independent() {
    let store = InMemoryStore::new();
    let clock = FakeRelativeClock::default();
    let a = block_on(RateLimiter::with_clock(
        store.clone(),
        "a",
        Quota::per_second(1),
        clock.clone(),
    ))
    .unwrap();
    let b = block_on(RateLimiter::with_clock(
        store.clone(),
        "b",
        Quota::per_second(1),
        clock.clone(),
    ))
    .unwrap();
    let a_again = block_on(RateLimiter::with_clock(
        store,
        "a",
        Quota::per_second(1),
        clock,
    ))
    .unwrap();

    assert!(block_on(a.check()).unwrap());
    assert!(!block_on(a_again.check()).unwrap());
    assert!(block_on(b.check()).unwrap());
}

#[test]
fn empty_identity_uses_default_key() {
    let (lb, _clock) = limiter(1);
    assert_eq!(lb.key(), "default_token_limiter");
    assert_eq!(lb.quota(), Quota::per_second(1));
}

#[test]
fn zero_rate_fails_without_contacting_store() {
    let store = Arc::new(FixedReply::granting(1));
    let lb = block_on(RateLimiter::new(store.clone(), "zero", Quota::per_second(0))).unwrap();

    let err = block_on(lb.check()).unwrap_err();
    assert!(matches!(err, Error::InvalidRate(_)), "{:?}", err);
    assert!(!err.is_retryable());
    assert!(matches!(block_on(lb.delay()), Err(Error::InvalidRate(_))));
    assert_eq!(store.calls.load(Ordering::SeqCst), 0);
}

#[test]
fn zero_tokens_are_always_granted() {
    let store = Arc::new(FixedReply::granting(0));
    let lb = block_on(RateLimiter::new(store.clone(), "", Quota::per_second(3))).unwrap();
    assert!(block_on(lb.check_n(0)).unwrap());
    assert_eq!(store.calls.load(Ordering::SeqCst), 0);
}

#[test]
fn partial_grant_is_denial() {
    let store = FixedReply::granting(2);
    let lb = block_on(RateLimiter::new(store, "", Quota::per_second(10))).unwrap();
    assert!(!block_on(lb.check_n(3)).unwrap());
    assert!(block_on(lb.check_n(2)).unwrap());
}

#[test]
fn store_failure_is_not_allowed() {
    let store = FixedReply::failing("broken pipe");
    let lb = block_on(RateLimiter::new(store, "uploads", Quota::per_second(10))).unwrap();

    match block_on(lb.check()) {
        Err(err @ Error::Execution { .. }) => {
            assert!(err.is_retryable());
            assert_eq!(err.key(), Some("uploads_token_limiter"));
        }
        other => panic!("expected an execution error, got {:?}", other),
    }
    assert!(matches!(block_on(lb.delay()), Err(Error::Execution { .. })));
}

#[test]
fn unexpected_reply_is_an_error() {
    let store = FixedReply::failing("garbage");
    let lb = block_on(RateLimiter::new(store, "", Quota::per_second(10))).unwrap();
    match block_on(lb.check()) {
        Err(Error::Execution {
            source: StoreError::UnexpectedReply(_),
            ..
        }) => {}
        other => panic!("expected an unexpected-reply error, got {:?}", other),
    }
}

#[test]
fn unreachable_store_fails_construction() {
    let store = Arc::new(Unreachable::default());
    let result = block_on(RateLimiter::new(store.clone(), "api", Quota::per_second(10)));
    match result {
        Err(Error::Connection { key, source }) => {
            assert_eq!(key, "api_token_limiter");
            assert!(format!("{}", source).contains("refused"));
        }
        Err(other) => panic!("expected a connection error, got {:?}", other),
        Ok(_) => panic!("constructed a limiter against an unreachable store"),
    }
    assert_eq!(store.executed.load(Ordering::SeqCst), 0);
}

#[test]
fn delay_is_zero_when_granted() {
    let (lb, _clock) = limiter(10);
    assert_eq!(block_on(lb.delay()).unwrap(), Duration::ZERO);
}

#[test]
fn delay_estimates_refill_time() {
    let (lb, _clock) = limiter(10);
    assert!(block_on(lb.check_n(10)).unwrap());

    let delay = block_on(lb.delay()).unwrap();
    assert!(delay > Duration::ZERO);
    assert!(delay <= Duration::from_millis(100));
    assert_eq!(block_on(lb.delay_n(5)).unwrap(), Duration::from_millis(500));
}

#[test]
fn constructs_from_config() {
    let config = LimiterConfig {
        key: "reports".to_string(),
        qps: 3,
    };
    let lb = block_on(RateLimiter::from_config(InMemoryStore::new(), &config)).unwrap();
    assert_eq!(lb.key(), "reports_token_limiter");
    assert_eq!(lb.quota().capacity(), 3);
}
