use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use log::debug;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const API_WINDOW: Duration = Duration::from_secs(60);
pub const API_MAX_REQUESTS: u32 = 20;
pub const CLEANUP_THRESHOLD: usize = 1000;

pub const RATE_LIMIT_ERROR: &str = "Too many requests. Please try again later.";
pub const RATE_LIMIT_REMAINING_HEADER: &str = "x-ratelimit-remaining";

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    pub window: Duration,
    pub max_requests: u32,
    /// Expired records are swept once the store grows past this many keys.
    pub cleanup_threshold: usize,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            window: API_WINDOW,
            max_requests: API_MAX_REQUESTS,
            cleanup_threshold: CLEANUP_THRESHOLD,
        }
    }
}

impl RateLimitConfig {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            window,
            max_requests,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitRecord {
    pub count: u32,
    pub window_reset_at: Instant,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub remaining: u32,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct RateLimitError {
    pub message: &'static str,
    pub remaining: u32,
}

impl RateLimitDecision {
    /// Remaining quota when admitted.
    pub fn into_result(self) -> Result<u32, RateLimitError> {
        if self.allowed {
            Ok(self.remaining)
        } else {
            Err(RateLimitError {
                message: RATE_LIMIT_ERROR,
                remaining: self.remaining,
            })
        }
    }
}

/// Backing storage for per-key records. The limiter serializes all access,
/// so implementations need no locking of their own.
pub trait RateLimitStore: Send {
    fn get_mut(&mut self, key: &str) -> Option<&mut RateLimitRecord>;
    fn insert(&mut self, key: &str, record: RateLimitRecord);
    fn len(&self) -> usize;
    fn retain(&mut self, keep: &mut dyn FnMut(&RateLimitRecord) -> bool);

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl RateLimitStore for HashMap<String, RateLimitRecord> {
    fn get_mut(&mut self, key: &str) -> Option<&mut RateLimitRecord> {
        HashMap::get_mut(self, key)
    }

    fn insert(&mut self, key: &str, record: RateLimitRecord) {
        HashMap::insert(self, key.to_owned(), record);
    }

    fn len(&self) -> usize {
        HashMap::len(self)
    }

    fn retain(&mut self, keep: &mut dyn FnMut(&RateLimitRecord) -> bool) {
        HashMap::retain(self, |_, record| keep(record));
    }
}

pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

impl<C: Clock + ?Sized> Clock for Arc<C> {
    fn now(&self) -> Instant {
        (**self).now()
    }
}

/// Fixed-window request counter keyed by client.
pub struct RateLimiter<S = HashMap<String, RateLimitRecord>, C = SystemClock> {
    config: RateLimitConfig,
    store: Mutex<S>,
    clock: C,
}

impl RateLimiter {
    pub fn in_memory(config: RateLimitConfig) -> Self {
        Self::new(config, HashMap::new(), SystemClock)
    }
}

impl<S: RateLimitStore, C: Clock> RateLimiter<S, C> {
    pub fn new(config: RateLimitConfig, store: S, clock: C) -> Self {
        Self {
            config,
            store: Mutex::new(store),
            clock,
        }
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Admits or rejects one request for `key`.
    ///
    /// The whole read-modify-write runs under the store lock, so concurrent
    /// callers can never push a key past `max_requests`.
    pub fn check(&self, key: &str) -> RateLimitDecision {
        let now = self.clock.now();
        // A poisoned lock still holds consistent counters
        let mut store = self.store.lock().unwrap_or_else(PoisonError::into_inner);

        if store.len() > self.config.cleanup_threshold {
            let before = store.len();
            store.retain(&mut |record| record.window_reset_at >= now);
            debug!("rate limiter swept {} expired keys", before - store.len());
        }

        let max = self.config.max_requests;
        if let Some(record) = store.get_mut(key) {
            if record.window_reset_at > now {
                if record.count >= max {
                    return RateLimitDecision {
                        allowed: false,
                        remaining: 0,
                    };
                }
                record.count += 1;
                return RateLimitDecision {
                    allowed: true,
                    remaining: max - record.count,
                };
            }
        }

        store.insert(
            key,
            RateLimitRecord {
                count: 1,
                window_reset_at: now + self.config.window,
            },
        );
        RateLimitDecision {
            allowed: true,
            remaining: max.saturating_sub(1),
        }
    }

    pub fn tracked_keys(&self) -> usize {
        self.store.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};

    /// Clock that only moves when told to.
    #[derive(Debug)]
    struct ManualClock {
        origin: Instant,
        elapsed_ms: AtomicU64,
    }

    impl ManualClock {
        fn new() -> Self {
            Self {
                origin: Instant::now(),
                elapsed_ms: AtomicU64::new(0),
            }
        }

        fn advance(&self, by: Duration) {
            self.elapsed_ms.fetch_add(by.as_millis() as u64, Ordering::SeqCst);
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> Instant {
            self.origin + Duration::from_millis(self.elapsed_ms.load(Ordering::SeqCst))
        }
    }

    fn limiter_with_clock() -> (RateLimiter<HashMap<String, RateLimitRecord>, Arc<ManualClock>>, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new());
        let limiter = RateLimiter::new(RateLimitConfig::default(), HashMap::new(), clock.clone());
        (limiter, clock)
    }

    #[test]
    fn test_window_boundary() {
        let (limiter, clock) = limiter_with_clock();

        for expected in (0..20).rev() {
            let decision = limiter.check("10.0.0.1");
            assert!(decision.allowed);
            assert_eq!(decision.remaining, expected);
            clock.advance(Duration::from_millis(100));
        }

        let denied = limiter.check("10.0.0.1");
        assert_eq!(denied, RateLimitDecision { allowed: false, remaining: 0 });
        let err = denied.into_result().unwrap_err();
        assert_eq!(err.to_string(), RATE_LIMIT_ERROR);
        assert_eq!(err.remaining, 0);

        clock.advance(API_WINDOW);
        let reset = limiter.check("10.0.0.1");
        assert_eq!(reset, RateLimitDecision { allowed: true, remaining: 19 });
    }

    #[test]
    fn test_window_resets_exactly_at_deadline() {
        let (limiter, clock) = limiter_with_clock();
        for _ in 0..20 {
            limiter.check("k");
        }
        assert!(!limiter.check("k").allowed);
        clock.advance(API_WINDOW);
        assert_eq!(limiter.check("k").remaining, 19);
    }

    #[test]
    fn test_denied_requests_do_not_extend_count() {
        let (limiter, _clock) = limiter_with_clock();
        for _ in 0..25 {
            limiter.check("k");
        }
        let store = limiter.store.lock().unwrap();
        assert_eq!(store.get("k").map(|r| r.count), Some(20));
    }

    #[test]
    fn test_keys_are_isolated() {
        let (limiter, _clock) = limiter_with_clock();
        for _ in 0..20 {
            limiter.check("a");
        }
        assert!(!limiter.check("a").allowed);
        assert_eq!(limiter.check("b"), RateLimitDecision { allowed: true, remaining: 19 });
        assert!(!limiter.check("a").allowed);
    }

    #[test]
    fn test_cleanup_keeps_live_windows() {
        let clock = Arc::new(ManualClock::new());
        let config = RateLimitConfig {
            cleanup_threshold: 3,
            ..RateLimitConfig::default()
        };
        let limiter = RateLimiter::new(config, HashMap::new(), clock.clone());

        for key in ["old-1", "old-2"] {
            limiter.check(key);
        }
        clock.advance(API_WINDOW + Duration::from_millis(1));
        for key in ["live-1", "live-2"] {
            limiter.check(key);
        }
        assert_eq!(limiter.tracked_keys(), 4);

        // Store is above the threshold: expired keys go, live ones stay
        limiter.check("live-1");
        assert_eq!(limiter.tracked_keys(), 2);
        assert_eq!(limiter.check("live-2").remaining, 18);
    }

    #[test]
    fn test_record_expiring_now_survives_sweep_then_resets() {
        let clock = Arc::new(ManualClock::new());
        let config = RateLimitConfig {
            window: Duration::from_secs(10),
            max_requests: 20,
            cleanup_threshold: 2,
        };
        let limiter = RateLimiter::new(config, HashMap::new(), clock.clone());

        for _ in 0..3 {
            limiter.check("edge");
        }
        clock.advance(Duration::from_secs(5));
        limiter.check("later-1");
        limiter.check("later-2");

        // now == reset time of "edge": the sweep keeps it
        clock.advance(Duration::from_secs(5));
        limiter.check("trigger");
        assert_eq!(limiter.tracked_keys(), 4);

        // and its next check opens a fresh window
        assert_eq!(
            limiter.check("edge"),
            RateLimitDecision { allowed: true, remaining: 19 }
        );

        // strictly past their reset time, the later keys are swept
        clock.advance(Duration::from_millis(5001));
        limiter.check("trigger");
        assert_eq!(limiter.tracked_keys(), 2);
    }

    #[test]
    fn test_cleanup_when_nothing_expired() {
        let clock = Arc::new(ManualClock::new());
        let config = RateLimitConfig {
            cleanup_threshold: 0,
            ..RateLimitConfig::default()
        };
        let limiter = RateLimiter::new(config, HashMap::new(), clock);
        for i in 0..10 {
            limiter.check(&format!("client-{}", i));
        }
        assert_eq!(limiter.tracked_keys(), 10);
    }

    #[test]
    fn test_cleanup_on_empty_store() {
        let config = RateLimitConfig {
            cleanup_threshold: 0,
            ..RateLimitConfig::default()
        };
        let mut store: HashMap<String, RateLimitRecord> = HashMap::new();
        let now = Instant::now();
        RateLimitStore::retain(&mut store, &mut |record| record.window_reset_at >= now);
        assert!(RateLimitStore::is_empty(&store));

        let limiter = RateLimiter::new(config, store, SystemClock);
        assert!(limiter.check("first").allowed);
    }

    #[test]
    fn test_concurrent_checks_never_exceed_cap() {
        let limiter = RateLimiter::in_memory(RateLimitConfig::default());
        let admitted = AtomicU64::new(0);

        std::thread::scope(|scope| {
            for _ in 0..64 {
                scope.spawn(|| {
                    if limiter.check("shared-ip").allowed {
                        admitted.fetch_add(1, Ordering::SeqCst);
                    }
                });
            }
        });

        assert_eq!(admitted.load(Ordering::SeqCst), API_MAX_REQUESTS as u64);
    }
}
