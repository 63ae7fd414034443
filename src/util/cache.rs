use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Clock abstraction so TTL expiry can be tested without sleeping.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A cached snapshot and the instant it was fetched.
pub struct CachedValue<T> {
    pub data: T,
    pub fetched_at: DateTime<Utc>,
}

/// Single-slot TTL cache. Holds one value at a time; `get` returns `None`
/// once the value is older than the TTL, and the caller re-fetches and
/// `put`s a fresh copy. Safe to discard and rebuild at any time.
pub struct TtlCache<T> {
    slot: RwLock<Option<CachedValue<T>>>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl<T: Clone> TtlCache<T> {
    pub fn new(ttl_secs: u64, clock: Arc<dyn Clock>) -> Self {
        Self {
            slot: RwLock::new(None),
            ttl: Duration::seconds(ttl_secs as i64),
            clock,
        }
    }

    /// Returns the cached value if present and fresh.
    pub async fn get(&self) -> Option<T> {
        let slot = self.slot.read().await;
        match slot.as_ref() {
            Some(cached) if self.clock.now() - cached.fetched_at < self.ttl => {
                Some(cached.data.clone())
            }
            _ => None,
        }
    }

    pub async fn put(&self, data: T) {
        let mut slot = self.slot.write().await;
        *slot = Some(CachedValue {
            data,
            fetched_at: self.clock.now(),
        });
    }

    pub async fn invalidate(&self) {
        let mut slot = self.slot.write().await;
        *slot = None;
    }
}

#[cfg(test)]
pub mod testing {
    use super::*;
    use std::sync::Mutex;

    /// Manually advanced clock for cache tests.
    pub struct ManualClock {
        now: Mutex<DateTime<Utc>>,
    }

    impl ManualClock {
        pub fn new(start: DateTime<Utc>) -> Self {
            Self {
                now: Mutex::new(start),
            }
        }

        pub fn advance_secs(&self, secs: i64) {
            let mut now = self.now.lock().unwrap();
            *now += Duration::seconds(secs);
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> DateTime<Utc> {
            *self.now.lock().unwrap()
        }
    }
}
