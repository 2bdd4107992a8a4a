//! Time-bounded caching of expiry lists.

use crate::chain::normalize_underlying;
use crate::error::DeskError;
use crate::source::ChainSource;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use std::hash::Hash;
use std::sync::Arc;
use tracing::debug;

/// Source of the current time.
pub trait Clock: Send + Sync {
    /// Returns the current time.
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    /// Creates a clock frozen at `now`.
    #[must_use]
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    /// Moves the clock forward.
    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock();
        *now += by;
    }

    /// Sets the clock.
    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock() = now;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}

impl<C: Clock + ?Sized> Clock for Arc<C> {
    fn now(&self) -> DateTime<Utc> {
        (**self).now()
    }
}

/// Concurrent map whose entries expire `ttl` after insertion.
#[derive(Debug)]
pub struct TtlCache<K, V, C = SystemClock>
where
    K: Eq + Hash,
{
    entries: DashMap<K, (V, DateTime<Utc>)>,
    ttl: Duration,
    clock: C,
}

impl<K, V> TtlCache<K, V, SystemClock>
where
    K: Eq + Hash,
    V: Clone,
{
    /// Creates a cache on the wall clock.
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self::with_clock(ttl, SystemClock)
    }
}

impl<K, V, C> TtlCache<K, V, C>
where
    K: Eq + Hash,
    V: Clone,
    C: Clock,
{
    /// Creates a cache on the given clock.
    #[must_use]
    pub fn with_clock(ttl: Duration, clock: C) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
            clock,
        }
    }

    /// Returns the cached value while it is younger than the TTL. Stale
    /// entries are evicted.
    pub fn get(&self, key: &K) -> Option<V> {
        let now = self.clock.now();
        let fresh = {
            let entry = self.entries.get(key)?;
            let (value, inserted_at) = entry.value();
            (now - *inserted_at < self.ttl).then(|| value.clone())
        };

        if fresh.is_none() {
            self.entries
                .remove_if(key, |_, (_, inserted_at)| now - *inserted_at >= self.ttl);
        }
        fresh
    }

    /// Inserts or replaces a value, stamping it with the current time.
    pub fn insert(&self, key: K, value: V) {
        self.entries.insert(key, (value, self.clock.now()));
    }

    /// Drops the entry for `key`.
    pub fn invalidate(&self, key: &K) {
        self.entries.remove(key);
    }

    /// Number of stored entries, stale ones included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drops all entries.
    pub fn clear(&self) {
        self.entries.clear();
    }
}

/// Expiry list lookup backed by a TTL cache.
pub struct ExpiryResolver<S, C = SystemClock> {
    source: Arc<S>,
    cache: TtlCache<String, Vec<String>, C>,
}

impl<S: ChainSource> ExpiryResolver<S, SystemClock> {
    /// Creates a resolver on the wall clock.
    #[must_use]
    pub fn new(source: Arc<S>, ttl: Duration) -> Self {
        Self::with_clock(source, ttl, SystemClock)
    }
}

impl<S: ChainSource, C: Clock> ExpiryResolver<S, C> {
    /// Creates a resolver on the given clock.
    #[must_use]
    pub fn with_clock(source: Arc<S>, ttl: Duration, clock: C) -> Self {
        Self {
            source,
            cache: TtlCache::with_clock(ttl, clock),
        }
    }

    /// Returns the expiries of an underlying, nearest first.
    ///
    /// # Errors
    ///
    /// Returns the source error when the list is not cached and the fetch
    /// fails.
    pub async fn expiries(&self, underlying: &str) -> Result<Vec<String>, DeskError> {
        let key = normalize_underlying(underlying);
        if let Some(expiries) = self.cache.get(&key) {
            return Ok(expiries);
        }

        let expiries = self.source.expiries(&key).await?;
        debug!("Fetched {} expiries for {}", expiries.len(), key);
        if !expiries.is_empty() {
            self.cache.insert(key, expiries.clone());
        }
        Ok(expiries)
    }

    /// Returns the nearest expiry, if any.
    ///
    /// # Errors
    ///
    /// Same as [`ExpiryResolver::expiries`].
    pub async fn nearest(&self, underlying: &str) -> Result<Option<String>, DeskError> {
        Ok(self.expiries(underlying).await?.into_iter().next())
    }

    /// Forgets the cached list of an underlying.
    pub fn invalidate(&self, underlying: &str) {
        self.cache.invalidate(&normalize_underlying(underlying));
    }
}
