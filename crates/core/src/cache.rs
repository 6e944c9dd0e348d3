use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::clock::{Clock, SystemClock};
use crate::models::quote::{Quote, QuoteMetrics};

/// Cache namespaces. Each symbol can have one entry per namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheNamespace {
    /// Price only (`f64`)
    Price,
    /// P/E, earnings and market cap
    Metrics,
    /// Complete quote
    Full,
}

impl CacheNamespace {
    pub fn prefix(&self) -> &'static str {
        match self {
            CacheNamespace::Price => "price",
            CacheNamespace::Metrics => "metrics",
            CacheNamespace::Full => "full",
        }
    }

    /// Build the cache key for a symbol in this namespace, e.g. `full:TCS`.
    pub fn key(&self, symbol: &str) -> String {
        format!("{}:{}", self.prefix(), symbol)
    }
}

/// A value stored in the quote cache.
#[derive(Debug, Clone, PartialEq)]
pub enum CachedValue {
    Price(f64),
    Metrics(QuoteMetrics),
    Quote(Quote),
    /// Generated quote cached after an upstream failure. Served on fresh
    /// reads like a real quote, but never used as a stale fallback.
    Mock(Quote),
}

impl CachedValue {
    pub fn as_price(&self) -> Option<f64> {
        match self {
            CachedValue::Price(p) => Some(*p),
            _ => None,
        }
    }

    pub fn as_metrics(&self) -> Option<QuoteMetrics> {
        match self {
            CachedValue::Metrics(m) => Some(*m),
            _ => None,
        }
    }

    pub fn into_quote(self) -> Option<Quote> {
        match self {
            CachedValue::Quote(q) | CachedValue::Mock(q) => Some(q),
            _ => None,
        }
    }

    pub fn is_mock(&self) -> bool {
        matches!(self, CachedValue::Mock(_))
    }
}

#[derive(Debug, Clone)]
struct CacheEntry {
    value: CachedValue,
    /// `None` when the TTL is too large to represent; such entries never expire.
    expires_at: Option<DateTime<Utc>>,
}

impl CacheEntry {
    fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map_or(true, |at| now < at)
    }
}

/// In-memory key/value store with a TTL per entry.
///
/// - `get` treats expired entries as absent.
/// - `get_stale` ignores expiry; it exists for the upstream-failure path only.
/// - Expired entries stay in the map until overwritten, deleted, or
///   `prune_expired` is called, which is what makes stale reads possible.
///
/// There is no size bound: keys are bounded by the portfolio's symbol count
/// times the number of namespaces.
pub struct QuoteCache {
    entries: Mutex<HashMap<String, CacheEntry>>,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for QuoteCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QuoteCache")
            .field("entries", &self.len())
            .finish()
    }
}

impl QuoteCache {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            clock,
        }
    }

    /// Get a fresh value. Returns None if missing or expired.
    pub fn get(&self, key: &str) -> Option<CachedValue> {
        let now = self.clock.now();
        let entries = self.lock();
        entries
            .get(key)
            .filter(|e| e.is_fresh(now))
            .map(|e| e.value.clone())
    }

    /// Get the last stored value regardless of expiry.
    pub fn get_stale(&self, key: &str) -> Option<CachedValue> {
        self.lock().get(key).map(|e| e.value.clone())
    }

    /// Insert or replace a value that expires `ttl` from now.
    pub fn set(&self, key: impl Into<String>, value: CachedValue, ttl: Duration) {
        let now = self.clock.now();
        let expires_at = chrono::Duration::from_std(ttl)
            .ok()
            .and_then(|d| now.checked_add_signed(d));
        self.lock()
            .insert(key.into(), CacheEntry { value, expires_at });
    }

    /// Remove a single entry. Returns true if it existed.
    pub fn delete(&self, key: &str) -> bool {
        self.lock().remove(key).is_some()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Drop all expired entries (this also discards them as stale fallbacks).
    /// Returns the number of entries removed.
    pub fn prune_expired(&self) -> usize {
        let now = self.clock.now();
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|_, e| e.is_fresh(now));
        before - entries.len()
    }

    /// Number of stored entries, fresh or expired.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // A panic while holding the lock cannot leave the map half-updated
    // (every operation is a single insert/remove/retain), so recover the guard.
    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, CacheEntry>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for QuoteCache {
    fn default() -> Self {
        Self::new()
    }
}
