//! In-memory payload cache with per-kind freshness and stale-serving windows.
//!
//! Each entry carries two deadlines. Before `fresh_until` it is served as-is;
//! between `fresh_until` and `stale_until` it is served while the caller
//! schedules a refresh; after `stale_until` it is gone. The clock is
//! [`tokio::time::Instant`], so a paused runtime drives every boundary in tests.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt::{Display, Formatter};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::{DataKind, Payload, Symbol};

/// Identity of a cached payload.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey {
    kind: DataKind,
    symbol: Symbol,
}

impl CacheKey {
    pub fn new(kind: DataKind, symbol: Symbol) -> Self {
        Self { kind, symbol }
    }

    pub const fn kind(&self) -> DataKind {
        self.kind
    }

    pub fn symbol(&self) -> &Symbol {
        &self.symbol
    }
}

impl Display for CacheKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.kind, self.symbol)
    }
}

/// Result of a cache lookup.
#[derive(Debug, Clone, PartialEq)]
pub enum CacheLookup {
    Fresh(Payload),
    Stale(Payload),
    Miss,
}

impl CacheLookup {
    pub fn payload(&self) -> Option<&Payload> {
        match self {
            Self::Fresh(payload) | Self::Stale(payload) => Some(payload),
            Self::Miss => None,
        }
    }

    pub const fn is_fresh(&self) -> bool {
        matches!(self, Self::Fresh(_))
    }

    pub const fn is_stale(&self) -> bool {
        matches!(self, Self::Stale(_))
    }

    pub const fn is_miss(&self) -> bool {
        matches!(self, Self::Miss)
    }
}

/// Freshness window plus the grace period during which stale data may still be served.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Expiry {
    pub ttl: Duration,
    pub grace: Duration,
}

impl Expiry {
    pub const fn new(ttl: Duration, grace: Duration) -> Self {
        Self { ttl, grace }
    }

    /// Stale data is kept for as long again as it was fresh.
    pub const fn doubled(ttl: Duration) -> Self {
        Self { ttl, grace: ttl }
    }
}

/// Capacity and expiry settings for [`CacheEngine`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachePolicy {
    /// Maximum number of entries. Zero disables caching.
    pub capacity: usize,
    pub quote: Expiry,
    pub historical: Expiry,
    pub profile: Expiry,
    /// Applied to synthetic payloads regardless of kind.
    pub synthetic: Expiry,
}

impl Default for CachePolicy {
    fn default() -> Self {
        let quote_ttl = Duration::from_secs(60);
        Self {
            capacity: 10_000,
            quote: Expiry::doubled(quote_ttl),
            historical: Expiry::doubled(Duration::from_secs(300)),
            profile: Expiry::doubled(Duration::from_secs(86_400)),
            synthetic: Expiry::new(quote_ttl, Duration::ZERO),
        }
    }
}

impl CachePolicy {
    pub const fn expiry_for(&self, kind: DataKind) -> Expiry {
        match kind {
            DataKind::Quote => self.quote,
            DataKind::Historical => self.historical,
            DataKind::Profile => self.profile,
        }
    }

    fn expiry_of(&self, payload: &Payload) -> Expiry {
        if payload.is_synthetic {
            self.synthetic
        } else {
            self.expiry_for(payload.kind())
        }
    }
}

/// Counters exposed for status reporting. All but `size` only ever grow.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    pub hits: u64,
    pub stale_hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub size: usize,
    pub capacity: usize,
}

#[derive(Debug)]
struct CacheEntry {
    payload: Payload,
    produced_at: Instant,
    fresh_until: Instant,
    stale_until: Instant,
    last_access: u64,
    /// Moved from the fresh recency order to the stale one.
    filed_stale: bool,
}

impl CacheEntry {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.stale_until
    }

    fn is_fresh(&self, now: Instant) -> bool {
        now < self.fresh_until
    }
}

/// Entries plus ordered indices, so purging and victim selection never scan the map.
///
/// Every entry is in `expiries`, and in exactly one of `fresh_lru` or
/// `stale_lru`. Entries still in `fresh_lru` are also in `turning_stale`.
/// Entries are filed as stale lazily, right before a victim is picked.
#[derive(Debug, Default)]
struct CacheInner {
    map: HashMap<CacheKey, CacheEntry>,
    expiries: BTreeSet<(Instant, CacheKey)>,
    turning_stale: BTreeSet<(Instant, CacheKey)>,
    fresh_lru: BTreeMap<u64, CacheKey>,
    stale_lru: BTreeMap<u64, CacheKey>,
    tick: u64,
    hits: u64,
    stale_hits: u64,
    misses: u64,
    evictions: u64,
}

impl CacheInner {
    fn next_tick(&mut self) -> u64 {
        self.tick = self.tick.wrapping_add(1);
        self.tick
    }

    fn insert(&mut self, key: CacheKey, entry: CacheEntry) {
        self.remove(&key);
        self.expiries.insert((entry.stale_until, key.clone()));
        self.turning_stale.insert((entry.fresh_until, key.clone()));
        self.fresh_lru.insert(entry.last_access, key.clone());
        self.map.insert(key, entry);
    }

    fn remove(&mut self, key: &CacheKey) -> Option<CacheEntry> {
        let entry = self.map.remove(key)?;
        self.expiries.remove(&(entry.stale_until, key.clone()));
        if entry.filed_stale {
            self.stale_lru.remove(&entry.last_access);
        } else {
            self.turning_stale.remove(&(entry.fresh_until, key.clone()));
            self.fresh_lru.remove(&entry.last_access);
        }
        Some(entry)
    }

    fn touch(&mut self, key: &CacheKey, tick: u64) {
        let Some(entry) = self.map.get_mut(key) else {
            return;
        };
        let previous = std::mem::replace(&mut entry.last_access, tick);
        let lru = if entry.filed_stale {
            &mut self.stale_lru
        } else {
            &mut self.fresh_lru
        };
        if let Some(key) = lru.remove(&previous) {
            lru.insert(tick, key);
        }
    }

    fn clear(&mut self) -> usize {
        let removed = self.map.len();
        self.map.clear();
        self.expiries.clear();
        self.turning_stale.clear();
        self.fresh_lru.clear();
        self.stale_lru.clear();
        removed
    }

    /// Removes every entry past its stale deadline.
    fn purge_expired(&mut self, now: Instant) -> usize {
        let mut purged = 0;
        while let Some((until, key)) = self.expiries.first().cloned() {
            if until > now {
                break;
            }
            self.remove(&key);
            purged += 1;
        }
        purged
    }

    fn file_stale_entries(&mut self, now: Instant) {
        while let Some((until, key)) = self.turning_stale.pop_first() {
            if until > now {
                self.turning_stale.insert((until, key));
                break;
            }
            if let Some(entry) = self.map.get_mut(&key) {
                entry.filed_stale = true;
                if let Some(key) = self.fresh_lru.remove(&entry.last_access) {
                    self.stale_lru.insert(entry.last_access, key);
                }
            }
        }
    }

    /// Least-recently-used stale entry, or failing that the least-recently-used fresh one.
    fn pick_victim(&mut self, now: Instant) -> Option<CacheKey> {
        self.file_stale_entries(now);
        self.stale_lru
            .first_key_value()
            .or_else(|| self.fresh_lru.first_key_value())
            .map(|(_, key)| key.clone())
    }
}

/// Thread-safe payload cache.
#[derive(Debug)]
pub struct CacheEngine {
    policy: CachePolicy,
    inner: Mutex<CacheInner>,
}

impl Default for CacheEngine {
    fn default() -> Self {
        Self::new(CachePolicy::default())
    }
}

impl CacheEngine {
    pub fn new(policy: CachePolicy) -> Self {
        Self {
            policy,
            inner: Mutex::new(CacheInner::default()),
        }
    }

    pub const fn policy(&self) -> &CachePolicy {
        &self.policy
    }

    pub const fn is_disabled(&self) -> bool {
        self.policy.capacity == 0
    }

    fn lock(&self) -> MutexGuard<'_, CacheInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Looks up `key`, classifying the entry against the current time.
    ///
    /// An entry past its stale deadline is dropped and reported as a miss.
    pub fn get(&self, key: &CacheKey) -> CacheLookup {
        let now = Instant::now();
        let mut inner = self.lock();
        let tick = inner.next_tick();

        let state = inner
            .map
            .get(key)
            .map(|entry| (entry.is_expired(now), entry.is_fresh(now)));

        let lookup = match state {
            None => CacheLookup::Miss,
            Some((true, _)) => {
                inner.remove(key);
                CacheLookup::Miss
            }
            Some((false, fresh)) => {
                inner.touch(key, tick);
                match inner.map.get(key) {
                    Some(entry) if fresh => CacheLookup::Fresh(entry.payload.clone()),
                    Some(entry) => CacheLookup::Stale(entry.payload.clone()),
                    None => CacheLookup::Miss,
                }
            }
        };

        match &lookup {
            CacheLookup::Fresh(_) => inner.hits += 1,
            CacheLookup::Stale(_) => inner.stale_hits += 1,
            CacheLookup::Miss => inner.misses += 1,
        }
        lookup
    }

    /// Installs `payload` under `key`, replacing any prior entry.
    ///
    /// Deadlines come from the payload's kind, or from the synthetic expiry
    /// when the payload is synthetic. Inserting a new key into a full cache
    /// evicts first.
    pub fn put(&self, key: CacheKey, payload: Payload) {
        if self.is_disabled() {
            return;
        }

        let expiry = self.policy.expiry_of(&payload);
        let now = Instant::now();
        let fresh_until = deadline(now, expiry.ttl);
        let stale_until = deadline(fresh_until, expiry.grace);

        let mut inner = self.lock();
        if !inner.map.contains_key(&key) && inner.map.len() >= self.policy.capacity {
            let purged = inner.purge_expired(now);
            inner.evictions += purged as u64;

            while inner.map.len() >= self.policy.capacity {
                let Some(victim) = inner.pick_victim(now) else {
                    break;
                };
                inner.remove(&victim);
                inner.evictions += 1;
            }
        }

        let entry = CacheEntry {
            payload,
            produced_at: now,
            fresh_until,
            stale_until,
            last_access: inner.next_tick(),
            filed_stale: false,
        };
        debug_assert!(entry.produced_at <= entry.fresh_until && entry.fresh_until <= entry.stale_until);
        inner.insert(key, entry);
    }

    pub fn invalidate(&self, key: &CacheKey) -> bool {
        self.lock().remove(key).is_some()
    }

    /// Removes every kind cached for `symbol`.
    pub fn invalidate_symbol(&self, symbol: &Symbol) -> usize {
        let mut inner = self.lock();
        let doomed = DataKind::ALL
            .into_iter()
            .map(|kind| CacheKey::new(kind, symbol.clone()))
            .collect::<Vec<_>>();
        doomed
            .iter()
            .filter(|key| inner.remove(key).is_some())
            .count()
    }

    pub fn clear(&self) -> usize {
        self.lock().clear()
    }

    pub fn len(&self) -> usize {
        self.lock().map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        let inner = self.lock();
        CacheStats {
            hits: inner.hits,
            stale_hits: inner.stale_hits,
            misses: inner.misses,
            evictions: inner.evictions,
            size: inner.map.len(),
            capacity: self.policy.capacity,
        }
    }
}

fn deadline(from: Instant, after: Duration) -> Instant {
    from.checked_add(after)
        .unwrap_or_else(|| from + Duration::from_secs(u32::MAX as u64))
}
