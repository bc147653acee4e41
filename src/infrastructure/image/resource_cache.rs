//! Single-flight image resolution cache.
//!
//! Owns the key -> location map, the in-flight operation map and the loader
//! handle pool. Concurrent resolves for one key share a single fetch; the
//! fetch runs on its own task so it settles even if every waiter goes away.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use futures_util::future::{BoxFuture, FutureExt, Shared, join_all};
use lru::LruCache;
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{Instant, interval_at};
use tracing::{debug, trace, warn};

use crate::domain::entities::{CacheEntry, CacheKey, EntityKind, Priority, ResolveOptions};
use crate::domain::errors::ResolveError;
use crate::domain::ports::ResourceFetcherPort;
use crate::infrastructure::config::CacheConfig;

use super::handle_pool::HandlePool;

const MIN_SWEEP_INTERVAL: Duration = Duration::from_secs(1);

type SharedResolution = Shared<BoxFuture<'static, Option<String>>>;

/// Snapshot of cache occupancy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Resolved entries held.
    pub size: usize,
    /// Resolutions currently running.
    pub in_flight_count: usize,
    /// Idle loader handles in the pool.
    pub pool_size: usize,
    /// Lookups answered from the map.
    pub hits: u64,
    /// Lookups that found nothing.
    pub misses: u64,
}

impl std::fmt::Display for CacheStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Cache: {} entries, {} in flight, {} pooled handles ({} hits, {} misses)",
            self.size, self.in_flight_count, self.pool_size, self.hits, self.misses
        )
    }
}

/// Batching for [`ResourceCache::preload_batch`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchOptions {
    /// Resolves issued together.
    pub batch_size: usize,
    /// Pause between batches.
    pub delay: Duration,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            batch_size: 10,
            delay: Duration::from_millis(100),
        }
    }
}

struct InFlight {
    op_id: u64,
    result: SharedResolution,
    cancel: Option<oneshot::Sender<()>>,
}

impl InFlight {
    fn cancel(mut self) {
        if let Some(tx) = self.cancel.take() {
            let _ = tx.send(());
        }
    }
}

enum Lookup {
    Hit(String),
    Pending(SharedResolution),
}

struct CacheInner {
    config: CacheConfig,
    fetcher: Arc<dyn ResourceFetcherPort>,
    entries: Mutex<LruCache<CacheKey, CacheEntry>>,
    in_flight: Mutex<HashMap<CacheKey, InFlight>>,
    pool: HandlePool,
    next_op: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
}

/// De-duplicating, size-bounded cache of resolved image locations.
///
/// Cloning is cheap and every clone shares the same state.
#[derive(Clone)]
pub struct ResourceCache {
    inner: Arc<CacheInner>,
}

impl std::fmt::Debug for ResourceCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceCache")
            .field("config", &self.inner.config)
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}

impl ResourceCache {
    /// Creates a cache that fetches through `fetcher`.
    #[must_use]
    pub fn new(config: CacheConfig, fetcher: Arc<dyn ResourceFetcherPort>) -> Self {
        let pool = HandlePool::new(config.pool_max);
        Self {
            inner: Arc::new(CacheInner {
                config,
                fetcher,
                entries: Mutex::new(LruCache::unbounded()),
                in_flight: Mutex::new(HashMap::new()),
                pool,
                next_op: AtomicU64::new(0),
                hits: AtomicU64::new(0),
                misses: AtomicU64::new(0),
            }),
        }
    }

    /// Configuration the cache was built with.
    #[must_use]
    pub fn config(&self) -> &CacheConfig {
        &self.inner.config
    }

    /// Builds the cache key for an entity. Pure.
    #[must_use]
    pub fn generate_key(entity_id: i64, kind: EntityKind, scope_id: Option<u64>) -> CacheKey {
        CacheKey::generate(entity_id, kind, scope_id)
    }

    /// Returns the cached location, refreshing its recency on a hit.
    pub fn get_cached(&self, key: &CacheKey) -> Option<String> {
        self.inner.get_cached(key)
    }

    /// Returns true if `key` is cached, without counting as an access.
    pub fn contains(&self, key: &CacheKey) -> bool {
        self.inner.entries.lock().contains(key)
    }

    /// Returns true if a resolution for `key` is running.
    pub fn is_loading(&self, key: &CacheKey) -> bool {
        self.inner.in_flight.lock().contains_key(key)
    }

    /// Resolves `key`, fetching `locator` if it is neither cached nor
    /// already being fetched.
    ///
    /// Never fails: errors, timeouts and cancellation all settle to `None`
    /// and nothing is cached for them.
    pub async fn resolve(
        &self,
        locator: &str,
        key: &CacheKey,
        options: ResolveOptions,
    ) -> Option<String> {
        if let Some(location) = self.get_cached(key) {
            return Some(location);
        }

        match self.inner.join_or_start(locator, key, options) {
            Lookup::Hit(location) => Some(location),
            Lookup::Pending(result) => result.await,
        }
    }

    /// Stores a location obtained elsewhere, e.g. from the local store.
    pub fn set_cache_entry(&self, key: &CacheKey, location: impl Into<String>) {
        self.inner.insert_entry(key.clone(), location.into());
    }

    /// Aborts the running resolution for `key`, if any.
    ///
    /// Its waiters settle to `None` and its handle goes back to the pool.
    pub fn cancel(&self, key: &CacheKey) {
        let op = self.inner.in_flight.lock().remove(key);
        if let Some(op) = op {
            debug!(key = %key, op = op.op_id, "Cancelled image resolution");
            op.cancel();
        }
    }

    /// Cancels every running resolution and empties the cache.
    pub fn clear(&self) {
        let drained: Vec<InFlight> = {
            let mut in_flight = self.inner.in_flight.lock();
            in_flight.drain().map(|(_, op)| op).collect()
        };
        let cancelled = drained.len();
        for op in drained {
            op.cancel();
        }
        self.inner.entries.lock().clear();
        debug!(cancelled, "Cleared image cache");
    }

    /// Drops entries idle for longer than the configured maximum age.
    ///
    /// Returns the number of entries removed.
    pub fn sweep_expired(&self) -> usize {
        self.inner.sweep_expired()
    }

    /// Starts the periodic age sweep.
    ///
    /// The task holds only a weak reference and stops once the last clone
    /// of the cache is dropped.
    pub fn start_sweeper(&self) -> JoinHandle<()> {
        let weak: Weak<CacheInner> = Arc::downgrade(&self.inner);
        let period = self.inner.config.sweep_interval().max(MIN_SWEEP_INTERVAL);

        tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            loop {
                ticker.tick().await;
                let Some(inner) = weak.upgrade() else {
                    break;
                };
                inner.sweep_expired();
            }
            debug!("Cache sweeper stopped");
        })
    }

    /// Resolves `locators` into `keys` in fixed-size batches at low
    /// priority, pausing between batches. Individual failures are ignored.
    pub async fn preload_batch(
        &self,
        locators: &[String],
        keys: &[CacheKey],
        options: BatchOptions,
    ) {
        if locators.len() != keys.len() {
            warn!(
                locators = locators.len(),
                keys = keys.len(),
                "Preload lists differ in length, extra items ignored"
            );
        }

        let resolve_options = self.inner.config.resolve_options(Priority::Low);
        let pairs: Vec<(&String, &CacheKey)> = locators.iter().zip(keys).collect();
        let batch_size = options.batch_size.max(1);
        let batches = pairs.len().div_ceil(batch_size);

        for (index, batch) in pairs.chunks(batch_size).enumerate() {
            let settled = join_all(
                batch
                    .iter()
                    .map(|(locator, key)| self.resolve(locator, key, resolve_options)),
            )
            .await;
            let resolved = settled.iter().filter(|r| r.is_some()).count();
            trace!(batch = index, resolved, total = batch.len(), "Preload batch settled");

            if index + 1 < batches {
                tokio::time::sleep(options.delay).await;
            }
        }
    }

    /// Returns current occupancy.
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        // One lock at a time: resolves hold in_flight while taking entries.
        let size = self.inner.entries.lock().len();
        let in_flight_count = self.inner.in_flight.lock().len();
        CacheStats {
            size,
            in_flight_count,
            pool_size: self.inner.pool.idle_count(),
            hits: self.inner.hits.load(Ordering::Relaxed),
            misses: self.inner.misses.load(Ordering::Relaxed),
        }
    }
}

impl CacheInner {
    fn get_cached(&self, key: &CacheKey) -> Option<String> {
        let mut entries = self.entries.lock();
        if let Some(entry) = entries.get_mut(key) {
            entry.touch(Instant::now());
            self.hits.fetch_add(1, Ordering::Relaxed);
            trace!(key = %key, "Image cache hit");
            Some(entry.resolved_location.clone())
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
            trace!(key = %key, "Image cache miss");
            None
        }
    }

    fn join_or_start(
        self: &Arc<Self>,
        locator: &str,
        key: &CacheKey,
        options: ResolveOptions,
    ) -> Lookup {
        let mut in_flight = self.in_flight.lock();

        // An operation may have settled between the caller's miss and here.
        if let Some(entry) = self.entries.lock().get_mut(key) {
            entry.touch(Instant::now());
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Lookup::Hit(entry.resolved_location.clone());
        }

        if let Some(op) = in_flight.get(key) {
            trace!(key = %key, op = op.op_id, "Joining in-flight resolution");
            return Lookup::Pending(op.result.clone());
        }

        let op_id = self.next_op.fetch_add(1, Ordering::Relaxed);
        let (cancel_tx, cancel_rx) = oneshot::channel();
        let task = tokio::spawn(Arc::clone(self).run(
            key.clone(),
            locator.to_string(),
            options,
            op_id,
            cancel_rx,
        ));
        let result = async move { task.await.ok().flatten() }.boxed().shared();

        in_flight.insert(
            key.clone(),
            InFlight {
                op_id,
                result: result.clone(),
                cancel: Some(cancel_tx),
            },
        );
        Lookup::Pending(result)
    }

    async fn run(
        self: Arc<Self>,
        key: CacheKey,
        locator: String,
        options: ResolveOptions,
        op_id: u64,
        cancel_rx: oneshot::Receiver<()>,
    ) -> Option<String> {
        let mut handle = self.pool.acquire();
        handle.begin(&locator, options.priority);
        debug!(
            key = %key,
            locator = %locator,
            priority = %options.priority,
            handle = handle.id(),
            "Resolving image"
        );

        let outcome = tokio::select! {
            biased;
            _ = cancel_rx => Err(ResolveError::Cancelled),
            fetched = tokio::time::timeout(
                options.timeout,
                self.fetcher.fetch(&mut handle, &locator, options.priority),
            ) => fetched.unwrap_or(Err(ResolveError::TimedOut { after: options.timeout })),
        };

        self.pool.release(handle);
        self.settle(&key, op_id, outcome)
    }

    fn settle(
        &self,
        key: &CacheKey,
        op_id: u64,
        outcome: Result<String, ResolveError>,
    ) -> Option<String> {
        let mut in_flight = self.in_flight.lock();
        let current = in_flight.get(key).is_some_and(|op| op.op_id == op_id);
        if current {
            in_flight.remove(key);
        }

        match outcome {
            Ok(location) if current => {
                // Insert while still holding the in-flight lock so no caller
                // can observe neither the entry nor the operation.
                self.insert_entry(key.clone(), location.clone());
                debug!(key = %key, op = op_id, "Image resolved");
                Some(location)
            }
            Ok(_) => {
                debug!(key = %key, op = op_id, "Dropping result of cancelled resolution");
                None
            }
            Err(err) if err.is_user_facing() => {
                warn!(
                    key = %key,
                    op = op_id,
                    kind = err.kind(),
                    error = %err,
                    "Image resolution failed"
                );
                None
            }
            Err(err) => {
                debug!(key = %key, op = op_id, kind = err.kind(), "Image resolution cancelled");
                None
            }
        }
    }

    fn insert_entry(&self, key: CacheKey, location: String) {
        let now = Instant::now();
        let capacity = self.config.capacity.max(1);
        let mut entries = self.entries.lock();

        if !entries.contains(&key) {
            while entries.len() >= capacity {
                let Some(victim) = Self::eviction_candidate(&entries, now) else {
                    break;
                };
                entries.pop(&victim);
                debug!(key = %victim, "Evicted image cache entry");
            }
        }

        entries.put(key, CacheEntry::new(location, now));
    }

    /// Lowest score wins; ties go to the least recently used entry.
    fn eviction_candidate(
        entries: &LruCache<CacheKey, CacheEntry>,
        now: Instant,
    ) -> Option<CacheKey> {
        let mut candidate: Option<(&CacheKey, f64)> = None;
        for (key, entry) in entries.iter().rev() {
            let score = entry.eviction_score(now);
            if candidate.is_none_or(|(_, best)| score < best) {
                candidate = Some((key, score));
            }
        }
        candidate.map(|(key, _)| key.clone())
    }

    fn sweep_expired(&self) -> usize {
        let now = Instant::now();
        let max_idle = self.config.max_idle();
        let mut entries = self.entries.lock();

        let expired: Vec<CacheKey> = entries
            .iter()
            .filter(|(_, entry)| entry.is_expired(now, max_idle))
            .map(|(key, _)| key.clone())
            .collect();
        for key in &expired {
            entries.pop(key);
        }

        if !expired.is_empty() {
            debug!(
                removed = expired.len(),
                remaining = entries.len(),
                "Swept idle image cache entries"
            );
        }
        expired.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ports::mocks::{FetchBehavior, MockFetcher};
    use tokio_test::{assert_pending, task};

    fn cache_with(fetcher: &Arc<MockFetcher>, capacity: usize) -> ResourceCache {
        let config = CacheConfig {
            capacity,
            ..CacheConfig::default()
        };
        ResourceCache::new(config, fetcher.clone())
    }

    async fn wait_for_in_flight(cache: &ResourceCache, count: usize) {
        while cache.stats().in_flight_count < count {
            tokio::task::yield_now().await;
        }
    }

    #[test]
    fn test_generate_key() {
        assert_eq!(
            ResourceCache::generate_key(42, EntityKind::Book, Some(7)).as_str(),
            "book-42-7"
        );
        assert_eq!(
            ResourceCache::generate_key(42, EntityKind::Manga, None).as_str(),
            "manga-42-local"
        );
    }

    #[tokio::test]
    async fn test_resolve_success_is_cached() {
        let fetcher = Arc::new(MockFetcher::succeeding("X"));
        let cache = cache_with(&fetcher, 10);
        let key = CacheKey::from("book-1-1");

        let result = cache.resolve("http://srv/1", &key, ResolveOptions::high()).await;

        assert_eq!(result.as_deref(), Some("X"));
        assert_eq!(cache.get_cached(&key).as_deref(), Some("X"));
        assert_eq!(fetcher.calls(), 1);
    }

    #[tokio::test]
    async fn test_cache_hit_skips_fetch() {
        let fetcher = Arc::new(MockFetcher::echo());
        let cache = cache_with(&fetcher, 10);
        let key = CacheKey::from("book-1-1");

        cache.resolve("http://srv/1", &key, ResolveOptions::high()).await;
        let again = cache.resolve("http://srv/1", &key, ResolveOptions::high()).await;

        assert_eq!(again.as_deref(), Some("http://srv/1"));
        assert_eq!(fetcher.calls(), 1);
        assert!(cache.stats().hits >= 1);
    }

    #[tokio::test]
    async fn test_failure_is_not_cached() {
        let fetcher = Arc::new(MockFetcher::failing());
        let cache = cache_with(&fetcher, 10);
        let key = CacheKey::from("book-2-1");
        let before = cache.stats().size;

        let result = cache.resolve("http://srv/2", &key, ResolveOptions::high()).await;

        assert!(result.is_none());
        assert!(cache.get_cached(&key).is_none());
        assert_eq!(cache.stats().size, before);
        assert_eq!(cache.stats().in_flight_count, 0);
    }

    #[tokio::test]
    async fn test_concurrent_resolves_share_one_fetch() {
        let fetcher = Arc::new(MockFetcher::delayed(Duration::from_millis(20)));
        let cache = cache_with(&fetcher, 10);
        let key = CacheKey::from("book-3-1");

        let (a, b, c) = tokio::join!(
            cache.resolve("http://srv/3", &key, ResolveOptions::high()),
            cache.resolve("http://srv/3", &key, ResolveOptions::high()),
            cache.resolve("http://srv/3", &key, ResolveOptions::low()),
        );

        assert_eq!(fetcher.calls(), 1);
        assert_eq!(a.as_deref(), Some("http://srv/3"));
        assert_eq!(a, b);
        assert_eq!(b, c);
    }

    #[tokio::test]
    async fn test_second_caller_joins_pending_operation() {
        let fetcher = Arc::new(MockFetcher::delayed(Duration::from_millis(10)));
        let cache = cache_with(&fetcher, 10);
        let key = CacheKey::from("manga-8-2");

        let mut first = task::spawn(cache.resolve("http://srv/8", &key, ResolveOptions::high()));
        assert_pending!(first.poll());
        let mut second = task::spawn(cache.resolve("http://srv/8", &key, ResolveOptions::high()));
        assert_pending!(second.poll());
        assert_eq!(cache.stats().in_flight_count, 1);
        assert!(cache.is_loading(&key));

        let (a, b) = tokio::join!(first, second);
        assert_eq!(a, b);
        assert_eq!(fetcher.calls(), 1);
        assert!(!cache.is_loading(&key));
    }

    #[tokio::test]
    async fn test_capacity_evicts_least_recently_used() {
        let fetcher = Arc::new(MockFetcher::echo());
        let cache = cache_with(&fetcher, 2);

        for id in 1..=3 {
            let key = CacheKey::generate(id, EntityKind::Book, Some(1));
            cache
                .resolve(&format!("http://srv/{id}"), &key, ResolveOptions::high())
                .await;
        }

        assert_eq!(cache.stats().size, 2);
        assert!(!cache.contains(&CacheKey::from("book-1-1")));
        assert!(cache.contains(&CacheKey::from("book-2-1")));
        assert!(cache.contains(&CacheKey::from("book-3-1")));
    }

    #[tokio::test]
    async fn test_eviction_spares_frequently_read_entries() {
        let fetcher = Arc::new(MockFetcher::echo());
        let cache = cache_with(&fetcher, 2);
        let popular = CacheKey::from("book-1-1");
        let other = CacheKey::from("book-2-1");

        cache.set_cache_entry(&popular, "a");
        cache.set_cache_entry(&other, "b");
        cache.get_cached(&popular);
        cache.get_cached(&popular);
        cache.set_cache_entry(&CacheKey::from("book-3-1"), "c");

        assert!(cache.contains(&popular));
        assert!(!cache.contains(&other));
        assert_eq!(cache.stats().size, 2);
    }

    #[tokio::test]
    async fn test_replacing_entry_does_not_evict() {
        let fetcher = Arc::new(MockFetcher::echo());
        let cache = cache_with(&fetcher, 2);
        let a = CacheKey::from("book-1-1");
        let b = CacheKey::from("book-2-1");

        cache.set_cache_entry(&a, "a");
        cache.set_cache_entry(&b, "b");
        cache.set_cache_entry(&a, "a2");

        assert_eq!(cache.stats().size, 2);
        assert_eq!(cache.get_cached(&a).as_deref(), Some("a2"));
        assert!(cache.contains(&b));
    }

    #[tokio::test]
    async fn test_miss_has_no_side_effects() {
        let fetcher = Arc::new(MockFetcher::echo());
        let cache = cache_with(&fetcher, 2);

        assert!(cache.get_cached(&CacheKey::from("book-9-9")).is_none());
        assert_eq!(cache.stats().size, 0);
        assert_eq!(fetcher.calls(), 0);
    }

    #[tokio::test]
    async fn test_cancel_settles_to_none() {
        let fetcher = Arc::new(MockFetcher::hanging());
        let cache = cache_with(&fetcher, 10);
        let key = CacheKey::from("book-4-1");

        let pending = tokio::spawn({
            let cache = cache.clone();
            let key = key.clone();
            async move { cache.resolve("http://srv/4", &key, ResolveOptions::high()).await }
        });
        wait_for_in_flight(&cache, 1).await;

        cache.cancel(&key);

        assert_eq!(pending.await.unwrap(), None);
        assert!(cache.get_cached(&key).is_none());
        assert_eq!(cache.stats().in_flight_count, 0);
        assert_eq!(cache.stats().pool_size, 1);
    }

    #[tokio::test]
    async fn test_cancel_without_operation_is_noop() {
        let fetcher = Arc::new(MockFetcher::echo());
        let cache = cache_with(&fetcher, 10);
        let key = CacheKey::from("book-5-1");
        cache.set_cache_entry(&key, "kept");

        cache.cancel(&key);

        assert_eq!(cache.get_cached(&key).as_deref(), Some("kept"));
    }

    #[tokio::test]
    async fn test_resolve_after_cancel_starts_fresh_operation() {
        let fetcher = Arc::new(MockFetcher::hanging());
        let cache = cache_with(&fetcher, 10);
        let key = CacheKey::from("book-6-1");

        let stale = tokio::spawn({
            let cache = cache.clone();
            let key = key.clone();
            async move { cache.resolve("http://srv/6", &key, ResolveOptions::high()).await }
        });
        wait_for_in_flight(&cache, 1).await;
        cache.cancel(&key);
        fetcher.set_behavior(FetchBehavior::EchoLocator);

        let fresh = cache.resolve("http://srv/6", &key, ResolveOptions::high()).await;

        assert_eq!(stale.await.unwrap(), None);
        assert_eq!(fresh.as_deref(), Some("http://srv/6"));
        assert_eq!(fetcher.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_settles_and_returns_handle() {
        let fetcher = Arc::new(MockFetcher::succeeding("warm"));
        let cache = cache_with(&fetcher, 10);
        cache
            .resolve("http://srv/0", &CacheKey::from("book-0-1"), ResolveOptions::high())
            .await;
        fetcher.set_behavior(FetchBehavior::Hang);
        let pool_before = cache.stats().pool_size;

        let options = ResolveOptions::high().with_timeout(Duration::from_millis(1));
        let key = CacheKey::from("book-7-1");
        let result = tokio::time::timeout(
            Duration::from_millis(100),
            cache.resolve("http://srv/7", &key, options),
        )
        .await;

        assert_eq!(result, Ok(None));
        assert_eq!(cache.stats().pool_size, pool_before);
        assert_eq!(cache.stats().in_flight_count, 0);
        assert!(cache.get_cached(&key).is_none());
    }

    #[tokio::test]
    async fn test_clear_resets_everything() {
        let fetcher = Arc::new(MockFetcher::hanging());
        let cache = cache_with(&fetcher, 10);
        cache.set_cache_entry(&CacheKey::from("book-1-1"), "a");

        let pending = tokio::spawn({
            let cache = cache.clone();
            async move {
                cache
                    .resolve("http://srv/2", &CacheKey::from("book-2-1"), ResolveOptions::high())
                    .await
            }
        });
        wait_for_in_flight(&cache, 1).await;

        cache.clear();
        let stats = cache.stats();

        assert_eq!(stats.size, 0);
        assert_eq!(stats.in_flight_count, 0);
        assert_eq!(pending.await.unwrap(), None);

        cache.clear();
        assert_eq!(cache.stats().size, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweep_removes_idle_entries() {
        let fetcher = Arc::new(MockFetcher::echo());
        let cache = cache_with(&fetcher, 10);
        let idle = CacheKey::from("book-1-1");
        let active = CacheKey::from("book-2-1");
        cache.set_cache_entry(&idle, "a");
        cache.set_cache_entry(&active, "b");

        tokio::time::advance(Duration::from_secs(20 * 60)).await;
        cache.get_cached(&active);
        tokio::time::advance(Duration::from_secs(11 * 60)).await;

        assert_eq!(cache.sweep_expired(), 1);
        assert!(!cache.contains(&idle));
        assert!(cache.contains(&active));
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweeper_runs_on_interval() {
        let fetcher = Arc::new(MockFetcher::echo());
        let config = CacheConfig {
            sweep_interval_secs: 60,
            max_idle_secs: 90,
            ..CacheConfig::default()
        };
        let cache = ResourceCache::new(config, fetcher);
        let sweeper = cache.start_sweeper();
        cache.set_cache_entry(&CacheKey::from("book-1-1"), "a");

        tokio::time::sleep(Duration::from_secs(61)).await;
        assert_eq!(cache.stats().size, 1);

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(cache.stats().size, 0);

        drop(cache);
        tokio::time::sleep(Duration::from_secs(61)).await;
        assert!(sweeper.is_finished());
    }

    #[tokio::test(start_paused = true)]
    async fn test_preload_batch_warms_at_low_priority() {
        let fetcher = Arc::new(MockFetcher::echo());
        let cache = cache_with(&fetcher, 10);

        let locators: Vec<String> = (1..=5).map(|id| format!("http://srv/{id}")).collect();
        let keys: Vec<CacheKey> = (1..=5)
            .map(|id| CacheKey::generate(id, EntityKind::Book, Some(1)))
            .collect();

        cache
            .preload_batch(
                &locators,
                &keys,
                BatchOptions {
                    batch_size: 2,
                    delay: Duration::from_millis(50),
                },
            )
            .await;

        assert_eq!(cache.stats().size, 5);
        assert!(
            fetcher
                .requests()
                .iter()
                .all(|(_, priority)| *priority == Priority::Low)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_preload_batch_continues_after_failed_batch() {
        let fetcher = Arc::new(MockFetcher::failing());
        let cache = cache_with(&fetcher, 10);
        let locators: Vec<String> = (1..=4).map(|id| format!("http://srv/{id}")).collect();
        let keys: Vec<CacheKey> = (1..=4)
            .map(|id| CacheKey::generate(id, EntityKind::Manga, Some(1)))
            .collect();

        cache
            .preload_batch(&locators, &keys, BatchOptions::default())
            .await;

        assert_eq!(fetcher.calls(), 4);
        assert_eq!(cache.stats().size, 0);
    }

    #[tokio::test]
    async fn test_entry_found_under_in_flight_lock_counts_as_hit() {
        let fetcher = Arc::new(MockFetcher::echo());
        let cache = cache_with(&fetcher, 10);
        let key = CacheKey::from("book-6-1");
        cache.set_cache_entry(&key, "settled.webp");

        let lookup = cache
            .inner
            .join_or_start("http://srv/6", &key, ResolveOptions::high());

        assert!(matches!(lookup, Lookup::Hit(ref location) if location == "settled.webp"));
        assert_eq!(cache.stats().hits, 1);
        assert_eq!(cache.stats().misses, 0);
        assert_eq!(fetcher.calls(), 0);
    }

    #[test]
    fn test_stats_while_resolving_on_worker_threads() {
        use std::sync::atomic::AtomicBool;
        use std::sync::mpsc;

        const WORKERS: usize = 4;
        const KEYS_PER_WORKER: usize = 2_000;

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(WORKERS)
            .enable_all()
            .build()
            .unwrap();
        let fetcher = Arc::new(MockFetcher::echo());
        let cache = cache_with(&fetcher, 64);
        let stop = Arc::new(AtomicBool::new(false));

        let pollers: Vec<_> = (0..2)
            .map(|_| {
                let cache = cache.clone();
                let stop = Arc::clone(&stop);
                std::thread::spawn(move || {
                    let mut polls = 0_u64;
                    while !stop.load(Ordering::Relaxed) {
                        let _ = cache.stats();
                        polls += 1;
                    }
                    polls
                })
            })
            .collect();

        let (done_tx, done_rx) = mpsc::channel();
        let workload = cache.clone();
        std::thread::spawn(move || {
            runtime.block_on(async move {
                let tasks: Vec<_> = (0..WORKERS)
                    .map(|worker| {
                        let cache = workload.clone();
                        tokio::spawn(async move {
                            for i in 0..KEYS_PER_WORKER {
                                let key = CacheKey::from(format!("book-{worker}-{i}"));
                                cache.resolve("http://srv/x", &key, ResolveOptions::high()).await;
                            }
                        })
                    })
                    .collect();
                for task in tasks {
                    task.await.unwrap();
                }
            });
            let _ = done_tx.send(());
        });

        let finished = done_rx.recv_timeout(Duration::from_secs(30)).is_ok();
        stop.store(true, Ordering::Relaxed);
        assert!(finished, "resolves stalled while stats were polled");
        for poller in pollers {
            assert!(poller.join().unwrap() > 0);
        }
        assert_eq!(fetcher.calls(), WORKERS * KEYS_PER_WORKER);
        assert_eq!(cache.stats().in_flight_count, 0);
    }

    #[test]
    fn test_stats_display() {
        let stats = CacheStats {
            size: 3,
            in_flight_count: 1,
            pool_size: 2,
            hits: 4,
            misses: 5,
        };
        assert_eq!(
            stats.to_string(),
            "Cache: 3 entries, 1 in flight, 2 pooled handles (4 hits, 5 misses)"
        );
    }
}
