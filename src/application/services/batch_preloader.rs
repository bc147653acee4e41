//! Scroll-window preloading.

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

use crate::domain::entities::{CacheKey, LibraryItem, Priority, ResolveOptions};
use crate::infrastructure::config::PreloadConfig;
use crate::infrastructure::image::{BatchOptions, ResourceCache, item_image_url};

/// Visible slice of a scrollable list.
#[derive(Debug, Clone, Default)]
pub struct PreloadWindow {
    /// Full ordered list.
    pub items: Arc<[LibraryItem]>,
    /// First visible index.
    pub start: usize,
    /// One past the last visible index; `None` means the end of the list.
    pub end: Option<usize>,
    /// Library the list belongs to.
    pub library_id: Option<u64>,
    /// Offline lists are never preloaded.
    pub offline: bool,
}

struct Target {
    key: CacheKey,
    url: String,
}

/// Warms the cache around the visible part of a list.
///
/// Visible items are requested at high priority right away. The overscan
/// band follows at low priority after an idle delay, unless the window
/// changes first.
pub struct BatchPreloader {
    cache: ResourceCache,
    server: Option<String>,
    config: PreloadConfig,
    high: ResolveOptions,
    requested: Arc<Mutex<HashSet<CacheKey>>>,
    deferred: Mutex<Option<JoinHandle<()>>>,
    dispatched: Mutex<Vec<JoinHandle<()>>>,
}

impl std::fmt::Debug for BatchPreloader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchPreloader")
            .field("server", &self.server)
            .field("preloaded", &self.preloaded_count())
            .field("preloading", &self.is_preloading())
            .finish_non_exhaustive()
    }
}

impl BatchPreloader {
    /// Creates a preloader bound to `server`.
    #[must_use]
    pub fn new(cache: ResourceCache, server: Option<String>, config: PreloadConfig) -> Self {
        let high = cache.config().resolve_options(Priority::High);
        Self {
            cache,
            server,
            config,
            high,
            requested: Arc::new(Mutex::new(HashSet::new())),
            deferred: Mutex::new(None),
            dispatched: Mutex::new(Vec::new()),
        }
    }

    /// Number of keys requested and not failed.
    #[must_use]
    pub fn preloaded_count(&self) -> usize {
        self.requested.lock().len()
    }

    /// True while any preload started by this instance is running.
    #[must_use]
    pub fn is_preloading(&self) -> bool {
        let deferred = self
            .deferred
            .lock()
            .as_ref()
            .is_some_and(|task| !task.is_finished());
        deferred || self.dispatched.lock().iter().any(|task| !task.is_finished())
    }

    /// Moves the preload window.
    ///
    /// Pending overscan work for the previous window is abandoned; fetches
    /// already dispatched keep running and fill the shared cache.
    pub fn update(&self, window: &PreloadWindow) {
        self.abandon();

        if window.offline {
            return;
        }
        let (Some(server), Some(library_id)) = (self.server.as_deref(), window.library_id) else {
            return;
        };
        if library_id == 0 || window.items.is_empty() {
            return;
        }

        let len = window.items.len();
        let end = window.end.unwrap_or(len).min(len);
        let start = window.start.min(end);

        let target = |item: &LibraryItem| -> Option<Target> {
            let url = item_image_url(server, library_id, item)?;
            let key = CacheKey::generate(item.id(), item.kind(), Some(library_id));
            Some(Target { key, url })
        };

        let visible: Vec<Target> = window.items[start..end]
            .iter()
            .filter_map(&target)
            .filter(|t| !self.cache.contains(&t.key))
            .collect();
        let mut dispatched = self.dispatched.lock();
        dispatched.retain(|task| !task.is_finished());
        for Target { key, url } in visible {
            if !self.requested.lock().insert(key.clone()) {
                continue;
            }
            let cache = self.cache.clone();
            let requested = Arc::clone(&self.requested);
            let options = self.high;
            dispatched.push(tokio::spawn(async move {
                if cache.resolve(&url, &key, options).await.is_none() {
                    requested.lock().remove(&key);
                }
            }));
        }
        drop(dispatched);

        let band_start = start.saturating_sub(self.config.overscan);
        let band_end = end.saturating_add(self.config.overscan).min(len);
        let band: Vec<Target> = window.items[band_start..start]
            .iter()
            .chain(&window.items[end..band_end])
            .filter_map(&target)
            .collect();
        if band.is_empty() {
            return;
        }

        trace!(start, end, band = band.len(), "Scheduling overscan preload");
        let cache = self.cache.clone();
        let requested = Arc::clone(&self.requested);
        let idle_delay = self.config.idle_delay();
        let options = BatchOptions {
            batch_size: self.config.batch_size,
            delay: self.config.batch_delay(),
        };
        *self.deferred.lock() = Some(tokio::spawn(async move {
            tokio::time::sleep(idle_delay).await;

            let (urls, keys): (Vec<String>, Vec<CacheKey>) = {
                let mut requested = requested.lock();
                band.into_iter()
                    .filter(|t| !cache.contains(&t.key) && requested.insert(t.key.clone()))
                    .map(|t| (t.url, t.key))
                    .unzip()
            };
            if keys.is_empty() {
                return;
            }
            debug!(count = keys.len(), "Preloading overscan band");
            cache.preload_batch(&urls, &keys, options).await;

            let mut requested = requested.lock();
            for key in keys.iter().filter(|key| !cache.contains(key)) {
                requested.remove(key);
            }
        }));
    }

    /// Abandons scheduled overscan work.
    pub fn abandon(&self) {
        if let Some(task) = self.deferred.lock().take() {
            task.abort();
        }
    }
}

impl Drop for BatchPreloader {
    fn drop(&mut self) {
        self.abandon();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ports::mocks::MockFetcher;
    use crate::infrastructure::config::CacheConfig;
    use std::time::Duration;

    const SERVER: &str = "http://srv";

    fn books(count: i64) -> Arc<[LibraryItem]> {
        (1..=count)
            .map(|id| LibraryItem::Book { id, file_id: id })
            .collect()
    }

    fn window(items: &Arc<[LibraryItem]>, start: usize, end: usize) -> PreloadWindow {
        PreloadWindow {
            items: Arc::clone(items),
            start,
            end: Some(end),
            library_id: Some(1),
            offline: false,
        }
    }

    fn setup(overscan: usize) -> (Arc<MockFetcher>, ResourceCache, BatchPreloader) {
        let fetcher = Arc::new(MockFetcher::echo());
        let cache = ResourceCache::new(CacheConfig::default(), fetcher.clone());
        let config = PreloadConfig {
            overscan,
            ..PreloadConfig::default()
        };
        let preloader = BatchPreloader::new(cache.clone(), Some(SERVER.to_string()), config);
        (fetcher, cache, preloader)
    }

    fn count(fetcher: &MockFetcher, priority: Priority) -> usize {
        fetcher
            .requests()
            .iter()
            .filter(|(_, p)| *p == priority)
            .count()
    }

    #[tokio::test(start_paused = true)]
    async fn test_visible_high_then_band_low() {
        let (fetcher, cache, preloader) = setup(5);
        let items = books(50);

        preloader.update(&window(&items, 25, 30));
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(count(&fetcher, Priority::High), 5);
        assert_eq!(count(&fetcher, Priority::Low), 0);
        assert!(preloader.is_preloading());

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(count(&fetcher, Priority::Low), 10);
        assert_eq!(cache.stats().size, 15);
        assert_eq!(preloader.preloaded_count(), 15);
        assert!(!preloader.is_preloading());

        let outside = format!("{SERVER}/cover-image/1/40.webp");
        assert!(fetcher.requests().iter().all(|(url, _)| *url != outside));
    }

    #[tokio::test(start_paused = true)]
    async fn test_window_change_abandons_band() {
        let (fetcher, _cache, preloader) = setup(2);
        let items = books(100);

        preloader.update(&window(&items, 10, 12));
        preloader.update(&window(&items, 80, 82));
        tokio::time::sleep(Duration::from_secs(5)).await;

        let low: Vec<String> = fetcher
            .requests()
            .into_iter()
            .filter(|(_, p)| *p == Priority::Low)
            .map(|(url, _)| url)
            .collect();
        assert_eq!(low.len(), 4);
        assert!(low.contains(&format!("{SERVER}/cover-image/1/79.webp")));
        assert!(!low.contains(&format!("{SERVER}/cover-image/1/10.webp")));

        // Visible fetches of the first window were already dispatched.
        assert_eq!(count(&fetcher, Priority::High), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cached_keys_are_skipped() {
        let (fetcher, cache, preloader) = setup(0);
        let items = books(3);
        for id in 1..=3 {
            cache.set_cache_entry(&CacheKey::from(format!("book-{id}-1")), "cached");
        }

        preloader.update(&window(&items, 0, 3));
        tokio::time::sleep(Duration::from_secs(1)).await;

        assert_eq!(fetcher.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_offline_or_unbound_does_nothing() {
        let (fetcher, _cache, preloader) = setup(5);
        let items = books(10);

        preloader.update(&PreloadWindow {
            offline: true,
            ..window(&items, 0, 5)
        });
        preloader.update(&PreloadWindow {
            library_id: None,
            ..window(&items, 0, 5)
        });
        tokio::time::sleep(Duration::from_secs(5)).await;

        assert_eq!(fetcher.calls(), 0);
        assert_eq!(preloader.preloaded_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_repeated_update_does_not_refetch() {
        let (fetcher, _cache, preloader) = setup(0);
        let items = books(4);

        preloader.update(&window(&items, 0, 4));
        preloader.update(&window(&items, 0, 4));
        tokio::time::sleep(Duration::from_secs(1)).await;

        assert_eq!(fetcher.calls(), 4);
    }
}
