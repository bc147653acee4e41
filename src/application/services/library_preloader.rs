//! Whole-library cover warming.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::domain::entities::{CacheKey, LibraryItem};
use crate::infrastructure::config::PreloadConfig;
use crate::infrastructure::image::{BatchOptions, ResourceCache, is_local_library, item_image_url};

/// Warms every cover of a library in the background.
#[derive(Debug, Clone)]
pub struct LibraryPreloader {
    cache: ResourceCache,
    server: Option<String>,
    config: PreloadConfig,
}

impl LibraryPreloader {
    /// Creates a preloader bound to `server`.
    #[must_use]
    pub const fn new(cache: ResourceCache, server: Option<String>, config: PreloadConfig) -> Self {
        Self {
            cache,
            server,
            config,
        }
    }

    /// Starts warming after the configured start delay.
    ///
    /// Returns `None` when there is nothing to do for this context. Abort
    /// the handle to stop between batches.
    pub fn schedule(
        &self,
        library_id: Option<u64>,
        items: Arc<[LibraryItem]>,
        offline: bool,
    ) -> Option<JoinHandle<usize>> {
        let library_id = self.eligible_library(library_id, offline)?;
        let preloader = self.clone();
        let start_delay = self.config.library_start_delay();

        Some(tokio::spawn(async move {
            tokio::time::sleep(start_delay).await;
            preloader.warm(library_id, &items).await
        }))
    }

    /// Warms the library immediately and returns how many covers were
    /// requested.
    pub async fn preload_now(
        &self,
        library_id: Option<u64>,
        items: &[LibraryItem],
        offline: bool,
    ) -> usize {
        match self.eligible_library(library_id, offline) {
            Some(library_id) => self.warm(library_id, items).await,
            None => 0,
        }
    }

    fn eligible_library(&self, library_id: Option<u64>, offline: bool) -> Option<u64> {
        if offline || self.server.as_deref().is_none_or(str::is_empty) {
            return None;
        }
        library_id.filter(|&id| id != 0 && !is_local_library(id))
    }

    async fn warm(&self, library_id: u64, items: &[LibraryItem]) -> usize {
        let Some(server) = self.server.as_deref() else {
            return 0;
        };

        let (urls, keys): (Vec<String>, Vec<CacheKey>) = items
            .iter()
            .filter_map(|item| {
                let key = CacheKey::generate(item.id(), item.kind(), Some(library_id));
                if self.cache.contains(&key) {
                    return None;
                }
                item_image_url(server, library_id, item).map(|url| (url, key))
            })
            .unzip();

        if keys.is_empty() {
            debug!(library_id, "Library covers already cached");
            return 0;
        }

        info!(library_id, count = keys.len(), "Preloading library covers");
        let options = BatchOptions {
            batch_size: self.config.batch_size,
            delay: self.config.batch_delay(),
        };
        self.cache.preload_batch(&urls, &keys, options).await;
        keys.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::Priority;
    use crate::domain::ports::mocks::MockFetcher;
    use crate::infrastructure::config::CacheConfig;
    use std::time::Duration;
    use test_case::test_case;

    fn series(count: i64) -> Arc<[LibraryItem]> {
        (1..=count)
            .map(|id| LibraryItem::Series {
                id,
                series_id: id,
                server: None,
            })
            .collect()
    }

    fn setup(server: Option<&str>) -> (Arc<MockFetcher>, ResourceCache, LibraryPreloader) {
        let fetcher = Arc::new(MockFetcher::echo());
        let cache = ResourceCache::new(CacheConfig::default(), fetcher.clone());
        let preloader = LibraryPreloader::new(
            cache.clone(),
            server.map(str::to_string),
            PreloadConfig::default(),
        );
        (fetcher, cache, preloader)
    }

    #[tokio::test(start_paused = true)]
    async fn test_preload_now_warms_uncached_covers() {
        let (fetcher, cache, preloader) = setup(Some("http://srv"));
        let items = series(20);
        cache.set_cache_entry(&CacheKey::from("manga-1-3"), "cached");

        let requested = preloader.preload_now(Some(3), &items, false).await;

        assert_eq!(requested, 19);
        assert_eq!(fetcher.calls(), 19);
        assert!(fetcher.requests().iter().all(|(_, p)| *p == Priority::Low));
        assert_eq!(cache.stats().size, 20);
    }

    #[test_case(Some(9998), false ; "reserved local library")]
    #[test_case(Some(9999), false ; "second reserved library")]
    #[test_case(None, false ; "no library")]
    #[test_case(Some(0), false ; "zero library")]
    #[test_case(Some(3), true ; "offline")]
    #[tokio::test]
    async fn test_skipped_contexts(library_id: Option<u64>, offline: bool) {
        let (fetcher, _cache, preloader) = setup(Some("http://srv"));

        assert_eq!(preloader.preload_now(library_id, &series(5), offline).await, 0);
        assert!(preloader.schedule(library_id, series(5), offline).is_none());
        assert_eq!(fetcher.calls(), 0);
    }

    #[tokio::test]
    async fn test_no_server_skips() {
        let (fetcher, _cache, preloader) = setup(None);

        assert_eq!(preloader.preload_now(Some(3), &series(5), false).await, 0);
        assert_eq!(fetcher.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_schedule_waits_for_start_delay() {
        let (fetcher, _cache, preloader) = setup(Some("http://srv"));

        let task = preloader
            .schedule(Some(3), series(10), false)
            .expect("eligible library");
        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert_eq!(fetcher.calls(), 0);

        assert_eq!(task.await.unwrap(), 10);
        assert_eq!(fetcher.calls(), 10);
    }

    #[tokio::test(start_paused = true)]
    async fn test_aborted_schedule_stops() {
        let (fetcher, _cache, preloader) = setup(Some("http://srv"));

        let task = preloader
            .schedule(Some(3), series(10), false)
            .expect("eligible library");
        task.abort();
        tokio::time::sleep(Duration::from_secs(5)).await;

        assert_eq!(fetcher.calls(), 0);
    }
}
