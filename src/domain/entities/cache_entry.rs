//! Resolved cache entries and their eviction scoring.

use std::time::Duration;

use tokio::time::Instant;

const SECS_PER_HOUR: f64 = 3600.0;

/// A resolved image location remembered by the cache.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// Displayable location (URL or local file reference).
    pub resolved_location: String,
    /// When the entry was first stored.
    pub created_at: Instant,
    /// Last read hit (or creation).
    pub last_accessed_at: Instant,
    /// Number of accesses, starting at 1 for the insert itself.
    pub access_count: u64,
}

impl CacheEntry {
    /// Creates a fresh entry stamped at `now`.
    #[must_use]
    pub fn new(resolved_location: impl Into<String>, now: Instant) -> Self {
        Self {
            resolved_location: resolved_location.into(),
            created_at: now,
            last_accessed_at: now,
            access_count: 1,
        }
    }

    /// Records a read hit.
    pub fn touch(&mut self, now: Instant) {
        self.last_accessed_at = now;
        self.access_count = self.access_count.saturating_add(1);
    }

    /// Time since the last access.
    #[must_use]
    pub fn idle_for(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.last_accessed_at)
    }

    /// Recency-weighted score; lower means a better eviction candidate.
    ///
    /// Each access is worth one point and each idle hour costs one.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn eviction_score(&self, now: Instant) -> f64 {
        self.access_count as f64 - self.idle_for(now).as_secs_f64() / SECS_PER_HOUR
    }

    /// Returns true once the entry has been idle longer than `max_idle`.
    #[must_use]
    pub fn is_expired(&self, now: Instant, max_idle: Duration) -> bool {
        self.idle_for(now) > max_idle
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_touch_updates_access() {
        let mut entry = CacheEntry::new("x", Instant::now());
        tokio::time::advance(Duration::from_secs(10)).await;
        let now = Instant::now();
        entry.touch(now);

        assert_eq!(entry.access_count, 2);
        assert_eq!(entry.last_accessed_at, now);
        assert!(entry.created_at < now);
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_entries_score_lower() {
        let mut fresh = CacheEntry::new("fresh", Instant::now());
        let stale = CacheEntry::new("stale", Instant::now());
        let mut popular = CacheEntry::new("popular", Instant::now());
        popular.touch(Instant::now());

        tokio::time::advance(Duration::from_secs(2 * 3600)).await;
        fresh.touch(Instant::now());
        let now = Instant::now();

        assert!(stale.eviction_score(now) < fresh.eviction_score(now));
        assert!(stale.eviction_score(now) < popular.eviction_score(now));
    }

    #[tokio::test(start_paused = true)]
    async fn test_expiry() {
        let entry = CacheEntry::new("x", Instant::now());
        let max_idle = Duration::from_secs(60);
        assert!(!entry.is_expired(Instant::now(), max_idle));

        tokio::time::advance(Duration::from_secs(61)).await;
        assert!(entry.is_expired(Instant::now(), max_idle));
    }
}
