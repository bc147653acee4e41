//! Bounded free list of loader handles.

use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tracing::trace;

use crate::domain::entities::LoaderHandle;

/// Default maximum number of idle handles kept.
pub const DEFAULT_POOL_MAX: usize = 50;

/// Pool of reusable [`LoaderHandle`]s.
///
/// `acquire` never blocks: an empty pool allocates. `release` resets the
/// handle and keeps it only while fewer than `max_idle` are parked.
pub struct HandlePool {
    idle: Mutex<Vec<LoaderHandle>>,
    max_idle: usize,
    next_id: AtomicU64,
    reused: AtomicU64,
}

impl HandlePool {
    /// Creates an empty pool.
    #[must_use]
    pub fn new(max_idle: usize) -> Self {
        Self {
            idle: Mutex::new(Vec::with_capacity(max_idle.min(DEFAULT_POOL_MAX))),
            max_idle,
            next_id: AtomicU64::new(0),
            reused: AtomicU64::new(0),
        }
    }

    /// Takes an idle handle or allocates a new one.
    pub fn acquire(&self) -> LoaderHandle {
        if let Some(handle) = self.idle.lock().pop() {
            self.reused.fetch_add(1, Ordering::Relaxed);
            trace!(handle = handle.id(), "Reusing loader handle");
            return handle;
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        trace!(handle = id, "Allocating loader handle");
        LoaderHandle::new(id)
    }

    /// Returns a handle after use.
    pub fn release(&self, mut handle: LoaderHandle) {
        handle.reset();
        let mut idle = self.idle.lock();
        if idle.len() < self.max_idle {
            idle.push(handle);
        } else {
            trace!(handle = handle.id(), "Pool full, dropping loader handle");
        }
    }

    /// Number of idle handles.
    #[must_use]
    pub fn idle_count(&self) -> usize {
        self.idle.lock().len()
    }

    /// Total handles ever allocated.
    #[must_use]
    pub fn allocated(&self) -> u64 {
        self.next_id.load(Ordering::Relaxed)
    }

    /// Number of acquisitions served from the free list.
    #[must_use]
    pub fn reused(&self) -> u64 {
        self.reused.load(Ordering::Relaxed)
    }

    /// Maximum idle handles kept.
    #[must_use]
    pub const fn max_idle(&self) -> usize {
        self.max_idle
    }
}

impl Default for HandlePool {
    fn default() -> Self {
        Self::new(DEFAULT_POOL_MAX)
    }
}

impl std::fmt::Debug for HandlePool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlePool")
            .field("idle", &self.idle_count())
            .field("max_idle", &self.max_idle)
            .field("allocated", &self.allocated())
            .finish()
    }
}
