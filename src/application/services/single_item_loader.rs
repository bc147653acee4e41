//! Image state for one displayed entity.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::domain::entities::{CacheKey, LibraryItem, Priority, ResolveOptions};
use crate::domain::ports::LocalImagePort;
use crate::infrastructure::image::{ResourceCache, item_image_url};

const LOCAL_NOT_FOUND: &str = "Local image not found";
const REMOTE_FAILED: &str = "Failed to load image";

/// What the loader is bound to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageSlotInput {
    /// Entity whose image is shown.
    pub item: LibraryItem,
    /// Library context; `None` means unbound.
    pub library_id: Option<u64>,
    /// Resolve from the download store instead of the server.
    pub offline: bool,
    /// Shown when there is no image.
    pub fallback: Option<String>,
}

impl ImageSlotInput {
    /// Online input without fallback.
    #[must_use]
    pub const fn online(item: LibraryItem, library_id: u64) -> Self {
        Self {
            item,
            library_id: Some(library_id),
            offline: false,
            fallback: None,
        }
    }

    /// Offline input without fallback.
    #[must_use]
    pub const fn offline(item: LibraryItem) -> Self {
        Self {
            item,
            library_id: None,
            offline: true,
            fallback: None,
        }
    }

    /// Sets the fallback location.
    #[must_use]
    pub fn with_fallback(mut self, fallback: impl Into<String>) -> Self {
        self.fallback = Some(fallback.into());
        self
    }

    /// Cache key for this input.
    #[must_use]
    pub fn cache_key(&self) -> CacheKey {
        CacheKey::generate(
            self.item.cache_identity(self.offline),
            self.item.kind(),
            self.library_id,
        )
    }
}

/// Lifecycle of a loader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoaderPhase {
    /// Nothing requested (never loaded, or unmounted).
    #[default]
    Idle,
    /// Waiting for a location.
    Resolving,
    /// Location available.
    Resolved,
    /// No image; the fallback is shown.
    Failed,
    /// The previous request was superseded.
    Cancelled,
}

/// Snapshot handed to the view.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ImageLoadState {
    /// Location to display.
    pub resolved_location: Option<String>,
    /// True while a request is outstanding.
    pub is_loading: bool,
    /// User-facing error, if the image could not be found.
    pub error: Option<String>,
    /// Current phase.
    pub phase: LoaderPhase,
}

struct SlotState {
    input: ImageSlotInput,
    view: ImageLoadState,
    generation: u64,
    current_key: Option<CacheKey>,
    mounted: bool,
}

enum Plan {
    Done,
    Local { key: CacheKey },
    Remote { key: CacheKey, url: String },
}

/// Binds the resource cache to a single displayed entity.
///
/// Results that arrive after the input changed, or after unmount, are
/// discarded.
pub struct SingleItemLoader {
    cache: ResourceCache,
    local_images: Arc<dyn LocalImagePort>,
    server: Option<String>,
    options: ResolveOptions,
    state: Mutex<SlotState>,
}

impl std::fmt::Debug for SingleItemLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SingleItemLoader")
            .field("server", &self.server)
            .field("state", &self.snapshot())
            .finish_non_exhaustive()
    }
}

impl SingleItemLoader {
    /// Creates a mounted, idle loader.
    #[must_use]
    pub fn new(
        cache: ResourceCache,
        local_images: Arc<dyn LocalImagePort>,
        server: Option<String>,
        input: ImageSlotInput,
    ) -> Self {
        let options = cache
            .config()
            .resolve_options(Priority::High);
        Self {
            cache,
            local_images,
            server,
            options,
            state: Mutex::new(SlotState {
                input,
                view: ImageLoadState::default(),
                generation: 0,
                current_key: None,
                mounted: true,
            }),
        }
    }

    /// Current state.
    #[must_use]
    pub fn snapshot(&self) -> ImageLoadState {
        self.state.lock().view.clone()
    }

    /// Key the loader currently targets.
    #[must_use]
    pub fn cache_key(&self) -> CacheKey {
        self.state.lock().input.cache_key()
    }

    /// Network locator for the current input, if online and bound.
    #[must_use]
    pub fn source_url(&self) -> Option<String> {
        let state = self.state.lock();
        self.source_url_for(&state.input)
    }

    fn source_url_for(&self, input: &ImageSlotInput) -> Option<String> {
        if input.offline {
            return None;
        }
        item_image_url(self.server.as_deref()?, input.library_id?, &input.item)
    }

    /// Resolves the image for the current input.
    pub async fn load(&self) {
        let (generation, input, plan) = {
            let mut state = self.state.lock();
            if !state.mounted {
                return;
            }
            state.generation += 1;
            let plan = self.plan(&mut state);
            (state.generation, state.input.clone(), plan)
        };

        let (key, result) = match plan {
            Plan::Done => return,
            Plan::Local { key } => {
                let found = self
                    .local_images
                    .find_local_image(
                        input.item.kind(),
                        input.item.cache_identity(true),
                        input.item.local_file_id(),
                        input.item.origin_server().map(str::to_string),
                    )
                    .await;
                if let Some(location) = &found {
                    self.cache.set_cache_entry(&key, location.clone());
                }
                (key, found)
            }
            Plan::Remote { key, url } => {
                let resolved = self.cache.resolve(&url, &key, self.options).await;
                (key, resolved)
            }
        };

        self.commit(generation, &key, result);
    }

    /// Decides what `load` has to do and updates the view for the
    /// synchronous outcomes.
    fn plan(&self, state: &mut SlotState) -> Plan {
        let input = &state.input;
        let entity_id = input.item.cache_identity(input.offline);

        if entity_id <= 0 {
            state.current_key = None;
            state.view = ImageLoadState {
                resolved_location: input.fallback.clone(),
                is_loading: false,
                error: None,
                phase: LoaderPhase::Resolved,
            };
            return Plan::Done;
        }

        let url = self.source_url_for(input);
        if !input.offline && url.is_none() {
            // Context not ready yet; stay in the loading state.
            state.current_key = None;
            state.view.is_loading = true;
            state.view.phase = LoaderPhase::Resolving;
            return Plan::Done;
        }

        let key = input.cache_key();
        if let Some(location) = self.cache.get_cached(&key) {
            trace!(key = %key, "Image slot served from cache");
            state.current_key = Some(key);
            state.view = ImageLoadState {
                resolved_location: Some(location),
                is_loading: false,
                error: None,
                phase: LoaderPhase::Resolved,
            };
            return Plan::Done;
        }

        state.current_key = Some(key.clone());
        state.view.is_loading = true;
        state.view.error = None;
        state.view.phase = LoaderPhase::Resolving;

        match url {
            Some(url) => Plan::Remote { key, url },
            None => Plan::Local { key },
        }
    }

    fn commit(&self, generation: u64, key: &CacheKey, result: Option<String>) {
        let mut state = self.state.lock();
        let current = state.current_key.as_ref() == Some(key);
        if !state.mounted || state.generation != generation || !current {
            debug!(key = %key, "Discarding stale image result");
            return;
        }

        state.view = match result {
            Some(location) => ImageLoadState {
                resolved_location: Some(location),
                is_loading: false,
                error: None,
                phase: LoaderPhase::Resolved,
            },
            None => ImageLoadState {
                resolved_location: state.input.fallback.clone(),
                is_loading: false,
                error: Some(
                    if state.input.offline {
                        LOCAL_NOT_FOUND
                    } else {
                        REMOTE_FAILED
                    }
                    .to_string(),
                ),
                phase: LoaderPhase::Failed,
            },
        };
    }

    /// Cancels the outstanding request, if any, and invalidates pending
    /// results. Returns true if something was cancelled.
    fn supersede(&self, state: &mut SlotState) -> bool {
        state.generation += 1;
        let Some(key) = state.current_key.take() else {
            return false;
        };
        if state.view.phase != LoaderPhase::Resolving {
            return false;
        }
        self.cache.cancel(&key);
        true
    }

    /// Rebinds the loader. Reloads only if the key or locator changed.
    pub async fn set_input(&self, input: ImageSlotInput) {
        {
            let mut state = self.state.lock();
            let unchanged = state.input.cache_key() == input.cache_key()
                && self.source_url_for(&state.input) == self.source_url_for(&input)
                && state.input.fallback == input.fallback;
            if unchanged {
                return;
            }
            if self.supersede(&mut state) {
                state.view.phase = LoaderPhase::Cancelled;
            }
            state.input = input;
        }
        self.load().await;
    }

    /// Cancels the current request and resolves again, e.g. after the view
    /// failed to display the image.
    pub async fn retry(&self) {
        {
            let mut state = self.state.lock();
            if let Some(key) = &state.current_key {
                self.cache.cancel(key);
            }
            state.generation += 1;
        }
        self.load().await;
    }

    /// Detaches the loader; pending results are dropped.
    pub fn unmount(&self) {
        let mut state = self.state.lock();
        self.supersede(&mut state);
        state.mounted = false;
        state.view.is_loading = false;
        state.view.phase = LoaderPhase::Idle;
    }

    /// Reattaches an unmounted loader and loads again.
    pub async fn remount(&self) {
        self.state.lock().mounted = true;
        self.load().await;
    }
}

impl Drop for SingleItemLoader {
    fn drop(&mut self) {
        let state = self.state.get_mut();
        if state.mounted
            && state.view.phase == LoaderPhase::Resolving
            && let Some(key) = &state.current_key
        {
            self.cache.cancel(key);
        }
    }
}
