//! Reusable loading machinery borrowed for one resolution.

use super::image_request::Priority;

/// Buffers larger than this are dropped on reset instead of being kept.
pub const MAX_RETAINED_BUFFER: usize = 4 * 1024 * 1024;

/// A reusable handle carrying per-fetch state and a scratch buffer.
///
/// Handles are owned by the pool and lent out for a single resolution.
#[derive(Debug)]
pub struct LoaderHandle {
    id: u64,
    buffer: Vec<u8>,
    locator: Option<String>,
    priority: Priority,
    uses: u64,
}

impl LoaderHandle {
    /// Creates a blank handle.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self {
            id,
            buffer: Vec::new(),
            locator: None,
            priority: Priority::High,
            uses: 0,
        }
    }

    /// Pool-assigned id.
    #[must_use]
    pub const fn id(&self) -> u64 {
        self.id
    }

    /// Number of resolutions this handle has served.
    #[must_use]
    pub const fn uses(&self) -> u64 {
        self.uses
    }

    /// Binds the handle to a new fetch.
    pub fn begin(&mut self, locator: &str, priority: Priority) {
        self.locator = Some(locator.to_string());
        self.priority = priority;
        self.uses += 1;
    }

    /// Locator of the fetch in progress.
    #[must_use]
    pub fn locator(&self) -> Option<&str> {
        self.locator.as_deref()
    }

    /// Priority of the fetch in progress.
    #[must_use]
    pub const fn priority(&self) -> Priority {
        self.priority
    }

    /// Scratch buffer for response bytes.
    pub fn buffer_mut(&mut self) -> &mut Vec<u8> {
        &mut self.buffer
    }

    /// Moves the buffer out, e.g. to hand it to a blocking decoder.
    pub fn take_buffer(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.buffer)
    }

    /// Puts a buffer back after [`take_buffer`](Self::take_buffer).
    pub fn restore_buffer(&mut self, buffer: Vec<u8>) {
        self.buffer = buffer;
    }

    /// Clears all per-fetch state so the handle can be reused.
    pub fn reset(&mut self) {
        self.locator = None;
        self.priority = Priority::High;
        if self.buffer.capacity() > MAX_RETAINED_BUFFER {
            self.buffer = Vec::new();
        } else {
            self.buffer.clear();
        }
    }

    /// Returns true if no fetch state is attached.
    #[must_use]
    pub fn is_reset(&self) -> bool {
        self.locator.is_none() && self.buffer.is_empty()
    }
}
