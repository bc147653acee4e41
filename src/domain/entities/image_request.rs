//! Request options for image resolution.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default timeout for images about to be displayed.
pub const DEFAULT_HIGH_PRIORITY_TIMEOUT: Duration = Duration::from_secs(10);

/// Default timeout for speculative preloads.
pub const DEFAULT_LOW_PRIORITY_TIMEOUT: Duration = Duration::from_secs(5);

/// Scheduling hint passed down to the fetch primitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    /// Needed now (visible item).
    #[default]
    High,
    /// Speculative warm-up.
    Low,
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::High => write!(f, "high"),
            Self::Low => write!(f, "low"),
        }
    }
}

/// Options for a single resolve call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolveOptions {
    /// Upper bound on the whole fetch.
    pub timeout: Duration,
    /// Priority hint.
    pub priority: Priority,
}

impl ResolveOptions {
    /// High priority with the default timeout.
    #[must_use]
    pub const fn high() -> Self {
        Self {
            timeout: DEFAULT_HIGH_PRIORITY_TIMEOUT,
            priority: Priority::High,
        }
    }

    /// Low priority with the default preload timeout.
    #[must_use]
    pub const fn low() -> Self {
        Self {
            timeout: DEFAULT_LOW_PRIORITY_TIMEOUT,
            priority: Priority::Low,
        }
    }

    /// Overrides the timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self::high()
    }
}
