//! Resolution failure taxonomy.

use std::time::Duration;

use thiserror::Error;

/// Why a resolution produced no location.
///
/// These never cross the cache's public API, which settles to `None`
/// instead; they exist so failures can be logged and told apart.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum ResolveError {
    #[error("resolution failed: {reason}")]
    Failed { reason: String },

    #[error("resolution timed out after {}ms", after.as_millis())]
    TimedOut { after: Duration },

    #[error("resolution cancelled")]
    Cancelled,
}

impl ResolveError {
    /// Creates a failure error.
    #[must_use]
    pub fn failed(reason: impl Into<String>) -> Self {
        Self::Failed {
            reason: reason.into(),
        }
    }

    /// Returns whether the caller should surface this as an error.
    ///
    /// Cancellation means the result is no longer wanted.
    #[must_use]
    pub const fn is_user_facing(&self) -> bool {
        !matches!(self, Self::Cancelled)
    }

    /// Short label for structured logs.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Failed { .. } => "failed",
            Self::TimedOut { .. } => "timeout",
            Self::Cancelled => "cancelled",
        }
    }
}
