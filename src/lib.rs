//! Shelfcache - cover image cache for an e-book and manga reader client.
//!
//! This crate provides a single-flight, size-bounded image resolution cache
//! with pooled loaders, plus the per-item loader and scroll preloaders that
//! views build on.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

/// Application layer containing loaders and preloaders.
pub mod application;
/// Domain layer containing entities, errors, and port definitions.
pub mod domain;
/// Infrastructure layer containing the cache and its adapters.
pub mod infrastructure;

/// Current version of the application.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name.
pub const NAME: &str = "shelfcache";
