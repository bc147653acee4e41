//! Application layer with the image loaders consumed by views.

/// Loader and preloader services.
pub mod services;

pub use services::{
    BatchPreloader, ImageLoadState, ImageSlotInput, LibraryPreloader, LoaderPhase, PreloadWindow,
    SingleItemLoader,
};
