pub mod batch_preloader;
pub mod library_preloader;
pub mod single_item_loader;

pub use batch_preloader::{BatchPreloader, PreloadWindow};
pub use library_preloader::LibraryPreloader;
pub use single_item_loader::{ImageLoadState, ImageSlotInput, LoaderPhase, SingleItemLoader};
