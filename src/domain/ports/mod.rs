mod local_image_port;
mod resource_fetcher_port;

pub use local_image_port::LocalImagePort;
pub use resource_fetcher_port::ResourceFetcherPort;
