//! Fetch primitive backed by HTTP and the local filesystem.

use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Semaphore;
use tracing::{debug, trace};

use crate::domain::entities::{LoaderHandle, Priority};
use crate::domain::errors::ResolveError;
use crate::domain::ports::ResourceFetcherPort;

/// Largest response body accepted.
pub const MAX_IMAGE_BYTES: usize = 32 * 1024 * 1024;

/// Default number of low-priority downloads allowed at once.
pub const DEFAULT_MAX_LOW_PRIORITY: usize = 4;

const FILE_SCHEME: &str = "file://";

/// Downloads and validates images, or checks local files.
///
/// The resolved location is the locator itself: once an image is known to
/// load, the UI displays it straight from the same URL or path.
pub struct HttpImageFetcher {
    http_client: reqwest::Client,
    low_priority: Arc<Semaphore>,
}

impl std::fmt::Debug for HttpImageFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpImageFetcher")
            .field("low_priority_permits", &self.low_priority.available_permits())
            .finish_non_exhaustive()
    }
}

impl HttpImageFetcher {
    /// Creates a fetcher with its own HTTP client.
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be created.
    pub fn new(max_low_priority: usize) -> reqwest::Result<Self> {
        let http_client = reqwest::Client::builder()
            .user_agent(concat!("shelfcache/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self::with_client(http_client, max_low_priority))
    }

    /// Creates a fetcher sharing an existing client.
    #[must_use]
    pub fn with_client(http_client: reqwest::Client, max_low_priority: usize) -> Self {
        Self {
            http_client,
            low_priority: Arc::new(Semaphore::new(max_low_priority.max(1))),
        }
    }

    async fn fetch_remote(
        &self,
        handle: &mut LoaderHandle,
        url: &str,
    ) -> Result<(), ResolveError> {
        let mut response = self
            .http_client
            .get(url)
            .send()
            .await
            .map_err(|e| ResolveError::failed(format!("Request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(ResolveError::failed(format!(
                "HTTP {}: {}",
                response.status(),
                response.status().canonical_reason().unwrap_or("Unknown")
            )));
        }

        let buffer = handle.buffer_mut();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| ResolveError::failed(format!("Failed to read body: {e}")))?
        {
            if buffer.len() + chunk.len() > MAX_IMAGE_BYTES {
                return Err(ResolveError::failed(format!(
                    "Image exceeds {MAX_IMAGE_BYTES} bytes"
                )));
            }
            buffer.extend_from_slice(&chunk);
        }

        trace!(url = %url, bytes = buffer.len(), "Downloaded image");
        Ok(())
    }

    async fn check_local(path: &str) -> Result<(), ResolveError> {
        let metadata = tokio::fs::metadata(Path::new(path))
            .await
            .map_err(|e| ResolveError::failed(format!("Local image unavailable: {e}")))?;
        if metadata.is_file() {
            Ok(())
        } else {
            Err(ResolveError::failed(format!("Not a file: {path}")))
        }
    }
}

/// Checks that `bytes` hold a decodable image header with a non-empty size.
///
/// # Errors
/// Returns error if the format is unknown or the header is invalid.
pub fn validate_image(bytes: &[u8]) -> Result<(u32, u32), ResolveError> {
    let (width, height) = image::ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| ResolveError::failed(format!("Unreadable image: {e}")))?
        .into_dimensions()
        .map_err(|e| ResolveError::failed(format!("Failed to decode image: {e}")))?;

    if width == 0 || height == 0 {
        return Err(ResolveError::failed("Image has no pixels"));
    }
    Ok((width, height))
}

/// Returns the filesystem path for local locators.
#[must_use]
pub fn local_path(locator: &str) -> Option<&str> {
    if let Some(path) = locator.strip_prefix(FILE_SCHEME) {
        return Some(path);
    }
    Path::new(locator).is_absolute().then_some(locator)
}

#[async_trait]
impl ResourceFetcherPort for HttpImageFetcher {
    async fn fetch(
        &self,
        handle: &mut LoaderHandle,
        locator: &str,
        priority: Priority,
    ) -> Result<String, ResolveError> {
        if let Some(path) = local_path(locator) {
            Self::check_local(path).await?;
            return Ok(locator.to_string());
        }

        let _permit = match priority {
            Priority::High => None,
            Priority::Low => Some(
                self.low_priority
                    .clone()
                    .acquire_owned()
                    .await
                    .map_err(|e| ResolveError::failed(format!("Fetcher closed: {e}")))?,
            ),
        };

        self.fetch_remote(handle, locator).await?;

        let bytes = handle.take_buffer();
        let (bytes, validated) = tokio::task::spawn_blocking(move || {
            let validated = validate_image(&bytes);
            (bytes, validated)
        })
        .await
        .map_err(|e| ResolveError::failed(format!("Decode task panicked: {e}")))?;
        handle.restore_buffer(bytes);

        let (width, height) = validated?;
        debug!(url = %locator, width, height, %priority, "Image fetched");
        Ok(locator.to_string())
    }
}
