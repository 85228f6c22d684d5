//! Request coordination: cache lookup, fetch, transform, store

use crate::fetch::Fetcher;
use crate::format::ImageFormat;
use crate::key;
use crate::transform::{ResizeParams, Transformer};
use crate::{Error, Result};
use reqwest::header::HeaderMap;
use resizer_cache::BoundedCache;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Whether a response was served from the cache
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    /// Served from the cache
    Hit,
    /// Fetched and transformed for this request
    Miss,
}

impl CacheStatus {
    /// Value used for the `X-Cache` response header
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Hit => "HIT",
            Self::Miss => "MISS",
        }
    }
}

impl fmt::Display for CacheStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A resized image ready to be sent
#[derive(Debug, Clone)]
pub struct Rendered {
    /// Encoded image bytes
    pub payload: Vec<u8>,
    /// Encoding of `payload`
    pub format: ImageFormat,
    /// Whether the cache answered
    pub cache_status: CacheStatus,
}

/// Resolves resize requests against the cache, falling back to the origin.
///
/// Concurrent misses for the same key are not coalesced; each fetches and
/// transforms independently and the last write wins.
#[derive(Clone)]
pub struct RequestCoordinator {
    cache: Arc<BoundedCache>,
    fetcher: Arc<dyn Fetcher>,
    transformer: Arc<dyn Transformer>,
}

impl fmt::Debug for RequestCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestCoordinator")
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}

impl RequestCoordinator {
    /// Create a coordinator over shared collaborators
    #[must_use]
    pub fn new(
        cache: Arc<BoundedCache>,
        fetcher: Arc<dyn Fetcher>,
        transformer: Arc<dyn Transformer>,
    ) -> Self {
        Self {
            cache,
            fetcher,
            transformer,
        }
    }

    /// The cache this coordinator reads and fills
    #[must_use]
    pub fn cache(&self) -> &Arc<BoundedCache> {
        &self.cache
    }

    /// Serve a resize request.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidRequest`] if the locator cannot be canonicalised
    /// - [`Error::Fetch`] / [`Error::FetchTimeout`] if the origin fails
    /// - [`Error::UnsupportedFormat`] / [`Error::Transform`] if the image
    ///   cannot be processed
    ///
    /// A failure to store the result is logged and does not fail the request.
    pub async fn handle(
        &self,
        params: ResizeParams,
        locator: &str,
        headers: &HeaderMap,
    ) -> Result<Rendered> {
        let started = Instant::now();
        let (key, url) = key::derive(params, locator)?;

        if let Some(rendered) = self.lookup(&key).await {
            debug!(
                %key,
                elapsed_ms = started.elapsed().as_millis(),
                "Served from cache"
            );
            return Ok(rendered);
        }

        let source = self.fetcher.fetch(&url, headers).await?;

        let transformer = Arc::clone(&self.transformer);
        let transformed =
            tokio::task::spawn_blocking(move || transformer.transform(&source, params))
                .await
                .map_err(|e| Error::transform(format!("transform task failed: {e}")))??;

        let payload = self.store(key.clone(), transformed.bytes).await?;

        info!(
            %key,
            %url,
            format = %transformed.format,
            bytes = payload.len(),
            elapsed_ms = started.elapsed().as_millis(),
            "Resized image"
        );
        Ok(Rendered {
            payload,
            format: transformed.format,
            cache_status: CacheStatus::Miss,
        })
    }

    async fn lookup(&self, key: &str) -> Option<Rendered> {
        let cache = Arc::clone(&self.cache);
        let owned_key = key.to_string();
        let payload = match tokio::task::spawn_blocking(move || cache.get(&owned_key)).await {
            Ok(payload) => payload?,
            Err(e) => {
                warn!(%key, error = %e, "Cache lookup task failed, treating as miss");
                return None;
            }
        };

        let Some(format) = ImageFormat::sniff(&payload) else {
            warn!(%key, bytes = payload.len(), "Cached payload is not a supported image, refetching");
            return None;
        };

        Some(Rendered {
            payload,
            format,
            cache_status: CacheStatus::Hit,
        })
    }

    /// Write the payload to the cache and hand it back.
    ///
    /// Only a panicked store task is an error, since the payload is lost with it.
    async fn store(&self, key: String, payload: Vec<u8>) -> Result<Vec<u8>> {
        let cache = Arc::clone(&self.cache);
        let task = tokio::task::spawn_blocking(move || {
            let outcome = cache.set(&key, &payload);
            (key, payload, outcome)
        });

        match task.await {
            Ok((_, payload, Ok(()))) => Ok(payload),
            Ok((key, payload, Err(e))) => {
                error!(%key, error = %e, "Failed to store resized image");
                Ok(payload)
            }
            Err(e) => Err(resizer_cache::Error::io_no_path(
                std::io::Error::other(e.to_string()),
                "store task",
            )
            .into()),
        }
    }
}
