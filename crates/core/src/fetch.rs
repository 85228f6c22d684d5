//! Origin fetching

use crate::config::FetchConfig;
use crate::{Error, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName};
use reqwest::{Client, StatusCode, Url};
use std::time::Duration;
use tracing::debug;

/// User agent sent to origins
pub const USER_AGENT: &str = concat!("resizer/", env!("CARGO_PKG_VERSION"));

/// Retrieves source image bytes from an origin.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetch the resource at `url`, forwarding the allowed subset of
    /// `headers` from the inbound request.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Fetch`] for transport failures and non-200 responses,
    /// and [`Error::FetchTimeout`] when the deadline elapses.
    async fn fetch(&self, url: &Url, headers: &HeaderMap) -> Result<Vec<u8>>;
}

/// [`Fetcher`] backed by a shared `reqwest` client
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
    timeout: Duration,
    max_body_bytes: u64,
    forward_headers: Vec<HeaderName>,
}

impl HttpFetcher {
    /// Build a fetcher from configuration.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if a forwarded header name is invalid
    /// or the HTTP client cannot be initialised.
    pub fn new(config: &FetchConfig) -> Result<Self> {
        let forward_headers = config
            .forward_headers
            .iter()
            .map(|name| {
                HeaderName::from_bytes(name.trim().to_ascii_lowercase().as_bytes()).map_err(|e| {
                    Error::configuration_with_help(
                        format!("invalid forwarded header name {name:?}: {e}"),
                        "fetch.forward_headers must contain HTTP header names",
                    )
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let timeout = Duration::from_secs(config.timeout_secs);
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| Error::configuration(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            timeout,
            max_body_bytes: config.max_body_bytes,
            forward_headers,
        })
    }

    /// Header names copied from the inbound request
    #[must_use]
    pub fn forward_headers(&self) -> &[HeaderName] {
        &self.forward_headers
    }

    fn outbound_headers(&self, inbound: &HeaderMap) -> HeaderMap {
        let mut outbound = HeaderMap::new();
        for name in &self.forward_headers {
            for value in inbound.get_all(name) {
                outbound.append(name.clone(), value.clone());
            }
        }
        outbound
    }

    fn map_transport_error(&self, url: &Url, err: &reqwest::Error) -> Error {
        if err.is_timeout() {
            Error::FetchTimeout {
                url: url.to_string(),
                timeout_secs: self.timeout.as_secs(),
            }
        } else {
            Error::fetch(url.as_str(), err.to_string())
        }
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &Url, headers: &HeaderMap) -> Result<Vec<u8>> {
        debug!(%url, "Fetching origin image");

        let mut response = self
            .client
            .get(url.clone())
            .headers(self.outbound_headers(headers))
            .send()
            .await
            .map_err(|e| self.map_transport_error(url, &e))?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(Error::fetch(url.as_str(), format!("HTTP {status}")));
        }

        if let Some(length) = response.content_length()
            && length > self.max_body_bytes
        {
            return Err(Error::fetch(
                url.as_str(),
                format!(
                    "body of {length} bytes exceeds limit of {} bytes",
                    self.max_body_bytes
                ),
            ));
        }

        let mut body = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| self.map_transport_error(url, &e))?
        {
            if (body.len() + chunk.len()) as u64 > self.max_body_bytes {
                return Err(Error::fetch(
                    url.as_str(),
                    format!("body exceeds limit of {} bytes", self.max_body_bytes),
                ));
            }
            body.extend_from_slice(&chunk);
        }

        debug!(%url, bytes = body.len(), "Fetched origin image");
        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    fn config(headers: &[&str]) -> FetchConfig {
        FetchConfig {
            forward_headers: headers.iter().map(|h| (*h).to_string()).collect(),
            ..FetchConfig::default()
        }
    }

    #[test]
    fn test_only_allowed_headers_are_forwarded() {
        let fetcher = HttpFetcher::new(&config(&["Authorization", "accept"])).unwrap();

        let mut inbound = HeaderMap::new();
        inbound.insert("authorization", HeaderValue::from_static("Bearer t"));
        inbound.append("accept", HeaderValue::from_static("image/png"));
        inbound.append("accept", HeaderValue::from_static("image/*"));
        inbound.insert("host", HeaderValue::from_static("resizer.local"));
        inbound.insert("x-secret", HeaderValue::from_static("nope"));

        let outbound = fetcher.outbound_headers(&inbound);
        assert_eq!(outbound.len(), 3);
        assert_eq!(outbound.get("authorization").unwrap(), "Bearer t");
        assert_eq!(outbound.get_all("accept").iter().count(), 2);
        assert!(outbound.get("host").is_none());
        assert!(outbound.get("x-secret").is_none());
    }

    #[test]
    fn test_invalid_header_name_is_rejected() {
        let err = HttpFetcher::new(&config(&["bad header"])).unwrap_err();
        assert!(matches!(err, Error::Configuration { .. }));
    }

    #[test]
    fn test_default_config_builds() {
        let fetcher = HttpFetcher::new(&FetchConfig::default()).unwrap();
        assert!(!fetcher.forward_headers().is_empty());
        assert_eq!(fetcher.timeout, Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_unreachable_origin_is_a_fetch_error() {
        let fetcher = HttpFetcher::new(&config(&[])).unwrap();
        // Port 9 (discard) on localhost is closed in test environments
        let url = Url::parse("http://127.0.0.1:9/image.png").unwrap();
        let err = fetcher.fetch(&url, &HeaderMap::new()).await.unwrap_err();
        assert!(err.is_fetch(), "{err:?}");
    }

    #[tokio::test]
    async fn test_stalled_origin_times_out() {
        // Accepts connections but never answers
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        let fetcher = HttpFetcher::new(&FetchConfig {
            timeout_secs: 1,
            ..config(&[])
        })
        .unwrap();
        let url = Url::parse(&format!("http://{addr}/image.png")).unwrap();
        let started = std::time::Instant::now();
        let err = fetcher.fetch(&url, &HeaderMap::new()).await.unwrap_err();

        assert!(
            matches!(err, Error::FetchTimeout { timeout_secs: 1, .. }),
            "{err:?}"
        );
        assert!(started.elapsed() < Duration::from_secs(5));
    }
}
