//! HTTP front end
//!
//! Routes:
//! - `GET /resize/{width}/{height}/{*locator}`: resized image, `X-Cache: HIT|MISS`
//! - `GET /health`: liveness probe
//! - `GET /cache/stats`: cache counters as JSON
//! - `DELETE /cache[?purge=true]`: forget every entry, optionally deleting files

use crate::request_span;
use crate::shutdown::ShutdownCoordinator;
use axum::extract::{Path, Query, RawQuery, State};
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use axum::Router;
use resizer_cache::{BoundedCache, DurableStore};
use resizer_core::{
    Config, Error, HttpFetcher, ImageTransformer, RequestCoordinator, ResizeParams,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{Instrument, error, info, warn};

/// Response header reporting whether the cache answered
pub static X_CACHE: HeaderName = HeaderName::from_static("x-cache");

/// Shared state handed to every handler
#[derive(Debug, Clone)]
pub struct AppState {
    coordinator: RequestCoordinator,
    max_dimension: u32,
    request_timeout: Duration,
}

impl AppState {
    /// Create state around an existing coordinator
    #[must_use]
    pub const fn new(
        coordinator: RequestCoordinator,
        max_dimension: u32,
        request_timeout: Duration,
    ) -> Self {
        Self {
            coordinator,
            max_dimension,
            request_timeout,
        }
    }

    /// Open the cache directory and build the production collaborators.
    ///
    /// # Errors
    ///
    /// Fails if the cache directory is unusable or the fetcher cannot be
    /// configured.
    pub fn from_config(config: &Config) -> resizer_core::Result<Self> {
        let store = DurableStore::new(&config.cache.dir)?;
        let cache = if config.cache.warm_start {
            BoundedCache::open(config.cache.capacity, store)?
        } else {
            BoundedCache::new(config.cache.capacity, store)?
        };
        info!(
            dir = %config.cache.dir.display(),
            capacity = config.cache.capacity,
            entries = cache.len(),
            "Cache ready"
        );

        let coordinator = RequestCoordinator::new(
            Arc::new(cache),
            Arc::new(HttpFetcher::new(&config.fetch)?),
            Arc::new(
                ImageTransformer::new()
                    .with_jpeg_quality(config.transform.jpeg_quality)
                    .with_max_dimension(config.server.max_dimension),
            ),
        );
        Ok(Self::new(
            coordinator,
            config.server.max_dimension,
            Duration::from_secs(config.server.request_timeout_secs),
        ))
    }

    /// The request coordinator
    #[must_use]
    pub const fn coordinator(&self) -> &RequestCoordinator {
        &self.coordinator
    }

    fn parse_dimension(&self, name: &str, raw: &str) -> Result<u32, Error> {
        let value: u32 = raw.parse().map_err(|_| {
            Error::invalid_request(format!(
                "{name} must be a non-negative integer, got {raw:?}"
            ))
        })?;
        if value > self.max_dimension {
            return Err(Error::invalid_request(format!(
                "{name} {value} exceeds the maximum of {}",
                self.max_dimension
            )));
        }
        Ok(value)
    }
}

/// Build the router
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/resize/{width}/{height}/{*locator}", get(resize_handler))
        .route("/health", get(health_check))
        .route("/cache/stats", get(cache_stats))
        .route("/cache", axum::routing::delete(clear_cache))
        .with_state(state)
}

/// Serve on an already bound listener until `shutdown` triggers.
///
/// # Errors
///
/// Returns an I/O error if the server fails while accepting connections.
pub async fn run(
    listener: TcpListener,
    state: AppState,
    shutdown: ShutdownCoordinator,
) -> resizer_core::Result<()> {
    let addr = listener
        .local_addr()
        .map_err(|e| io_error(e, "local_addr"))?;
    info!(%addr, "Resizer listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move {
            shutdown.wait_for_shutdown().await;
            info!("Resizer shutting down gracefully");
        })
        .await
        .map_err(|e| io_error(e, "serve"))?;

    info!("Resizer stopped");
    Ok(())
}

/// Bind the configured address and serve until `shutdown` triggers.
///
/// # Errors
///
/// Fails if the address cannot be bound or the server stops with an error.
pub async fn serve(
    config: &Config,
    state: AppState,
    shutdown: ShutdownCoordinator,
) -> resizer_core::Result<()> {
    let addr = config.server.bind_address();
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| io_error(e, format!("bind {addr}")))?;
    run(listener, state, shutdown).await
}

fn io_error(source: std::io::Error, operation: impl Into<String>) -> Error {
    Error::Io {
        source,
        path: None,
        operation: operation.into(),
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    code: &'static str,
}

/// HTTP status and machine-readable code for a pipeline error
#[must_use]
pub const fn status_for(err: &Error) -> (StatusCode, &'static str) {
    match err {
        Error::InvalidRequest { .. } => (StatusCode::BAD_REQUEST, "invalid_request"),
        Error::Fetch { .. } => (StatusCode::BAD_GATEWAY, "fetch_failed"),
        Error::FetchTimeout { .. } => (StatusCode::GATEWAY_TIMEOUT, "fetch_timeout"),
        Error::UnsupportedFormat { .. } => {
            (StatusCode::UNSUPPORTED_MEDIA_TYPE, "unsupported_format")
        }
        Error::Transform { .. } => (StatusCode::INTERNAL_SERVER_ERROR, "transform_failed"),
        Error::Cache(_) | Error::Configuration { .. } | Error::Io { .. } => {
            (StatusCode::INTERNAL_SERVER_ERROR, "internal")
        }
    }
}

fn error_response(status: StatusCode, code: &'static str, message: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorBody {
            error: message.into(),
            code,
        }),
    )
        .into_response()
}

async fn resize_handler(
    State(state): State<AppState>,
    Path((width, height, locator)): Path<(String, String, String)>,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
) -> Response {
    let span = request_span!("GET", format!("/resize/{width}/{height}/{locator}"));
    async move {
        let params = match (
            state.parse_dimension("width", &width),
            state.parse_dimension("height", &height),
        ) {
            (Ok(w), Ok(h)) => ResizeParams::new(w, h),
            (Err(e), _) | (_, Err(e)) => {
                warn!(error = %e, "Rejected resize request");
                let (status, code) = status_for(&e);
                return error_response(status, code, e.to_string());
            }
        };

        // The wildcard segment excludes the query string, which belongs to the origin URL
        let locator = match query {
            Some(query) if !query.is_empty() => format!("{locator}?{query}"),
            _ => locator,
        };

        let outcome = tokio::time::timeout(
            state.request_timeout,
            state.coordinator.handle(params, &locator, &headers),
        )
        .await;

        match outcome {
            Ok(Ok(rendered)) => (
                StatusCode::OK,
                [
                    (
                        CONTENT_TYPE,
                        HeaderValue::from_static(rendered.format.content_type()),
                    ),
                    (
                        X_CACHE.clone(),
                        HeaderValue::from_static(rendered.cache_status.as_str()),
                    ),
                ],
                rendered.payload,
            )
                .into_response(),
            Ok(Err(e)) => {
                let (status, code) = status_for(&e);
                if status.is_server_error() {
                    error!(error = %e, %status, "Resize request failed");
                } else {
                    warn!(error = %e, %status, "Resize request failed");
                }
                error_response(status, code, e.to_string())
            }
            Err(_) => {
                warn!(
                    timeout_secs = state.request_timeout.as_secs(),
                    "Resize request timed out"
                );
                error_response(
                    StatusCode::GATEWAY_TIMEOUT,
                    "request_timeout",
                    format!(
                        "request did not complete within {}s",
                        state.request_timeout.as_secs()
                    ),
                )
            }
        }
    }
    .instrument(span)
    .await
}

async fn health_check() -> &'static str {
    "ok"
}

async fn cache_stats(State(state): State<AppState>) -> Response {
    let cache = Arc::clone(state.coordinator.cache());
    match tokio::task::spawn_blocking(move || cache.stats()).await {
        Ok(stats) => (StatusCode::OK, Json(stats)).into_response(),
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, "internal", e.to_string()),
    }
}

#[derive(Debug, Default, Deserialize)]
struct ClearParams {
    #[serde(default)]
    purge: bool,
}

#[derive(Debug, Serialize)]
struct ClearResponse {
    removed: usize,
    purged: bool,
}

async fn clear_cache(
    State(state): State<AppState>,
    Query(params): Query<ClearParams>,
) -> Response {
    let cache: Arc<BoundedCache> = Arc::clone(state.coordinator.cache());
    let purge = params.purge;
    let task = tokio::task::spawn_blocking(move || {
        if purge {
            cache.purge()
        } else {
            let removed = cache.len();
            cache.clear();
            removed
        }
    });

    match task.await {
        Ok(removed) => {
            info!(removed, purge, "Cache cleared");
            (
                StatusCode::OK,
                Json(ClearResponse {
                    removed,
                    purged: purge,
                }),
            )
                .into_response()
        }
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, "internal", e.to_string()),
    }
}
