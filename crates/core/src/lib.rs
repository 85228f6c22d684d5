//! Request pipeline for the resizer service
//!
//! Turns `(width, height, locator)` requests into resized images:
//! - [`key`]: canonical locators and cache keys
//! - [`fetch`]: origin retrieval with a header allowlist and deadline
//! - [`transform`]: decode, resize and re-encode in the source format
//! - [`coordinator`]: cache lookup with fetch/transform/store on a miss
//! - [`config`]: YAML service configuration

pub mod config;
pub mod coordinator;
mod error;
pub mod fetch;
pub mod format;
pub mod key;
pub mod transform;

// Re-export error types at crate root
pub use error::{Error, Result};

pub use config::{
    CacheConfig, Config, FetchConfig, LogLevel, LoggerConfig, ServerConfig, TransformConfig,
};
pub use coordinator::{CacheStatus, Rendered, RequestCoordinator};
pub use fetch::{Fetcher, HttpFetcher};
pub use format::ImageFormat;
pub use transform::{ImageTransformer, ResizeParams, Transformed, Transformer};

// The cache crate is part of the public API through RequestCoordinator
pub use resizer_cache;
