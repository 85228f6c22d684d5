//! Error types for request coordination

// Rust 1.92 compiler bug: false positives for thiserror/miette derive macro fields
// https://github.com/rust-lang/rust/issues/147648
#![allow(unused_assignments)]

use miette::Diagnostic;
use std::path::Path;
use thiserror::Error;

/// Error type for the resize pipeline
#[derive(Error, Debug, Diagnostic)]
pub enum Error {
    /// The request parameters or locator could not be understood
    #[error("Invalid request: {message}")]
    #[diagnostic(
        code(resizer::invalid_request),
        help("Expected /resize/<width>/<height>/<image-url>")
    )]
    InvalidRequest {
        /// What was wrong with the request
        message: String,
    },

    /// The origin could not be reached or answered with a non-success status
    #[error("Failed to fetch {url}: {message}")]
    #[diagnostic(code(resizer::fetch))]
    Fetch {
        /// The canonical URL that was requested
        url: String,
        /// Transport error or status description
        message: String,
    },

    /// The origin did not answer before the fetch deadline
    #[error("Fetching {url} timed out after {timeout_secs}s")]
    #[diagnostic(
        code(resizer::fetch_timeout),
        help("Increase fetch.timeout_secs if the origin is known to be slow")
    )]
    FetchTimeout {
        /// The canonical URL that was requested
        url: String,
        /// The deadline that elapsed
        timeout_secs: u64,
    },

    /// The fetched image is in a format that has no encoder
    #[error("Unsupported image format: {format}")]
    #[diagnostic(
        code(resizer::unsupported_format),
        help("Supported formats are JPEG, PNG and GIF")
    )]
    UnsupportedFormat {
        /// Name of the detected format
        format: String,
    },

    /// Decoding, resizing or encoding failed
    #[error("Image transform failed: {message}")]
    #[diagnostic(code(resizer::transform))]
    Transform {
        /// Error message from the image pipeline
        message: String,
    },

    /// Error raised by the cache layer
    #[error(transparent)]
    #[diagnostic(transparent)]
    Cache(#[from] resizer_cache::Error),

    /// Configuration or validation error
    #[error("Configuration error: {message}")]
    #[diagnostic(code(resizer::config))]
    Configuration {
        /// Error message describing the configuration issue
        message: String,
        /// Optional hint for fixing it
        #[help]
        help: Option<String>,
    },

    /// I/O error outside the cache (configuration files)
    #[error("I/O {operation} failed{}", path.as_ref().map_or(String::new(), |p| format!(": {}", p.display())))]
    #[diagnostic(
        code(resizer::io),
        help("Check file permissions and ensure the path exists")
    )]
    Io {
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
        /// Path that caused the error, if available
        path: Option<Box<Path>>,
        /// Operation that failed
        operation: String,
    },
}

impl Error {
    /// Create an invalid request error
    #[must_use]
    pub fn invalid_request(msg: impl Into<String>) -> Self {
        Self::InvalidRequest {
            message: msg.into(),
        }
    }

    /// Create a fetch error
    #[must_use]
    pub fn fetch(url: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Fetch {
            url: url.into(),
            message: msg.into(),
        }
    }

    /// Create an unsupported format error
    #[must_use]
    pub fn unsupported_format(format: impl Into<String>) -> Self {
        Self::UnsupportedFormat {
            format: format.into(),
        }
    }

    /// Create a transform error
    #[must_use]
    pub fn transform(msg: impl Into<String>) -> Self {
        Self::Transform {
            message: msg.into(),
        }
    }

    /// Create a configuration error
    #[must_use]
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration {
            message: msg.into(),
            help: None,
        }
    }

    /// Create a configuration error with help text
    #[must_use]
    pub fn configuration_with_help(msg: impl Into<String>, help: impl Into<String>) -> Self {
        Self::Configuration {
            message: msg.into(),
            help: Some(help.into()),
        }
    }

    /// Create an I/O error with path context
    #[must_use]
    pub fn io(
        source: std::io::Error,
        path: impl AsRef<Path>,
        operation: impl Into<String>,
    ) -> Self {
        Self::Io {
            source,
            path: Some(path.as_ref().into()),
            operation: operation.into(),
        }
    }

    /// Whether the error came from talking to the origin
    #[must_use]
    pub const fn is_fetch(&self) -> bool {
        matches!(self, Self::Fetch { .. } | Self::FetchTimeout { .. })
    }
}

/// Result type for the resize pipeline
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_errors_are_classified() {
        assert!(Error::fetch("http://a/b.png", "HTTP 404").is_fetch());
        assert!(
            Error::FetchTimeout {
                url: "http://a/b.png".into(),
                timeout_secs: 10
            }
            .is_fetch()
        );
        assert!(!Error::transform("bad").is_fetch());
    }

    #[test]
    fn test_display_messages() {
        assert_eq!(
            Error::unsupported_format("webp").to_string(),
            "Unsupported image format: webp"
        );
        assert_eq!(
            Error::FetchTimeout {
                url: "http://origin/x.jpg".into(),
                timeout_secs: 10
            }
            .to_string(),
            "Fetching http://origin/x.jpg timed out after 10s"
        );
    }

    #[test]
    fn test_cache_error_is_transparent() {
        let err: Error = resizer_cache::Error::configuration("capacity").into();
        assert_eq!(err.to_string(), "Cache configuration error: capacity");
    }
}
