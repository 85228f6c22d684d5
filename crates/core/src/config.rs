//! Service configuration
//!
//! Loaded from an optional YAML file. Every field has a default, so an empty
//! file (or no file at all) yields a runnable configuration.

use crate::transform::DEFAULT_JPEG_QUALITY;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Top-level configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct Config {
    /// Logging settings
    pub logger: LoggerConfig,
    /// Listener settings
    pub server: ServerConfig,
    /// Cache settings
    #[serde(alias = "storage")]
    pub cache: CacheConfig,
    /// Origin fetch settings
    pub fetch: FetchConfig,
    /// Re-encoding settings
    pub transform: TransformConfig,
}

/// Log verbosity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Errors only
    Error,
    /// Warnings and errors
    #[serde(alias = "warning")]
    Warn,
    /// Informational messages
    #[default]
    Info,
    /// Debug output
    Debug,
    /// Everything
    Trace,
}

impl LogLevel {
    /// Directive string understood by `tracing_subscriber::EnvFilter`
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warn => "warn",
            Self::Info => "info",
            Self::Debug => "debug",
            Self::Trace => "trace",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Logging settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct LoggerConfig {
    /// Minimum level; `RUST_LOG` takes precedence when set
    pub level: LogLevel,
}

/// Listener settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address
    pub host: String,
    /// Bind port
    pub port: u16,
    /// Largest accepted width or height
    pub max_dimension: u32,
    /// Deadline for a whole resize request
    #[serde(alias = "readTimeout")]
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            max_dimension: 8192,
            request_timeout_secs: 30,
        }
    }
}

impl ServerConfig {
    /// `host:port` string suitable for binding
    #[must_use]
    pub fn bind_address(&self) -> String {
        if self.host.contains(':') && !self.host.starts_with('[') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}

/// Cache settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CacheConfig {
    /// Maximum number of cached entries
    #[serde(alias = "file_count")]
    pub capacity: usize,
    /// Directory holding cached payloads
    pub dir: PathBuf,
    /// Index payloads already on disk at startup
    pub warm_start: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: 100,
            dir: default_cache_dir(),
            warm_start: true,
        }
    }
}

/// Origin fetch settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct FetchConfig {
    /// Per-fetch deadline
    pub timeout_secs: u64,
    /// Largest accepted origin body
    pub max_body_bytes: u64,
    /// Inbound request headers copied onto the origin request
    pub forward_headers: Vec<String>,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 10,
            max_body_bytes: 32 * 1024 * 1024,
            forward_headers: [
                "authorization",
                "cookie",
                "accept",
                "accept-language",
                "user-agent",
                "x-forwarded-for",
                "x-request-id",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
        }
    }
}

/// Re-encoding settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct TransformConfig {
    /// JPEG quality, 1 to 100
    pub jpeg_quality: u8,
}

impl Default for TransformConfig {
    fn default() -> Self {
        Self {
            jpeg_quality: DEFAULT_JPEG_QUALITY,
        }
    }
}

/// Default payload directory: the user cache dir, or the temp dir when the
/// platform has none.
#[must_use]
pub fn default_cache_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("resizer")
}

impl Config {
    /// Parse and validate configuration from a YAML document.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for malformed YAML, unknown values or
    /// settings that fail validation.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: Self = if yaml.trim().is_empty() {
            Self::default()
        } else {
            serde_yaml::from_str(yaml).map_err(|e| {
                Error::configuration_with_help(
                    format!("invalid configuration: {e}"),
                    "Top-level sections are logger, server, cache, fetch and transform",
                )
            })?
        };
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file cannot be read, otherwise the same
    /// errors as [`Config::from_yaml_str`].
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents =
            std::fs::read_to_string(path).map_err(|e| Error::io(e, path, "read config"))?;
        let config = Self::from_yaml_str(&contents)?;
        tracing::debug!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    /// Check cross-field constraints.
    ///
    /// # Errors
    ///
    /// Returns a configuration error naming the first invalid setting.
    pub fn validate(&self) -> Result<()> {
        if self.cache.capacity == 0 {
            return Err(Error::configuration_with_help(
                "cache.capacity must be at least 1",
                "Set cache.capacity to the number of resized images to keep",
            ));
        }
        if self.cache.dir.as_os_str().is_empty() {
            return Err(Error::configuration("cache.dir must not be empty"));
        }
        if self.server.port == 0 {
            return Err(Error::configuration("server.port must not be 0"));
        }
        if self.server.host.trim().is_empty() {
            return Err(Error::configuration("server.host must not be empty"));
        }
        if self.server.max_dimension == 0 {
            return Err(Error::configuration("server.max_dimension must be at least 1"));
        }
        if self.server.request_timeout_secs == 0 {
            return Err(Error::configuration(
                "server.request_timeout_secs must be at least 1",
            ));
        }
        if self.fetch.timeout_secs == 0 {
            return Err(Error::configuration("fetch.timeout_secs must be at least 1"));
        }
        if self.fetch.max_body_bytes == 0 {
            return Err(Error::configuration("fetch.max_body_bytes must be at least 1"));
        }
        if !(1..=100).contains(&self.transform.jpeg_quality) {
            return Err(Error::configuration(
                "transform.jpeg_quality must be between 1 and 100",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_empty_document_uses_defaults() {
        let config = Config::from_yaml_str("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.cache.capacity, 100);
        assert_eq!(config.fetch.timeout_secs, 10);
        assert_eq!(config.logger.level, LogLevel::Info);
        assert_eq!(config.transform.jpeg_quality, 75);
        assert!(config.cache.dir.ends_with("resizer"));
    }

    #[test]
    fn test_partial_document_keeps_other_defaults() {
        let config = Config::from_yaml_str(
            "server:\n  port: 9000\ncache:\n  capacity: 3\n  dir: /tmp/resized\n",
        )
        .unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.cache.capacity, 3);
        assert_eq!(config.cache.dir, PathBuf::from("/tmp/resized"));
        assert!(config.cache.warm_start);
    }

    #[test]
    fn test_legacy_field_names_are_accepted() {
        let yaml = "logger:\n  level: debug\nserver:\n  host: 127.0.0.1\n  port: 8081\n  readTimeout: 5\nstorage:\n  file_count: 7\n";
        let config = Config::from_yaml_str(yaml).unwrap();
        assert_eq!(config.logger.level, LogLevel::Debug);
        assert_eq!(config.server.request_timeout_secs, 5);
        assert_eq!(config.cache.capacity, 7);
    }

    #[test]
    fn test_unknown_log_level_is_rejected() {
        let err = Config::from_yaml_str("logger:\n  level: loud\n").unwrap_err();
        assert!(matches!(err, Error::Configuration { .. }));
    }

    #[test]
    fn test_validation_rejects_zero_values() {
        for yaml in [
            "cache:\n  capacity: 0\n",
            "server:\n  port: 0\n",
            "server:\n  max_dimension: 0\n",
            "fetch:\n  timeout_secs: 0\n",
            "transform:\n  jpeg_quality: 0\n",
            "transform:\n  jpeg_quality: 101\n",
        ] {
            let err = Config::from_yaml_str(yaml).unwrap_err();
            assert!(matches!(err, Error::Configuration { .. }), "yaml {yaml:?}");
        }
    }

    #[test]
    fn test_bind_address() {
        let mut server = ServerConfig::default();
        assert_eq!(server.bind_address(), "0.0.0.0:8080");
        server.host = "::1".to_string();
        assert_eq!(server.bind_address(), "[::1]:8080");
    }

    #[test]
    fn test_load_from_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.yaml");
        std::fs::write(&path, "fetch:\n  forward_headers: [authorization]\n").unwrap();
        let config = Config::load(&path).unwrap();
        assert_eq!(config.fetch.forward_headers, vec!["authorization".to_string()]);

        let err = Config::load(temp.path().join("missing.yaml")).unwrap_err();
        assert!(matches!(err, Error::Io { .. }));
    }
}
