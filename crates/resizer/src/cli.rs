//! Command-line interface

use crate::tracing::{LogLevel, TracingFormat};
use clap::{Args, Parser, Subcommand, ValueEnum};
use miette::{Diagnostic, Report};
use resizer_core::Config;
use std::io::{self, Write};
use std::path::PathBuf;
use thiserror::Error;

/// Exit codes for the CLI application
pub const EXIT_OK: i32 = 0;
/// Runtime failure exit code
pub const EXIT_RUNTIME: i32 = 1;
/// CLI or configuration error exit code
pub const EXIT_CLI: i32 = 2;

/// CLI-specific error types with proper exit code mapping
#[derive(Error, Debug, Clone, Diagnostic)]
pub enum CliError {
    /// CLI or configuration error (exit code 2)
    #[error("CLI/configuration error: {message}")]
    #[diagnostic(code(resizer::cli::config))]
    Config {
        /// The error message
        message: String,
        /// Optional help text
        #[help]
        help: Option<String>,
    },
    /// Failure while running the service (exit code 1)
    #[error("Runtime error: {message}")]
    #[diagnostic(code(resizer::cli::runtime))]
    Runtime {
        /// The error message
        message: String,
        /// Optional help text
        #[help]
        help: Option<String>,
    },
}

impl CliError {
    /// Create a new configuration error
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            help: None,
        }
    }

    /// Create a new configuration error with help text
    #[must_use]
    pub fn config_with_help(message: impl Into<String>, help: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            help: Some(help.into()),
        }
    }

    /// Create a new runtime error
    #[must_use]
    pub fn runtime(message: impl Into<String>) -> Self {
        Self::Runtime {
            message: message.into(),
            help: None,
        }
    }

    /// Create a new runtime error with help text
    #[must_use]
    pub fn runtime_with_help(message: impl Into<String>, help: impl Into<String>) -> Self {
        Self::Runtime {
            message: message.into(),
            help: Some(help.into()),
        }
    }
}

/// Convert `resizer_core::Error` to the matching `CliError` variant.
///
/// Configuration problems map to `Config` (exit code 2); everything else,
/// including an unusable cache directory, maps to `Runtime` (exit code 1).
impl From<resizer_core::Error> for CliError {
    fn from(err: resizer_core::Error) -> Self {
        match err {
            resizer_core::Error::Configuration { message, help } => Self::Config { message, help },
            resizer_core::Error::Cache(resizer_cache::Error::Configuration { message }) => {
                Self::config(message)
            }
            resizer_core::Error::Cache(resizer_cache::Error::Io { .. }) => Self::runtime_with_help(
                err.to_string(),
                "Check that cache.dir exists or can be created and is writable",
            ),
            resizer_core::Error::Io {
                source,
                path,
                operation,
            } => {
                let path_str = path
                    .as_ref()
                    .map_or(String::new(), |p| format!(" on {}", p.display()));
                Self::runtime_with_help(
                    format!("I/O {operation} failed{path_str}: {source}"),
                    "Check file permissions and ensure the path exists",
                )
            }
            other => Self::runtime(other.to_string()),
        }
    }
}

/// Map CLI error to appropriate exit code
#[must_use]
pub const fn exit_code_for(err: &CliError) -> i32 {
    match err {
        CliError::Config { .. } => EXIT_CLI,
        CliError::Runtime { .. } => EXIT_RUNTIME,
    }
}

/// Render an error to stderr through miette
#[allow(clippy::print_stderr)]
pub fn render_error(err: &CliError) {
    let report = Report::new(err.clone());
    eprintln!("{report:?}");
    // Ensure output is flushed before potential process exit
    let _ = io::stderr().flush();
}

/// Output format for `resizer version`
#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum, Default)]
pub enum OutputFormat {
    /// Plain text
    #[default]
    Text,
    /// JSON object with `Release`, `BuildDate` and `GitHash`
    Json,
}

#[derive(Parser, Debug)]
#[command(name = "resizer")]
#[command(about = "HTTP image resizing service with a persistent LRU cache")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    #[command(about = "Run the HTTP service")]
    Serve(ServeArgs),
    #[command(about = "Show version information")]
    Version {
        #[arg(long, short = 'o', value_enum, default_value_t = OutputFormat::Text)]
        output: OutputFormat,
    },
}

/// Options for `resizer serve`; each overrides the matching config file field
#[derive(Args, Debug, Default, Clone)]
pub struct ServeArgs {
    /// YAML configuration file
    #[arg(long, short = 'c', env = "RESIZER_CONFIG")]
    pub config: Option<PathBuf>,

    /// Address to bind
    #[arg(long, env = "RESIZER_HOST")]
    pub host: Option<String>,

    /// Port to bind
    #[arg(long, short = 'p', env = "RESIZER_PORT")]
    pub port: Option<u16>,

    /// Directory for cached images
    #[arg(long, env = "RESIZER_CACHE_DIR")]
    pub cache_dir: Option<PathBuf>,

    /// Maximum number of cached images
    #[arg(long, env = "RESIZER_CACHE_CAPACITY")]
    pub cache_capacity: Option<usize>,

    /// Log output format (default: json, or dev when ENV_APP=dev)
    #[arg(long, value_enum, env = "RESIZER_LOG_FORMAT")]
    pub log_format: Option<TracingFormat>,

    /// Log level, overriding logger.level
    #[arg(long, short = 'l', value_enum, env = "RESIZER_LOG_LEVEL")]
    pub log_level: Option<LogLevel>,
}

impl ServeArgs {
    /// Load the config file (if any), apply overrides and validate.
    ///
    /// # Errors
    ///
    /// Returns `CliError::Config` if the file is unreadable or invalid, or an
    /// override fails validation.
    pub fn load_config(&self) -> Result<Config, CliError> {
        let mut config = match &self.config {
            Some(path) => Config::load(path).map_err(|e| match e {
                resizer_core::Error::Io { source, .. } => CliError::config_with_help(
                    format!("cannot read config file {}: {source}", path.display()),
                    "Pass an existing YAML file to --config",
                ),
                other => CliError::from(other),
            })?,
            None => Config::default(),
        };
        self.apply(&mut config);
        config.validate()?;
        Ok(config)
    }

    /// Apply command-line overrides to a configuration
    pub fn apply(&self, config: &mut Config) {
        if let Some(host) = &self.host {
            config.server.host.clone_from(host);
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(dir) = &self.cache_dir {
            config.cache.dir.clone_from(dir);
        }
        if let Some(capacity) = self.cache_capacity {
            config.cache.capacity = capacity;
        }
        if let Some(level) = self.log_level {
            config.logger.level = level.into();
        }
    }

    /// Log format to use
    #[must_use]
    pub fn tracing_format(&self) -> TracingFormat {
        self.log_format
            .unwrap_or_else(TracingFormat::from_environment)
    }
}

/// Parse command-line arguments, exiting on `--help` or invalid input
#[must_use]
pub fn parse() -> Cli {
    Cli::parse()
}
