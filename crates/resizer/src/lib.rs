//! resizer service library
//!
//! The binary in `main.rs` is a thin wrapper over these modules:
//! - [`cli`]: argument parsing, config overrides and exit codes
//! - [`server`]: axum router over the request coordinator
//! - [`shutdown`]: signal-driven graceful shutdown
//! - [`tracing`]: subscriber setup and request spans
//! - [`version`]: build metadata

pub mod cli;
pub mod server;
pub mod shutdown;
pub mod tracing;
pub mod version;
