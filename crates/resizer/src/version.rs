//! Build information reported by `resizer version`

use serde::Serialize;
use std::fmt;

/// Placeholder for build metadata that was not provided at compile time
pub const UNKNOWN: &str = "UNKNOWN";

/// Release, build date and commit of this binary
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct VersionInfo {
    /// Package version
    pub release: &'static str,
    /// Build date, from `RESIZER_BUILD_DATE` at compile time
    pub build_date: &'static str,
    /// Commit hash, from `RESIZER_GIT_HASH` at compile time
    pub git_hash: &'static str,
}

impl VersionInfo {
    /// Build information for the running binary
    #[must_use]
    pub const fn current() -> Self {
        Self {
            release: env!("CARGO_PKG_VERSION"),
            build_date: match option_env!("RESIZER_BUILD_DATE") {
                Some(date) => date,
                None => UNKNOWN,
            },
            git_hash: match option_env!("RESIZER_GIT_HASH") {
                Some(hash) => hash,
                None => UNKNOWN,
            },
        }
    }
}

impl fmt::Display for VersionInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "resizer {} (built {}, commit {})",
            self.release, self.build_date, self.git_hash
        )
    }
}
