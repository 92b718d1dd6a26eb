//! Converter bridge configuration
//!
//! Options have sensible defaults and can be overridden from the process
//! environment. Command-line front ends apply their own flags on top.
//!
//! | Variable                   | Field              | Default |
//! |----------------------------|--------------------|---------|
//! | `DOCNORM_CONVERTER`        | `executable`       | located |
//! | `DOCNORM_MEMORY_LIMIT_MB`  | `memory_limit_mb`  | 500     |
//! | `DOCNORM_TIMEOUT_SECS`     | `timeout`          | none    |
//! | `DOCNORM_DEFAULT_LANGUAGE` | `default_language` | `en`    |

use std::path::PathBuf;
use std::time::Duration;

use tracing::warn;

/// Default memory ceiling handed to the converter, in megabytes
pub const DEFAULT_MEMORY_LIMIT_MB: u64 = 500;

/// Language assumed when nothing better can be determined
pub const DEFAULT_LANGUAGE: &str = "en";

pub const ENV_CONVERTER: &str = "DOCNORM_CONVERTER";
pub const ENV_MEMORY_LIMIT_MB: &str = "DOCNORM_MEMORY_LIMIT_MB";
pub const ENV_TIMEOUT_SECS: &str = "DOCNORM_TIMEOUT_SECS";
pub const ENV_DEFAULT_LANGUAGE: &str = "DOCNORM_DEFAULT_LANGUAGE";

/// Options controlling how the converter process is located and bounded
#[derive(Debug, Clone, PartialEq)]
pub struct BridgeOptions {
    /// Explicit converter executable; `None` means use the locator cascade
    pub executable: Option<PathBuf>,
    /// Soft memory ceiling in megabytes (0 disables the ceiling flag)
    pub memory_limit_mb: u64,
    /// Wall-clock limit per conversion (`None` means wait indefinitely)
    pub timeout: Option<Duration>,
    /// Language tag used when detection has nothing to work with
    pub default_language: String,
}

impl Default for BridgeOptions {
    fn default() -> Self {
        Self {
            executable: None,
            memory_limit_mb: DEFAULT_MEMORY_LIMIT_MB,
            timeout: None,
            default_language: DEFAULT_LANGUAGE.to_string(),
        }
    }
}

impl BridgeOptions {
    /// Build options from defaults overridden by `DOCNORM_*` variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build options from an arbitrary key lookup
    ///
    /// Malformed numeric values are ignored with a warning so that a typo in
    /// the environment never prevents documents from opening.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut options = Self::default();

        if let Some(path) = lookup(ENV_CONVERTER).filter(|v| !v.trim().is_empty()) {
            options.executable = Some(PathBuf::from(path.trim()));
        }

        if let Some(raw) = lookup(ENV_MEMORY_LIMIT_MB) {
            match raw.trim().parse::<u64>() {
                Ok(limit) => options.memory_limit_mb = limit,
                Err(_) => warn!(variable = ENV_MEMORY_LIMIT_MB, value = %raw, "ignoring malformed value"),
            }
        }

        if let Some(raw) = lookup(ENV_TIMEOUT_SECS) {
            match raw.trim().parse::<u64>() {
                Ok(0) => options.timeout = None,
                Ok(secs) => options.timeout = Some(Duration::from_secs(secs)),
                Err(_) => warn!(variable = ENV_TIMEOUT_SECS, value = %raw, "ignoring malformed value"),
            }
        }

        if let Some(lang) = lookup(ENV_DEFAULT_LANGUAGE).filter(|v| !v.trim().is_empty()) {
            options.default_language = lang.trim().to_string();
        }

        options
    }
}
