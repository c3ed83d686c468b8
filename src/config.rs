//! Stream execution configuration.
//!
//! Configuration is read from a TOML file:
//!
//! ```toml
//! [limits]
//! max_scan_items = 10000
//! ```
//!
//! ## Environment Variables
//!
//! - `DOCSTREAM_MAX_SCAN_ITEMS` - overrides `limits.max_scan_items`
//!   (`0` or `unlimited` removes the limit)

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{StreamError, StreamResult};

/// Environment variable overriding the scan limit
pub const ENV_MAX_SCAN_ITEMS: &str = "DOCSTREAM_MAX_SCAN_ITEMS";

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StreamConfig {
    #[serde(default)]
    pub limits: ExecutionLimits,
}

/// Limits applied while streams run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutionLimits {
    /// Maximum number of items a source may produce in one traversal
    /// (default: unlimited)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_scan_items: Option<u64>,
}

impl ExecutionLimits {
    /// Limits suitable for embedded use on small devices
    pub fn embedded() -> Self {
        Self {
            max_scan_items: Some(10_000),
        }
    }

    /// Limits suitable for a shared server
    pub fn server() -> Self {
        Self {
            max_scan_items: Some(1_000_000),
        }
    }
}

impl StreamConfig {
    pub fn with_limits(limits: ExecutionLimits) -> Self {
        Self { limits }
    }

    /// Parse configuration from TOML text. Environment overrides are not
    /// applied.
    pub fn from_toml_str(content: &str) -> StreamResult<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Load configuration from a file and apply environment overrides.
    pub fn load(path: &Path) -> StreamResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            StreamError::ConfigError(format!("cannot read {}: {}", path.display(), e))
        })?;
        let mut config = Self::from_toml_str(&content)?;
        config.apply_env_overrides()?;
        tracing::debug!("Loaded stream config from {}: {:?}", path.display(), config);
        Ok(config)
    }

    /// Apply environment variable overrides to the configuration
    pub fn apply_env_overrides(&mut self) -> StreamResult<()> {
        if let Ok(raw) = std::env::var(ENV_MAX_SCAN_ITEMS) {
            self.limits.max_scan_items = parse_scan_limit(&raw)?;
        }
        Ok(())
    }
}

fn parse_scan_limit(raw: &str) -> StreamResult<Option<u64>> {
    let raw = raw.trim();
    if raw.eq_ignore_ascii_case("unlimited") {
        return Ok(None);
    }

    match raw.parse::<u64>() {
        Ok(0) => Ok(None),
        Ok(n) => Ok(Some(n)),
        Err(_) => Err(StreamError::ConfigError(format!(
            "{} must be a non-negative integer, got '{}'",
            ENV_MAX_SCAN_ITEMS, raw
        ))),
    }
}
