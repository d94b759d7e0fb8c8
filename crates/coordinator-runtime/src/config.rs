//! Runtime configuration, loaded from a TOML file.

use serde::Deserialize;
use shared_types::{Location, REGIONS, ZONES_PER_REGION};
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Errors raised while loading the configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("failed to read {path}: {error}")]
    Io {
        /// Path of the file that failed to load.
        path: String,
        /// Error message from the I/O operation.
        error: String,
    },

    /// The file is not valid TOML for this schema.
    #[error("failed to parse config: {0}")]
    Parse(String),

    /// The values are structurally unusable.
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Complete coordinator configuration.
///
/// # Config File Format
///
/// ```toml
/// prime_url = "ws://127.0.0.1:8547"
/// region_urls = ["ws://127.0.0.1:8579", "ws://127.0.0.1:8581", ""]
/// zone_urls = [
///     ["ws://127.0.0.1:8611", "ws://127.0.0.1:8643", ""],
///     ["ws://127.0.0.1:8613", "", ""],
///     ["", "", ""],
/// ]
/// location = [2, 1]
/// mine = true
/// auto = false
/// optimize = false
/// optimize_timer_mins = 10
/// rpc_timeout_secs = 10
/// seal_threads = 0
/// ```
///
/// Empty URL strings leave the corresponding registry slot unavailable.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CoordinatorConfig {
    /// WebSocket URL of the PRIME node; empty to skip.
    pub prime_url: String,
    /// One URL per REGION, in order.
    pub region_urls: Vec<String>,
    /// One row of ZONE URLs per REGION.
    pub zone_urls: Vec<Vec<String>>,
    /// Mining slice as `[region, zone]` wire integers.
    pub location: Option<[u64; 2]>,
    /// Whether to mine at all.
    pub mine: bool,
    /// Pick the starting slice automatically.
    pub auto: bool,
    /// Keep re-evaluating the slice while mining.
    pub optimize: bool,
    /// Minutes between slice re-evaluations.
    pub optimize_timer_mins: u64,
    /// Per-call RPC deadline in seconds.
    pub rpc_timeout_secs: u64,
    /// Nonce-search threads; 0 picks the CPU count.
    pub seal_threads: usize,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            prime_url: String::new(),
            region_urls: Vec::new(),
            zone_urls: Vec::new(),
            location: None,
            mine: false,
            auto: false,
            optimize: false,
            optimize_timer_mins: 10,
            rpc_timeout_secs: 10,
            seal_threads: 0,
        }
    }
}

impl CoordinatorConfig {
    /// Load and validate the configuration file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Io {
            path: path.as_ref().display().to_string(),
            error: e.to_string(),
        })?;
        Self::parse(&content)
    }

    /// Parse and validate a TOML document.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: Self =
            toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.urls().next().is_none() {
            return Err(ConfigError::Invalid(
                "no chain URLs configured; at least one is required".into(),
            ));
        }
        if self.region_urls.len() > REGIONS {
            return Err(ConfigError::Invalid(format!(
                "{} region URLs configured, topology has {REGIONS}",
                self.region_urls.len()
            )));
        }
        if self.zone_urls.len() > REGIONS
            || self.zone_urls.iter().any(|row| row.len() > ZONES_PER_REGION)
        {
            return Err(ConfigError::Invalid(format!(
                "zone URL table exceeds the {REGIONS}x{ZONES_PER_REGION} topology"
            )));
        }
        if let Some(location) = self.location() {
            if !location.is_zone() || !location.in_bounds() {
                return Err(ConfigError::Invalid(format!(
                    "location {location} does not name a zone in the topology"
                )));
            }
        }
        if self.optimize_timer_mins == 0 {
            return Err(ConfigError::Invalid(
                "optimize_timer_mins must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// The configured mining slice, if any.
    pub fn location(&self) -> Option<Location> {
        self.location
            .map(|[region, zone]| Location::from_wire(region, zone))
    }

    /// Every non-empty URL in the file.
    fn urls(&self) -> impl Iterator<Item = &String> {
        std::iter::once(&self.prime_url)
            .chain(self.region_urls.iter())
            .chain(self.zone_urls.iter().flatten())
            .filter(|url| !url.is_empty())
    }
}
