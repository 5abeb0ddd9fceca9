//! Selector configuration using Figment
//!
//! Configuration is layered:
//! 1. built-in defaults
//! 2. an optional TOML file (`config/selector.toml` unless a path is given)
//! 3. environment variables prefixed with `DAQ_SELECTOR_`, nested keys split on `__`
//!
//! # Example
//! ```no_run
//! use daq_selector::config::SelectorConfig;
//!
//! let config = SelectorConfig::load()?;
//! println!("default group: {}", config.default_group);
//! # Ok::<(), figment::Error>(())
//! ```

use daq_selector_core::PoolFilter;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default location of the configuration file.
pub const DEFAULT_CONFIG_PATH: &str = "config/selector.toml";

const VALID_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Selector settings, layered from defaults, a TOML file and `DAQ_SELECTOR_` variables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectorConfig {
    /// Acquisition group used when neither a name nor an active group is known.
    pub default_group: String,
    /// Seed list for resetting the component preselection.
    pub default_preselected_components: Vec<String>,
    /// Device pools to enumerate; empty means all.
    pub pools: Vec<String>,
    /// Pools discovery skips.
    pub pool_blacklist: Vec<String>,
    /// Canonical name of synthesized fragments.
    pub fragment_base_name: String,
    /// Logging level (trace, debug, info, warn, error)
    pub log_level: String,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            default_group: "nxsmntgrp".to_string(),
            default_preselected_components: Vec::new(),
            pools: Vec::new(),
            pool_blacklist: Vec::new(),
            fragment_base_name: "__dynamic_component__".to_string(),
            log_level: "info".to_string(),
        }
    }
}

impl SelectorConfig {
    /// Load from [`DEFAULT_CONFIG_PATH`] and the environment.
    pub fn load() -> Result<Self, figment::Error> {
        Self::load_from(DEFAULT_CONFIG_PATH)
    }

    /// Load from a specific file path; a missing file leaves the defaults in place.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, figment::Error> {
        Self::figment(path.as_ref()).extract()
    }

    fn figment(path: &Path) -> Figment {
        Figment::from(Serialized::defaults(Self::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed("DAQ_SELECTOR_").split("__"))
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> Result<(), String> {
        if self.default_group.trim().is_empty() {
            return Err("default_group must not be empty".to_string());
        }
        if self.fragment_base_name.trim().is_empty() {
            return Err("fragment_base_name must not be empty".to_string());
        }
        if !VALID_LEVELS.contains(&self.log_level.to_lowercase().as_str()) {
            return Err(format!(
                "Invalid log_level '{}'. Must be one of: {}",
                self.log_level,
                VALID_LEVELS.join(", ")
            ));
        }
        if let Some(pool) = self.pools.iter().find(|p| self.pool_blacklist.contains(p)) {
            return Err(format!("pool '{pool}' is both requested and blacklisted"));
        }
        Ok(())
    }

    /// Pool filter handed to device discovery.
    pub fn pool_filter(&self) -> PoolFilter {
        PoolFilter {
            pools: self.pools.clone(),
            blacklist: self.pool_blacklist.clone(),
        }
    }
}
