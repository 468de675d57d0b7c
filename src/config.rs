// src/config.rs

//! Configuration structures for `dispmanx`.
//!
//! Settings can be supplied as a JSON file; every section and field has a
//! default, so an empty object (or no file at all) is a valid configuration.
//! Command-line options take precedence over anything read here.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Environment variable naming a configuration file.
pub const CONFIG_ENV_VAR: &str = "DISPMANX_CONFIG";

/// Represents the complete configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Which display to present on, and how.
    pub display: DisplayConfig,
    /// How long the frame stays on screen.
    pub hold: HoldConfig,
    /// Geometry of the in-memory compositor used without `bcm_host`.
    pub headless: HeadlessConfig,
}

// --- Display Configuration ---

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct DisplayConfig {
    /// dispmanx display number (try `tvservice -l` for a list).
    pub id: u32,
    /// Stacking layer of the element. Ordering is up to the platform.
    pub layer: i32,
    /// Priority passed to each update transaction.
    pub update_priority: i32,
}

// --- Hold Configuration ---

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct HoldConfig {
    /// Seconds to keep the frame visible. 0 waits for a signal.
    pub timeout_secs: u32,
}

// --- Headless Configuration ---

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct HeadlessConfig {
    pub width: u32,
    pub height: u32,
    /// Display ids that can be opened. Empty accepts any id.
    pub displays: Vec<u32>,
}

impl Default for HeadlessConfig {
    fn default() -> Self {
        HeadlessConfig {
            width: 1920,
            height: 1080,
            displays: Vec::new(),
        }
    }
}

impl HeadlessConfig {
    pub fn with_size(width: u32, height: u32) -> Self {
        HeadlessConfig {
            width,
            height,
            ..Self::default()
        }
    }
}

impl Config {
    /// Loads `path` if given, otherwise returns the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_json(&text)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_should_default_to_display_zero_layer_zero_and_no_timeout() {
        let config = Config::default();
        assert_eq!(config.display.id, 0);
        assert_eq!(config.display.layer, 0);
        assert_eq!(config.hold.timeout_secs, 0);
    }

    #[test]
    fn it_should_fill_missing_fields_with_defaults() -> Result<()> {
        let config = Config::from_json(r#"{ "display": { "id": 2 } }"#)?;
        assert_eq!(config.display.id, 2);
        assert_eq!(config.display.layer, 0);
        assert_eq!(config.headless, HeadlessConfig::default());
        Ok(())
    }

    #[test]
    fn it_should_reject_unknown_keys() {
        assert!(Config::from_json(r#"{ "display": { "idd": 2 } }"#).is_err());
    }

    #[test]
    fn it_should_return_defaults_without_a_path() -> Result<()> {
        assert_eq!(Config::load(None)?, Config::default());
        Ok(())
    }
}
