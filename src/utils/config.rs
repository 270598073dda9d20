// src/utils/config.rs
//! Engine configuration
//!
//! Layered with the `config` crate: built-in defaults, then an optional
//! `config/overrides.{toml,yaml,json}` file, then `OVERRIDES__*` environment
//! variables (e.g. `OVERRIDES__OVERRIDES__PROJECT_DIR=/tmp/overrides`).

use crate::utils::errors::Result;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default quiescence window for interception pattern updates
pub const DEFAULT_THROTTLE_MS: u64 = 50;

/// Project root + encoded path length above which URLs are collapsed
pub const DEFAULT_MAX_PATH_LENGTH: usize = 200;

/// Top-level engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    pub overrides: OverridesConfig,
    pub logging: LoggingConfig,
}

/// Local overrides settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OverridesConfig {
    /// Feature toggle (`persistenceNetworkOverridesEnabled`)
    pub enabled: bool,

    /// Experiment flag gating `.headers` support
    pub header_overrides: bool,

    /// Directory used as the overrides project
    #[serde(default)]
    pub project_dir: Option<PathBuf>,

    /// Pattern recomputation window (milliseconds)
    pub throttle_ms: u64,

    /// Length threshold for the `longurls` fallback
    pub max_path_length: usize,
}

/// Logging settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive, overridden by `RUST_LOG`
    pub level: String,

    /// Emit JSON lines instead of the human-readable format
    pub json: bool,
}

impl Default for OverridesConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            header_overrides: true,
            project_dir: None,
            throttle_ms: DEFAULT_THROTTLE_MS,
            max_path_length: DEFAULT_MAX_PATH_LENGTH,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            overrides: OverridesConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from `config/overrides` and the environment
    pub fn load() -> Result<Self> {
        Self::load_from(Path::new("config/overrides"))
    }

    /// Load configuration using an explicit base file name (extension optional)
    pub fn load_from(path: &Path) -> Result<Self> {
        let defaults = Self::default();

        let settings = Config::builder()
            .set_default("overrides.enabled", defaults.overrides.enabled)?
            .set_default("overrides.header_overrides", defaults.overrides.header_overrides)?
            .set_default("overrides.throttle_ms", defaults.overrides.throttle_ms)?
            .set_default(
                "overrides.max_path_length",
                defaults.overrides.max_path_length as u64,
            )?
            .set_default("logging.level", defaults.logging.level)?
            .set_default("logging.json", defaults.logging.json)?
            .add_source(File::from(path).required(false))
            .add_source(
                Environment::with_prefix("OVERRIDES")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Ok(settings.try_deserialize()?)
    }
}
