//! Configuration management system for TierCP
//!
//! This crate loads the application configuration (engine defaults, detection
//! tuning, logging) from YAML, TOML or JSON files plus `TIERCP__*` environment
//! variables, and reads the per-user storage override record.
//!
//! # Examples
//!
//! ```rust
//! use tiercp_config::ConfigBuilder;
//!
//! let config = ConfigBuilder::new()
//!     .add_source_file("tiercp.yaml")
//!     .add_env_prefix("TIERCP")
//!     .build()
//!     .expect("Failed to load configuration");
//!
//! println!("Buffer size: {}", config.engine.buffer_size.get());
//! ```

#![deny(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tiercp_types::{BufferSize, FailurePolicy};

pub mod builder;
pub mod error;
pub mod loader;
pub mod overrides;
pub mod paths;

pub use builder::ConfigBuilder;
pub use error::{ConfigError, ConfigResult};
pub use loader::ConfigLoader;
pub use overrides::{load_overrides, parse_overrides, StorageOverrides};

/// Main configuration structure for TierCP
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Transfer engine defaults
    #[serde(default)]
    pub engine: EngineSettings,
    /// Storage detection tuning
    #[serde(default)]
    pub detection: DetectionSettings,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Transfer engine defaults
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineSettings {
    /// Buffer size used when the optimizer is bypassed
    pub buffer_size: BufferSize,
    /// Stage copies through the RAM volume when it has room
    pub use_ram_staging: bool,
    /// Reaction to a failed file in a directory operation
    pub failure_policy: FailurePolicy,
    /// Copy modification times to the destination
    pub preserve_timestamps: bool,
    /// Use the optimizer's buffer size instead of `buffer_size`
    pub auto_tune: bool,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            buffer_size: BufferSize::default(),
            use_ram_staging: true,
            failure_policy: FailurePolicy::AbortOnFirst,
            preserve_timestamps: true,
            auto_tune: true,
        }
    }
}

/// Storage detection tuning
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectionSettings {
    /// Run bus-type refinement for ambiguous classifications
    pub refine: bool,
    /// PowerShell executable used for refinement
    pub powershell: String,
    /// Time budget for one refinement call, in seconds
    pub refine_timeout_secs: u64,
    /// Maximum refinement calls in flight at once
    pub max_concurrent_refinements: usize,
    /// Persist the accurate classification tier between runs
    pub persist_cache: bool,
    /// Override the persisted cache location
    pub cache_file: Option<PathBuf>,
    /// Override the storage override record location
    pub overrides_file: Option<PathBuf>,
}

impl DetectionSettings {
    /// Refinement timeout as a duration
    pub fn refine_timeout(&self) -> Duration {
        Duration::from_secs(self.refine_timeout_secs)
    }

    /// Effective persisted cache location
    pub fn cache_path(&self) -> Option<PathBuf> {
        self.cache_file.clone().or_else(paths::cache_file)
    }

    /// Effective storage override record location
    pub fn overrides_path(&self) -> Option<PathBuf> {
        self.overrides_file.clone().or_else(paths::overrides_file)
    }
}

impl Default for DetectionSettings {
    fn default() -> Self {
        Self {
            refine: true,
            powershell: "pwsh".to_string(),
            refine_timeout_secs: 10,
            max_concurrent_refinements: 2,
            persist_cache: true,
            cache_file: None,
            overrides_file: None,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    pub level: String,
    /// Enable JSON formatting
    pub json_format: bool,
    /// Also write logs to this directory
    pub log_dir: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
            log_dir: None,
        }
    }
}
