//! Per-user locations for TierCP state
//!
//! The classification cache and the storage override record live side by side
//! in `<local data>/TierCP/`. Application configuration files live in the
//! per-user config directory.

use std::path::PathBuf;

/// Directory name shared by all TierCP state
pub const APP_DIR: &str = "TierCP";
/// Persisted classification cache file name
pub const CACHE_FILE: &str = "storage_cache.json";
/// Storage override record file name
pub const OVERRIDES_FILE: &str = "config.json";

/// `<local data>/TierCP`
pub fn app_data_dir() -> Option<PathBuf> {
    dirs::data_local_dir().map(|dir| dir.join(APP_DIR))
}

/// Location of the persisted classification cache
pub fn cache_file() -> Option<PathBuf> {
    app_data_dir().map(|dir| dir.join(CACHE_FILE))
}

/// Location of the storage override record
pub fn overrides_file() -> Option<PathBuf> {
    app_data_dir().map(|dir| dir.join(OVERRIDES_FILE))
}

/// Per-user directory searched for `config.{yaml,yml,toml,json}`
pub fn user_config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("tiercp"))
}
