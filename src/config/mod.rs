//! Configuration management for Sage
//!
//! Settings are resolved in order:
//! 1. Global config file (`<config dir>/sage/config.json`)
//! 2. Environment variables (`SAGE_BASE_URL`)
//! 3. CLI parameters (highest priority)

pub mod settings;

use std::path::PathBuf;

pub use self::settings::GlobalConfig;

/// Get the configuration directory path
#[must_use]
pub fn config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("sage")
}

/// Get the global config file path
#[must_use]
pub fn global_config_path() -> PathBuf {
    config_dir().join("config.json")
}
