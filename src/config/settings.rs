//! Global settings

use std::{fs, path::Path};

use serde::{Deserialize, Serialize};

use crate::error::{Result, SageError};

/// Global configuration (stored in `<config dir>/sage/config.json`)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlobalConfig {
    /// API root of the assistant backend
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Prefer streamed replies
    #[serde(default = "default_true")]
    pub stream: bool,

    /// Timeout for single-shot requests and stream connection setup
    #[serde(default = "default_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Verbose logging enabled
    #[serde(default)]
    pub verbose: bool,
}

fn default_base_url() -> String {
    "http://127.0.0.1:8000/api/v1".to_string()
}

fn default_true() -> bool {
    true
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            stream: true,
            request_timeout_secs: default_timeout_secs(),
            verbose: false,
        }
    }
}

impl GlobalConfig {
    /// Load global configuration from disk, then apply environment overrides
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from_path(&super::global_config_path())?;

        if let Ok(base_url) = std::env::var("SAGE_BASE_URL") {
            config.base_url = base_url;
        }

        Ok(config)
    }

    /// Load configuration from a specific path
    ///
    /// A missing file yields the defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed
    pub fn load_from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path).map_err(|e| SageError::ConfigParse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        serde_json::from_str(&contents).map_err(|e| SageError::ConfigParse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Save configuration to disk
    ///
    /// # Errors
    ///
    /// Returns an error if the config directory or file cannot be written
    pub fn save(&self) -> Result<()> {
        let path = super::global_config_path();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}
