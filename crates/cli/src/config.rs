//! CLI configuration utilities

use anyhow::{Context, Result};
use panel_core::ClientConfig;
use std::path::{Path, PathBuf};

/// Default configuration file location
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("panel")
        .join("panel.json")
}

/// Load configuration from `path`, or from the default location when it
/// exists, then apply a data directory override.
pub fn load_config(path: Option<&Path>, data_dir: Option<PathBuf>) -> Result<ClientConfig> {
    let default_path = default_config_path();
    let path = match path {
        Some(path) => Some(path),
        None if default_path.exists() => Some(default_path.as_path()),
        None => None,
    };

    let mut config = ClientConfig::load(path).with_context(|| match path {
        Some(path) => format!("Failed to load configuration from {}", path.display()),
        None => "Failed to load configuration".to_string(),
    })?;

    if data_dir.is_some() {
        config.data_dir = data_dir;
    }
    Ok(config)
}

/// Write a default configuration file
pub fn generate_default_config(path: &Path) -> Result<()> {
    ClientConfig::default()
        .save(path)
        .with_context(|| format!("Failed to write configuration to {}", path.display()))
}
