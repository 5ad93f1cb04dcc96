// Configuration loader
// Loads ~/.qalam/config.toml (or $QALAM_CONFIG), falling back to defaults

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

use super::settings::Config;

/// Environment variable pointing at an explicit config file
pub const CONFIG_ENV: &str = "QALAM_CONFIG";

/// Default config location: ~/.qalam/config.toml
pub fn default_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".qalam/config.toml"))
}

/// Load configuration from $QALAM_CONFIG, ~/.qalam/config.toml or defaults
pub fn load_config() -> Result<Config> {
    if let Ok(path) = std::env::var(CONFIG_ENV) {
        if !path.is_empty() {
            return load_config_from(Path::new(&path));
        }
    }

    match default_config_path() {
        Some(path) if path.exists() => load_config_from(&path),
        _ => {
            tracing::debug!("No config file found, using defaults");
            Ok(Config::default())
        }
    }
}

/// Load and validate one config file
pub fn load_config_from(path: &Path) -> Result<Config> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    let config: Config = toml::from_str(&contents)
        .with_context(|| format!("Failed to parse {}", path.display()))?;

    config
        .styles
        .validate()
        .with_context(|| format!("Invalid [styles] in {}", path.display()))?;

    Ok(config)
}
