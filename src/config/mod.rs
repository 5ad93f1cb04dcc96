// Configuration module
// Public interface for configuration loading

mod backend;
mod loader;
mod settings;

pub use backend::{BackendDevice, CatalogConfig, ModelChains, Precision, TaskChains};
pub use loader::{default_config_path, load_config, load_config_from, CONFIG_ENV};
pub use settings::{Config, GenerationSettings, LoggingConfig, ServerConfig, StyleDefaults};
