// Configuration structs

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::backend::CatalogConfig;
use crate::generation::{PolicyOverrides, DEFAULT_MAX_INPUT_TOKENS};
use crate::metrics::DEFAULT_SIMILARITY_THRESHOLD;
use crate::prompts::{Style, Task};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub catalog: CatalogConfig,
    pub generation: GenerationSettings,
    pub styles: StyleDefaults,
    pub logging: LoggingConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address (e.g., "127.0.0.1:9019")
    pub bind_address: String,
    /// Locale of the generic failure message ("ar" or "en")
    pub error_locale: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:9019".to_string(),
            error_locale: "ar".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationSettings {
    /// Prompts are truncated to this many tokens
    pub max_input_tokens: usize,
    /// Jaccard similarity above which a paraphrase is regenerated
    pub similarity_threshold: f64,
    /// Fixes sampling for reproducible output
    pub seed: Option<u64>,
    pub policies: PolicyOverrides,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            max_input_tokens: DEFAULT_MAX_INPUT_TOKENS,
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
            seed: None,
            policies: PolicyOverrides::default(),
        }
    }
}

/// Style used when a request omits one
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StyleDefaults {
    pub grammar: String,
    pub paraphrase: String,
    pub evasion: String,
}

impl Default for StyleDefaults {
    fn default() -> Self {
        Self {
            grammar: "standard".to_string(),
            paraphrase: "academic".to_string(),
            evasion: "standard".to_string(),
        }
    }
}

impl StyleDefaults {
    pub fn name_for(&self, task: Task) -> &str {
        match task {
            Task::GrammarCorrection => &self.grammar,
            Task::Paraphrase => &self.paraphrase,
            Task::DetectorEvasion => &self.evasion,
        }
    }

    /// Check every default names a style its task owns
    pub fn validate(&self) -> anyhow::Result<()> {
        for task in Task::ALL {
            let name = self.name_for(task);
            if Style::parse(task, name).is_none() {
                anyhow::bail!(
                    "default style '{}' is not valid for {}; allowed: {:?}",
                    name,
                    task,
                    task.allowed_styles()
                );
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter when RUST_LOG is unset
    pub level: String,
    /// Append-only log file in addition to stderr
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
        }
    }
}
