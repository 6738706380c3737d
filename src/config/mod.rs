//! Configuration management for sift.
//!
//! Configuration is read from `~/.config/sift/config.toml` at startup.
//! If the file doesn't exist, a default configuration with comments is
//! created. The oracle API credential is never stored in the file; only
//! the name of the environment variable holding it is.

use std::fs;
use std::io::Write;
use std::path::PathBuf;

use serde::Deserialize;

use crate::app::{Result, SiftError};
use crate::domain::SourcePriority;

/// Retained classified rows per category.
pub const HISTORY_LIMIT: usize = 300;
/// Store connections kept in the pool.
pub const POOL_SIZE: usize = 4;
/// Maximum in-flight item fetches per source.
pub const WORKERS: usize = 10;
/// Fetch waves before a failing id is dropped.
pub const MAX_WAVES: usize = 3;
/// Oracle rounds before an unresolved batch aborts the run.
pub const MAX_ROUNDS: usize = 3;
/// Page size for tab reads.
pub const PAGE_SIZE: usize = 50;
/// Exemplars per category sent to the oracle.
pub const EXEMPLAR_LIMIT: usize = 100;

/// Main configuration struct.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub oracle: OracleConfig,
    pub sources: SourcesConfig,
}

/// Classification oracle endpoint settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OracleConfig {
    pub base_url: String,
    pub model: String,
    pub api_key_env: String,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".into(),
            model: "gpt-4o-mini".into(),
            api_key_env: "SIFT_ORACLE_API_KEY".into(),
        }
    }
}

impl OracleConfig {
    /// Resolve the API credential from the configured environment variable.
    pub fn api_key(&self) -> Result<String> {
        std::env::var(&self.api_key_env).map_err(|_| {
            SiftError::Config(format!(
                "oracle API key not set: export {}",
                self.api_key_env
            ))
        })
    }
}

/// Feed source settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SourcesConfig {
    /// Ranked source prefixes for the liked/disliked tab ordering.
    pub priority: Vec<String>,
    /// Only the first page of Lobsters results is considered available.
    /// This is a known scope limitation of the hottest endpoint, kept
    /// configurable rather than silently worked around.
    pub lobsters_first_page_only: bool,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            priority: vec!["lobsters".into(), "hn".into()],
            lobsters_first_page_only: true,
        }
    }
}

impl SourcesConfig {
    pub fn priority(&self) -> SourcePriority {
        SourcePriority::new(self.priority.clone())
    }
}

impl Config {
    /// Load configuration from the default path.
    ///
    /// Creates a commented default file if none exists. Missing fields in
    /// an existing file fall back to defaults.
    pub fn load() -> Result<Self> {
        let config_path = Self::default_config_path()?;

        if !config_path.exists() {
            Self::create_default_config(&config_path)?;
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&config_path)?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| SiftError::Config(format!("{}: {}", config_path.display(), e)))?;

        Ok(config)
    }

    /// Default config file path: `~/.config/sift/config.toml`
    pub fn default_config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| SiftError::Config("Could not find config directory".into()))?;
        Ok(config_dir.join("sift").join("config.toml"))
    }

    fn create_default_config(path: &PathBuf) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut file = fs::File::create(path)?;
        file.write_all(Self::default_config_content().as_bytes())?;
        Ok(())
    }

    fn default_config_content() -> String {
        r##"# sift configuration

[oracle]
# OpenAI-compatible chat completions endpoint.
base_url = "https://api.openai.com/v1"
model = "gpt-4o-mini"
# Name of the environment variable holding the API credential.
api_key_env = "SIFT_ORACLE_API_KEY"

[sources]
# Ranked source prefixes: earlier entries surface first in the
# liked/disliked tabs.
priority = ["lobsters", "hn"]
# The Lobsters hottest endpoint only returns its first page.
lobsters_first_page_only = true
"##
        .to_string()
    }
}
