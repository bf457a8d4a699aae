use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokentrace_engine::EngineOptions;
use tokentrace_transcript::UsageScanConfig;
use tokentrace_types::EstimationConfig;

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV: &str = "TOKENTRACE_CONFIG";

/// Resolve the config file path based on priority:
/// 1. Explicit path (with tilde expansion)
/// 2. TOKENTRACE_CONFIG environment variable (with tilde expansion)
/// 3. XDG config directory
/// 4. ~/.tokentrace/config.toml (fallback for systems without XDG)
pub fn resolve_config_path(explicit_path: Option<&str>) -> Result<PathBuf> {
    if let Some(path) = explicit_path {
        return Ok(expand_tilde(path));
    }

    if let Ok(env_path) = std::env::var(CONFIG_ENV) {
        return Ok(expand_tilde(&env_path));
    }

    if let Some(config_dir) = dirs::config_dir() {
        return Ok(config_dir.join("tokentrace").join("config.toml"));
    }

    if let Some(home) = dirs::home_dir() {
        return Ok(home.join(".tokentrace").join("config.toml"));
    }

    Err(Error::Config(
        "Could not determine config path: no HOME directory or XDG config directory found"
            .to_string(),
    ))
}

/// Expand tilde (~) in paths to the user's home directory
fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/")
        && let Some(home) = dirs::home_dir()
    {
        return home.join(stripped);
    }
    PathBuf::from(path)
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// JSON dump of the operation store to read instead of a live store.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snapshot_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Where session transcripts live; defaults to `~/.claude/projects`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transcripts_root: Option<PathBuf>,
    #[serde(default)]
    pub estimation: EstimationConfig,
    #[serde(default)]
    pub usage: UsageScanConfig,
    #[serde(default)]
    pub store: StoreConfig,
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_path = Self::default_path()?;
        Self::load_from(&config_path)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let config_path = Self::default_path()?;
        self.save_to(&config_path)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn default_path() -> Result<PathBuf> {
        resolve_config_path(None)
    }

    pub fn validate(&self) -> Result<()> {
        let chars_per_token = self.estimation.chars_per_token;
        if !chars_per_token.is_finite() || chars_per_token <= 0.0 {
            return Err(Error::Config(format!(
                "estimation.chars_per_token must be positive, got {}",
                self.estimation.chars_per_token
            )));
        }
        if self.estimation.bytes_per_token == 0 {
            return Err(Error::Config(
                "estimation.bytes_per_token must be positive".to_string(),
            ));
        }
        if self.usage.tail_chunk_bytes == 0 || self.usage.max_tail_lines == 0 {
            return Err(Error::Config(
                "usage.tail_chunk_bytes and usage.max_tail_lines must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Configured transcripts root, else the host application's default.
    pub fn transcripts_root(&self) -> Option<PathBuf> {
        self.transcripts_root
            .as_deref()
            .map(|p| expand_tilde(&p.to_string_lossy()))
            .or_else(tokentrace_transcript::default_transcripts_root)
    }

    pub fn engine_options(&self) -> EngineOptions {
        EngineOptions {
            estimation: self.estimation,
        }
    }
}
