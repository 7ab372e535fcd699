//! Configuration loaded from `config.toml`, with environment overrides
//! for the API key.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

pub const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";
pub const DEFAULT_MODEL: &str = "google/gemini-2.5-flash";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub history: HistoryConfig,
    pub ai: AiConfig,
    /// Where local state lives (session database, identity file).
    pub data_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    pub backend: Backend,
    /// Base URL of the sync service. Required for the remote backend.
    pub sync_url: Option<String>,
    /// Delay between reconnect attempts to the live session feed.
    pub reconnect_secs: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    Local,
    Remote,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AiConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            backend: Backend::Local,
            sync_url: None,
            reconnect_secs: 5,
        }
    }
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
        }
    }
}

/// Directory holding `config.toml`.
pub fn config_dir() -> PathBuf {
    dirs::config_dir()
        .map(|d| d.join("walebquit"))
        .unwrap_or_else(|| PathBuf::from(".walebquit"))
}

pub fn config_path() -> PathBuf {
    config_dir().join("config.toml")
}

fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .map(|d| d.join("walebquit"))
        .unwrap_or_else(|| PathBuf::from(".walebquit"))
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        Self::load_from(&config_path())
    }

    fn load_from(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Config = toml::from_str(&content)?;
            Ok(config.with_data_dir_default())
        } else {
            Ok(Config::default().with_data_dir_default())
        }
    }

    pub fn save(&self) -> anyhow::Result<()> {
        self.save_to(&config_path())
    }

    fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// An empty `data_dir` in the file means "use the platform default".
    fn with_data_dir_default(mut self) -> Self {
        if self.data_dir.as_os_str().is_empty() {
            self.data_dir = default_data_dir();
        }
        self
    }

    /// API key resolution: `WALEBQUIT_API_KEY`, then `OPENROUTER_API_KEY`,
    /// then the config file.
    pub fn api_key(&self) -> Option<String> {
        first_key([
            std::env::var("WALEBQUIT_API_KEY").ok(),
            std::env::var("OPENROUTER_API_KEY").ok(),
            self.ai.api_key.clone(),
        ])
    }

    pub fn sessions_db_path(&self) -> PathBuf {
        self.data_dir.join("sessions.db")
    }

    pub fn identity_path(&self) -> PathBuf {
        self.data_dir.join("identity.json")
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_secs(self.history.reconnect_secs.max(1))
    }
}

fn first_key(candidates: impl IntoIterator<Item = Option<String>>) -> Option<String> {
    candidates
        .into_iter()
        .flatten()
        .find(|key| !key.trim().is_empty())
}
