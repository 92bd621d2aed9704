use anyhow::{Context, Result, anyhow};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

pub const DEFAULT_LOCATION_URL: &str = "https://www.meteoblue.com/en/server/search/query3";
pub const DEFAULT_FORECAST_URL: &str = "https://my.meteoblue.com/packages/basic-day";
pub const DEFAULT_CHAT_ENDPOINT: &str = "https://api.openai.com/v1/chat/completions";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_USER: &str = "user_123456";
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful weather assistant. Use the supplied tools to assist the user. \
     Don't make assumptions about what values to plug into functions. \
     Ask for clarification if a user request is ambiguous.";
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

const METEOBLUE_KEY_ENV: &str = "METEOBLUE_API_KEY";
const OPENAI_KEY_ENV: &str = "OPENAI_API_KEY";

/// External services that need credentials.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServiceId {
    Meteoblue,
    OpenAi,
}

impl ServiceId {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceId::Meteoblue => "meteoblue",
            ServiceId::OpenAi => "openai",
        }
    }

    pub const fn all() -> &'static [ServiceId] {
        &[ServiceId::Meteoblue, ServiceId::OpenAi]
    }

    fn env_var(&self) -> &'static str {
        match self {
            ServiceId::Meteoblue => METEOBLUE_KEY_ENV,
            ServiceId::OpenAi => OPENAI_KEY_ENV,
        }
    }
}

impl std::fmt::Display for ServiceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for ServiceId {
    type Error = anyhow::Error;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.to_lowercase().as_str() {
            "meteoblue" => Ok(ServiceId::Meteoblue),
            "openai" => Ok(ServiceId::OpenAi),
            _ => Err(anyhow!("Unknown service '{value}'. Supported services: meteoblue, openai.")),
        }
    }
}

/// Location search and forecast endpoints.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MeteoblueConfig {
    pub api_key: Option<String>,
    pub location_url: String,
    pub forecast_url: String,
    pub timeout_secs: u64,
}

impl Default for MeteoblueConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            location_url: DEFAULT_LOCATION_URL.to_string(),
            forecast_url: DEFAULT_FORECAST_URL.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

/// Chat-completions service and conversation setup.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OpenAiConfig {
    pub api_key: Option<String>,
    pub model: String,
    pub endpoint: String,
    /// Opaque user id sent along with every request for abuse tracing.
    pub user: String,
    pub system_prompt: String,
    pub timeout_secs: u64,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            endpoint: DEFAULT_CHAT_ENDPOINT.to_string(),
            user: DEFAULT_USER.to_string(),
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS * 6,
        }
    }
}

/// Top-level configuration stored on disk.
///
/// Example TOML:
/// ```toml
/// [meteoblue]
/// api_key = "..."
///
/// [openai]
/// api_key = "..."
/// model = "gpt-4o-mini"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct Config {
    pub meteoblue: MeteoblueConfig,
    pub openai: OpenAiConfig,
}

impl Config {
    /// Load config from disk, or return the defaults if it doesn't exist yet.
    pub fn load() -> Result<Self> {
        let path = Self::config_file_path()?;
        Self::load_from(&path)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let cfg: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(cfg)
    }

    /// Save config to disk, creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        let path = Self::config_file_path()?;
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml =
            toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")?;

        fs::write(path, toml)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Path to the config file.
    pub fn config_file_path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("dev", "weatherbot", "weatherbot-cli")
            .ok_or_else(|| anyhow!("Could not determine platform config directory"))?;

        Ok(dirs.config_dir().join("config.toml"))
    }

    /// Let `METEOBLUE_API_KEY` / `OPENAI_API_KEY` win over the stored keys.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|name| std::env::var(name).ok());
    }

    pub fn apply_overrides_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        for id in ServiceId::all() {
            if let Some(key) = lookup(id.env_var()).filter(|k| !k.trim().is_empty()) {
                self.upsert_api_key(*id, key);
            }
        }
    }

    pub fn upsert_api_key(&mut self, id: ServiceId, api_key: String) {
        match id {
            ServiceId::Meteoblue => self.meteoblue.api_key = Some(api_key),
            ServiceId::OpenAi => self.openai.api_key = Some(api_key),
        }
    }

    /// Returns the API key for a service, if present.
    pub fn api_key(&self, id: ServiceId) -> Option<&str> {
        match id {
            ServiceId::Meteoblue => self.meteoblue.api_key.as_deref(),
            ServiceId::OpenAi => self.openai.api_key.as_deref(),
        }
    }

    pub fn require_api_key(&self, id: ServiceId) -> Result<&str> {
        self.api_key(id).ok_or_else(|| {
            anyhow!(
                "No API key configured for '{id}'.\n\
                 Hint: run `weatherbot configure {id}` or set {}.",
                id.env_var()
            )
        })
    }

    pub fn is_configured(&self, id: ServiceId) -> bool {
        self.api_key(id).is_some()
    }
}
