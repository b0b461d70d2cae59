use crate::core::error::ChatError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::PathBuf;
use std::str::FromStr;

fn default_true() -> bool {
    true
}

/// OpenAI-compatible chat services the client knows how to reach.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    OpenAI,
    OpenRouter,
    DeepSeek,
}

impl Provider {
    pub const ALL: [Provider; 3] = [Provider::OpenAI, Provider::OpenRouter, Provider::DeepSeek];

    pub fn name(&self) -> &'static str {
        match self {
            Provider::OpenAI => "openai",
            Provider::OpenRouter => "openrouter",
            Provider::DeepSeek => "deepseek",
        }
    }

    pub fn default_base_url(&self) -> &'static str {
        match self {
            Provider::OpenAI => "https://api.openai.com/v1",
            Provider::OpenRouter => "https://openrouter.ai/api/v1",
            Provider::DeepSeek => "https://api.deepseek.com/v1",
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            Provider::OpenAI => "gpt-4.1-mini",
            Provider::OpenRouter => "google/gemini-2.0-flash-001",
            Provider::DeepSeek => "deepseek-chat",
        }
    }

    pub fn api_key_env(&self) -> &'static str {
        match self {
            Provider::OpenAI => "OPENAI_API_KEY",
            Provider::OpenRouter => "OPENROUTER_API_KEY",
            Provider::DeepSeek => "DEEPSEEK_API_KEY",
        }
    }
}

impl Default for Provider {
    fn default() -> Self {
        Provider::OpenAI
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Provider {
    type Err = ChatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Provider::ALL
            .into_iter()
            .find(|p| p.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                let known: Vec<&str> = Provider::ALL.iter().map(|p| p.name()).collect();
                ChatError::Config(format!(
                    "Unsupported provider: {} (expected one of: {})",
                    s.trim(),
                    known.join(", ")
                ))
            })
    }
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub model: Option<String>,
    /// Sent as `HTTP-Referer` for services that attribute traffic by site.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub site_url: Option<String>,
}

/// Persisted settings in `~/.schat/config.yaml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub active_provider: Option<Provider>,
    #[serde(default = "default_true")]
    pub stream: bool,
    #[serde(default)]
    pub system_prompt: Option<String>,
    #[serde(default)]
    pub providers: HashMap<Provider, ProviderConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            active_provider: None,
            stream: true,
            system_prompt: None,
            providers: HashMap::new(),
        }
    }
}

impl Config {
    fn config_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".schat")
    }

    fn config_path() -> PathBuf {
        Self::config_dir().join("config.yaml")
    }

    pub fn history_dir() -> PathBuf {
        Self::config_dir().join("history")
    }

    pub fn input_history_path() -> PathBuf {
        Self::config_dir().join("input_history.txt")
    }

    /// Loads the config file, writing a default one on first run.
    pub fn load() -> Result<Config, ChatError> {
        let path = Self::config_path();

        if path.exists() {
            let contents = fs::read_to_string(&path)?;
            return serde_yml::from_str::<Config>(&contents)
                .map_err(|e| ChatError::Config(format!("Parse {}: {}", path.display(), e)));
        }

        let config = Config::default();
        if let Err(e) = config.save() {
            tracing::warn!("could not write default config to {}: {}", path.display(), e);
        }
        Ok(config)
    }

    pub fn save(&self) -> Result<(), ChatError> {
        let path = Self::config_path();
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }

        let yaml_content = serde_yml::to_string(self)?;
        fs::write(&path, yaml_content)?;
        Ok(())
    }

    pub fn provider_config(&self, provider: Provider) -> ProviderConfig {
        self.providers.get(&provider).cloned().unwrap_or_default()
    }

    /// Model configured for the provider, or the provider's stock default.
    pub fn model_for(&self, provider: Provider) -> String {
        self.provider_config(provider)
            .model
            .unwrap_or_else(|| provider.default_model().to_string())
    }
}
