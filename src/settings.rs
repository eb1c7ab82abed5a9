//! Provider, model, API key and theme preferences

use crate::error::{Error, Result};
use crate::models::Theme;
use crate::storage::{StorageBackend, API_KEY_KEY, MODEL_KEY, PROVIDER_KEY, THEME_KEY};
use log::warn;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    #[default]
    Gemini,
    OpenRouter,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Gemini => "gemini",
            Provider::OpenRouter => "openrouter",
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            Provider::Gemini => "gemini-2.5-flash",
            Provider::OpenRouter => "google/gemini-2.5-flash",
        }
    }

    /// Environment variable consulted when no custom key is stored
    pub fn api_key_env(&self) -> &'static str {
        match self {
            Provider::Gemini => "GEMINI_API_KEY",
            Provider::OpenRouter => "OPENROUTER_API_KEY",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().trim_matches('"') {
            "gemini" => Ok(Provider::Gemini),
            "openrouter" => Ok(Provider::OpenRouter),
            other => Err(format!("Unknown provider: {}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    pub provider: Provider,
    pub model: String,
    pub api_key: Option<String>,
    pub theme: Theme,
}

impl Default for Settings {
    fn default() -> Self {
        let provider = Provider::default();
        Self {
            provider,
            model: provider.default_model().to_string(),
            api_key: None,
            theme: Theme::Dark,
        }
    }
}

impl Settings {
    /// Reads settings, falling back to defaults for missing or unreadable values
    pub fn load(storage: &dyn StorageBackend) -> Result<Self> {
        let mut settings = Settings::default();

        if let Some(raw) = storage.get(PROVIDER_KEY)? {
            match raw.parse::<Provider>() {
                Ok(provider) => {
                    settings.provider = provider;
                    settings.model = provider.default_model().to_string();
                }
                Err(e) => warn!("[Settings] ignoring stored provider: {}", e),
            }
        }
        if let Some(model) = storage.get(MODEL_KEY)? {
            if !model.trim().is_empty() {
                settings.model = model;
            }
        }
        settings.api_key = storage
            .get(API_KEY_KEY)?
            .filter(|key| !key.trim().is_empty());
        if let Some(raw) = storage.get(THEME_KEY)? {
            match raw.parse::<Theme>() {
                Ok(theme) => settings.theme = theme,
                Err(e) => warn!("[Settings] ignoring stored theme: {}", e),
            }
        }

        Ok(settings)
    }

    pub fn save(&self, storage: &dyn StorageBackend) -> Result<()> {
        storage.set(PROVIDER_KEY, self.provider.as_str())?;
        storage.set(MODEL_KEY, &self.model)?;
        storage.set(THEME_KEY, self.theme.as_str())?;
        match &self.api_key {
            Some(key) => storage.set(API_KEY_KEY, key),
            None => storage.remove(API_KEY_KEY),
        }
    }

    /// Switches provider and resets the model to that provider's default
    pub fn set_provider(&mut self, provider: Provider) {
        if self.provider != provider {
            self.provider = provider;
            self.model = provider.default_model().to_string();
        }
    }

    /// Custom key first, then the provider's environment variable
    pub fn resolve_api_key(&self) -> Result<String> {
        if let Some(key) = &self.api_key {
            return Ok(key.clone());
        }
        std::env::var(self.provider.api_key_env())
            .ok()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| {
                Error::Config(format!(
                    "{} API key not configured (set one or export {})",
                    self.provider,
                    self.provider.api_key_env()
                ))
            })
    }
}
