//! Which provider to use, with what key and model.

use serde::{Deserialize, Serialize};

use super::Provider;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderSettings {
    #[serde(default)]
    pub api_key: Option<String>,
    /// Overrides [`Provider::default_model`].
    #[serde(default)]
    pub model: Option<String>,
}

/// The `[completion]` config table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionSettings {
    /// Preferred provider; used whenever it has a key.
    #[serde(default = "default_provider")]
    pub provider: Provider,
    #[serde(default)]
    pub groq: ProviderSettings,
    #[serde(default)]
    pub gemini: ProviderSettings,
    #[serde(default)]
    pub anthropic: ProviderSettings,
    #[serde(default)]
    pub openai: ProviderSettings,
}

fn default_provider() -> Provider {
    Provider::Anthropic
}

impl Default for CompletionSettings {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            groq: ProviderSettings::default(),
            gemini: ProviderSettings::default(),
            anthropic: ProviderSettings::default(),
            openai: ProviderSettings::default(),
        }
    }
}

impl CompletionSettings {
    pub fn get(&self, provider: Provider) -> &ProviderSettings {
        match provider {
            Provider::Groq => &self.groq,
            Provider::Gemini => &self.gemini,
            Provider::Anthropic => &self.anthropic,
            Provider::OpenAI => &self.openai,
        }
    }

    fn get_mut(&mut self, provider: Provider) -> &mut ProviderSettings {
        match provider {
            Provider::Groq => &mut self.groq,
            Provider::Gemini => &mut self.gemini,
            Provider::Anthropic => &mut self.anthropic,
            Provider::OpenAI => &mut self.openai,
        }
    }

    /// The configured key, ignoring blank values.
    pub fn credential(&self, provider: Provider) -> Option<&str> {
        self.get(provider)
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
    }

    pub fn model(&self, provider: Provider) -> &str {
        self.get(provider)
            .model
            .as_deref()
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| provider.default_model())
    }

    pub fn with_key(mut self, provider: Provider, key: impl Into<String>) -> Self {
        self.get_mut(provider).api_key = Some(key.into());
        self
    }

    pub fn with_provider(mut self, provider: Provider) -> Self {
        self.provider = provider;
        self
    }

    /// Fill unset keys from [`Provider::env_key`] variables, looked up
    /// through `lookup`.
    pub fn fill_keys_from_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        for provider in Provider::PRIORITY {
            if self.credential(provider).is_some() {
                continue;
            }
            if let Some(key) = lookup(provider.env_key()).filter(|k| !k.trim().is_empty()) {
                tracing::debug!(%provider, "API key taken from environment");
                self.get_mut(provider).api_key = Some(key);
            }
        }
    }
}
