use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::config::{AppConfig, LlmConfig};
use crate::errors::{VoiceNavError, VoiceNavResult};
use crate::llm::provider::LlmProvider;
use crate::llm::providers::openai_compatible::OpenAiCompatibleProvider;
use crate::llm::types::CallConfig;

/// Registry of all available LLM providers, keyed by their config.toml identifier.
pub struct ProviderRegistry {
    providers: HashMap<String, Arc<dyn LlmProvider>>,
    active: String,
    llm_config: LlmConfig,
}

impl ProviderRegistry {
    pub fn new(active: String) -> Self {
        Self {
            providers: HashMap::new(),
            active,
            llm_config: LlmConfig::default(),
        }
    }

    pub fn register(&mut self, provider: Arc<dyn LlmProvider>) {
        self.providers.insert(provider.name().to_string(), provider);
    }

    pub fn get_active(&self) -> VoiceNavResult<Arc<dyn LlmProvider>> {
        self.providers.get(&self.active).cloned().ok_or_else(|| {
            VoiceNavError::Config(format!(
                "Active provider '{}' not found in registry",
                self.active
            ))
        })
    }

    pub fn list_names(&self) -> Vec<String> {
        self.providers.keys().cloned().collect()
    }

    /// Return the provider and call configuration for a named role.
    ///
    /// Role resolution order:
    /// 1. `[llm.roles.<role>]` in config.toml
    /// 2. Fallback: active provider with its default model and sampling parameters
    pub fn call_config_for_role(
        &self,
        role: &str,
    ) -> VoiceNavResult<(Arc<dyn LlmProvider>, CallConfig)> {
        let role_entry = match role {
            "commands" => self.llm_config.roles.commands.as_ref(),
            other => {
                tracing::warn!(role = other, "unknown role, falling back to active provider");
                None
            }
        };

        if let Some(entry) = role_entry {
            let provider = self.providers.get(&entry.provider).cloned().ok_or_else(|| {
                VoiceNavError::Config(format!(
                    "Role '{}' references unknown provider '{}'",
                    role, entry.provider
                ))
            })?;
            let defaults = self.llm_config.providers.get(&entry.provider);
            let temperature = entry
                .temperature
                .unwrap_or_else(|| defaults.map(|p| p.temperature).unwrap_or(0.1));
            let cfg = CallConfig {
                model: entry.model.clone(),
                temperature,
                max_tokens: defaults.map(|p| p.max_tokens).unwrap_or(150),
                top_p: defaults.map(|p| p.top_p).unwrap_or(0.9),
            };
            tracing::debug!(
                role = role,
                provider = %entry.provider,
                model = %cfg.model,
                temperature = cfg.temperature,
                "resolved role config"
            );
            return Ok((provider, cfg));
        }

        let provider = self.get_active()?;
        let cfg = self
            .llm_config
            .providers
            .get(&self.active)
            .map(|p| CallConfig {
                model: p.model.clone(),
                temperature: p.temperature,
                max_tokens: p.max_tokens,
                top_p: p.top_p,
            })
            .unwrap_or(CallConfig {
                model: String::new(),
                temperature: 0.1,
                max_tokens: 150,
                top_p: 0.9,
            });
        tracing::debug!(
            role = role,
            provider = %self.active,
            model = %cfg.model,
            "role not configured, using active provider fallback"
        );
        Ok((provider, cfg))
    }

    /// Build a registry from the loaded app config.
    /// API keys come from `VOICENAV_<ID>_API_KEY`, then config.toml, then `OPENAI_API_KEY`.
    pub fn from_config(config: &AppConfig) -> Self {
        let mut registry = Self {
            providers: HashMap::new(),
            active: config.llm.active_provider.clone(),
            llm_config: config.llm.clone(),
        };
        for (id, entry) in &config.llm.providers {
            let api_key = std::env::var(format!("VOICENAV_{}_API_KEY", id.to_uppercase()))
                .ok()
                .or_else(|| entry.api_key.clone())
                .or_else(|| std::env::var("OPENAI_API_KEY").ok())
                .unwrap_or_default();
            if api_key.is_empty() {
                tracing::warn!(provider = %id, "no API key configured");
            }
            let provider = OpenAiCompatibleProvider::new(
                id.clone(),
                entry.api_base.clone(),
                api_key,
                Duration::from_millis(entry.timeout_ms),
            );
            registry.register(Arc::new(provider));
        }
        registry
    }
}
