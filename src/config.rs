//! Model configuration, built-in defaults and environment loading
//!
//! A [`ModelConfig`] identifies exactly one backend target. Configs are
//! treated as values: the registry derives a normalized copy instead of
//! mutating the caller's config.

use crate::internals::retry::RetryPolicy;
use crate::logging::log_debug;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Model used when nothing else matches a model string.
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";

/// Default OpenAI embedding model.
pub const DEFAULT_OPENAI_EMBEDDING_MODEL: &str = "text-embedding-3-small";

/// Default Gemini embedding model.
pub const DEFAULT_GEMINI_EMBEDDING_MODEL: &str = "gemini-embedding-001";

// ============================================================================
// Provider identity
// ============================================================================

/// Provider tag carried by a model configuration.
///
/// Parsed case-insensitively. Tags the crate does not know are kept verbatim
/// in [`ModelProvider::Other`] and routed to the custom adapter.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ModelProvider {
    Gemini,
    OpenAI,
    Claude,
    Qwen,
    DeepSeek,
    Moonshot,
    Zhipu,
    MiniMax,
    OpenAICompatible,
    ClaudeCompatible,
    Custom,
    Other(String),
}

impl ModelProvider {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Gemini => "gemini",
            Self::OpenAI => "openai",
            Self::Claude => "claude",
            Self::Qwen => "qwen",
            Self::DeepSeek => "deepseek",
            Self::Moonshot => "moonshot",
            Self::Zhipu => "zhipu",
            Self::MiniMax => "minimax",
            Self::OpenAICompatible => "openai-compatible",
            Self::ClaudeCompatible => "claude-compatible",
            Self::Custom => "custom",
            Self::Other(tag) => tag,
        }
    }

    pub fn parse(tag: &str) -> Self {
        match tag.trim().to_lowercase().as_str() {
            "gemini" | "google" => Self::Gemini,
            "openai" => Self::OpenAI,
            "claude" | "anthropic" => Self::Claude,
            "qwen" | "dashscope" => Self::Qwen,
            "deepseek" => Self::DeepSeek,
            "moonshot" | "kimi" => Self::Moonshot,
            "zhipu" | "glm" => Self::Zhipu,
            "minimax" => Self::MiniMax,
            "openai-compatible" | "openai_compatible" => Self::OpenAICompatible,
            "claude-compatible" | "claude_compatible" => Self::ClaudeCompatible,
            "custom" => Self::Custom,
            _ => Self::Other(tag.trim().to_string()),
        }
    }

    /// Environment variables holding this provider's API key, in lookup order.
    pub fn api_key_env_vars(&self) -> &'static [&'static str] {
        match self {
            Self::OpenAI => &["OPENAI_API_KEY"],
            Self::Claude => &["CLAUDE_API_KEY", "ANTHROPIC_API_KEY"],
            Self::Qwen => &["QWEN_CODER_API_KEY", "QWEN_API_KEY", "DASHSCOPE_API_KEY"],
            Self::Gemini => &["GEMINI_API_KEY", "GOOGLE_API_KEY"],
            Self::DeepSeek => &["DEEPSEEK_API_KEY"],
            Self::Moonshot => &["MOONSHOT_API_KEY"],
            Self::Zhipu => &["ZHIPU_API_KEY"],
            Self::MiniMax => &["MINIMAX_API_KEY"],
            Self::Custom => &["CUSTOM_API_KEY", "LOCAL_API_KEY"],
            Self::OpenAICompatible | Self::ClaudeCompatible | Self::Other(_) => &[],
        }
    }

    pub fn base_url_env_var(&self) -> Option<&'static str> {
        match self {
            Self::OpenAI => Some("OPENAI_BASE_URL"),
            Self::Claude => Some("CLAUDE_BASE_URL"),
            Self::Qwen => Some("QWEN_BASE_URL"),
            Self::Custom => Some("CUSTOM_MODEL_URL"),
            _ => None,
        }
    }

    pub fn default_base_url(&self) -> Option<&'static str> {
        match self {
            Self::OpenAI => Some("https://api.openai.com/v1"),
            Self::Claude => Some("https://api.anthropic.com/v1"),
            Self::Qwen => Some("https://dashscope.aliyuncs.com/compatible-mode/v1"),
            Self::Gemini => Some("https://generativelanguage.googleapis.com/v1beta"),
            Self::DeepSeek => Some("https://api.deepseek.com/v1"),
            Self::Moonshot => Some("https://api.moonshot.cn/v1"),
            Self::Zhipu => Some("https://open.bigmodel.cn/api/paas/v4"),
            Self::MiniMax => Some("https://api.minimax.chat/v1"),
            _ => None,
        }
    }

    /// Model used for the `<provider>:default` environment config.
    pub(crate) fn env_default_model(&self) -> Option<&'static str> {
        match self {
            Self::OpenAI => Some("gpt-4o"),
            Self::Claude => Some("claude-3-5-sonnet-20241022"),
            Self::Qwen => Some("qwen-coder-turbo"),
            Self::Gemini => Some(DEFAULT_MODEL),
            Self::DeepSeek => Some("deepseek-chat"),
            Self::Moonshot => Some("moonshot-v1-8k"),
            Self::Zhipu => Some("glm-4"),
            Self::MiniMax => Some("abab6.5s-chat"),
            _ => None,
        }
    }
}

impl fmt::Display for ModelProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for ModelProvider {
    fn from(tag: String) -> Self {
        Self::parse(&tag)
    }
}

impl From<&str> for ModelProvider {
    fn from(tag: &str) -> Self {
        Self::parse(tag)
    }
}

impl From<ModelProvider> for String {
    fn from(provider: ModelProvider) -> Self {
        provider.as_str().to_string()
    }
}

/// How the adapter authenticates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AuthType {
    #[default]
    #[serde(rename = "api-key")]
    ApiKey,
    #[serde(rename = "oauth")]
    OAuth,
    #[serde(rename = "vertex-ai")]
    VertexAi,
    #[serde(rename = "custom-auth")]
    CustomAuth,
}

/// Wire format spoken by a custom endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CustomResponseFormat {
    #[default]
    OpenAI,
    Claude,
    Raw,
}

impl CustomResponseFormat {
    pub fn parse(format: &str) -> Self {
        match format.trim().to_lowercase().as_str() {
            "claude" | "anthropic" => Self::Claude,
            "raw" => Self::Raw,
            _ => Self::OpenAI,
        }
    }
}

/// What a model is known to support. Informational.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelCapabilities {
    pub streaming: bool,
    pub function_calling: bool,
    pub vision: bool,
    pub embeddings: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_context_tokens: Option<u32>,
}

impl ModelCapabilities {
    fn chat(max_context_tokens: u32) -> Self {
        Self {
            streaming: true,
            function_calling: true,
            vision: true,
            embeddings: false,
            max_context_tokens: Some(max_context_tokens),
        }
    }
}

/// Adapter-specific knobs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelOptions {
    /// Overrides the provider's default embedding model
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding_model: Option<String>,
    /// Custom adapter only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_format: Option<CustomResponseFormat>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completion_endpoint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding_endpoint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub models_endpoint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub health_endpoint: Option<String>,
    /// Used when a request carries no `max_tokens`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

// ============================================================================
// ModelConfig
// ============================================================================

/// Identifies exactly one backend target.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelConfig {
    pub provider: ModelProvider,
    pub model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(default)]
    pub auth_type: AuthType,
    #[serde(default)]
    pub custom_headers: HashMap<String, String>,
    /// Explicit adapter selection, bypassing the provider table
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub adapter_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capabilities: Option<ModelCapabilities>,
    #[serde(default)]
    pub options: ModelOptions,
    #[serde(default)]
    pub retry_policy: RetryPolicy,
    /// Caller's provider tag, kept after the registry rewrites `provider`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_provider: Option<ModelProvider>,
}

impl fmt::Debug for ModelConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelConfig")
            .field("provider", &self.provider)
            .field("model", &self.model)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("base_url", &self.base_url)
            .field("auth_type", &self.auth_type)
            .field("adapter_type", &self.adapter_type)
            .field("original_provider", &self.original_provider)
            .finish_non_exhaustive()
    }
}

impl ModelConfig {
    pub fn new(provider: impl Into<ModelProvider>, model: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            model: model.into(),
            api_key: None,
            base_url: None,
            auth_type: AuthType::ApiKey,
            custom_headers: HashMap::new(),
            adapter_type: None,
            capabilities: None,
            options: ModelOptions::default(),
            retry_policy: RetryPolicy::default(),
            original_provider: None,
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn with_adapter_type(mut self, adapter_type: impl Into<String>) -> Self {
        self.adapter_type = Some(adapter_type.into());
        self
    }

    pub fn with_options(mut self, options: ModelOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.retry_policy = retry_policy;
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.custom_headers.insert(name.into(), value.into());
        self
    }

    fn with_capabilities(mut self, capabilities: ModelCapabilities) -> Self {
        self.capabilities = Some(capabilities);
        self
    }

    /// Provider the caller asked for, before normalization.
    pub fn effective_provider(&self) -> &ModelProvider {
        self.original_provider.as_ref().unwrap_or(&self.provider)
    }

    /// Tag used in logs and errors.
    pub fn provider_tag(&self) -> &str {
        self.effective_provider().as_str()
    }

    /// `provider:model` string as accepted by [`parse_model_string`].
    pub fn qualified_name(&self) -> String {
        format!("{}:{}", self.provider_tag(), self.model)
    }

    /// Identity of the adapter instance serving this config.
    pub fn cache_key(&self) -> String {
        format!(
            "{}:{}:{}",
            self.provider_tag(),
            self.model,
            self.base_url.as_deref().unwrap_or("default")
        )
    }

    /// Explicit base URL, else the provider's well-known endpoint.
    pub fn resolved_base_url(&self) -> Option<String> {
        self.base_url
            .clone()
            .or_else(|| {
                self.effective_provider()
                    .default_base_url()
                    .map(str::to_string)
            })
            .map(|url| url.trim_end_matches('/').to_string())
    }

    /// Explicit key first, then the provider's environment variables in order.
    pub fn resolve_api_key(&self) -> Option<String> {
        self.resolve_api_key_with(|name| std::env::var(name).ok())
    }

    pub fn resolve_api_key_with<F>(&self, lookup: F) -> Option<String>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = self.api_key.as_ref().filter(|k| !k.is_empty()) {
            return Some(key.clone());
        }
        self.effective_provider()
            .api_key_env_vars()
            .iter()
            .find_map(|name| lookup(name).filter(|v| !v.is_empty()))
    }

    /// Fill credentials and base URL missing here from an environment config
    /// of the same provider.
    pub fn merged_with(mut self, env_config: Option<&ModelConfig>) -> Self {
        if let Some(env_config) = env_config {
            if self.api_key.is_none() {
                self.api_key = env_config.api_key.clone();
            }
            if self.base_url.is_none() {
                self.base_url = env_config.base_url.clone();
            }
        }
        self
    }
}

// ============================================================================
// Built-in defaults
// ============================================================================

/// Named model configurations plus the model used when nothing matches.
///
/// An explicit value handed to the service, never module-level state.
#[derive(Debug, Clone)]
pub struct ModelDefaults {
    configs: HashMap<String, ModelConfig>,
    default_model: String,
}

impl Default for ModelDefaults {
    fn default() -> Self {
        Self::builtin()
    }
}

impl ModelDefaults {
    pub fn new(configs: HashMap<String, ModelConfig>, default_model: impl Into<String>) -> Self {
        Self {
            configs,
            default_model: default_model.into(),
        }
    }

    pub fn builtin() -> Self {
        let gemini = |model: &str| {
            ModelConfig::new(ModelProvider::Gemini, model)
                .with_capabilities(ModelCapabilities::chat(1_048_576))
        };
        let openai = |model: &str| {
            ModelConfig::new(ModelProvider::OpenAI, model)
                .with_base_url("https://api.openai.com/v1")
                .with_capabilities(ModelCapabilities::chat(128_000))
        };
        let claude = |model: &str| {
            ModelConfig::new(ModelProvider::Claude, model)
                .with_base_url("https://api.anthropic.com/v1")
                .with_capabilities(ModelCapabilities::chat(200_000))
        };

        let configs = HashMap::from([
            ("gemini-2.5-pro".to_string(), gemini("gemini-2.5-pro")),
            ("gemini-2.5-flash".to_string(), gemini("gemini-2.5-flash")),
            (
                "gemini-2.5-flash-lite".to_string(),
                gemini("gemini-2.5-flash-lite"),
            ),
            ("gpt-4o".to_string(), openai("gpt-4o")),
            ("gpt-4o-mini".to_string(), openai("gpt-4o-mini")),
            ("gpt-4-turbo".to_string(), openai("gpt-4-turbo")),
            (
                "claude-3-5-sonnet".to_string(),
                claude("claude-3-5-sonnet-20241022"),
            ),
            (
                "claude-3-5-haiku".to_string(),
                claude("claude-3-5-haiku-20241022"),
            ),
        ]);

        Self::new(configs, DEFAULT_MODEL)
    }

    pub fn get(&self, name: &str) -> Option<&ModelConfig> {
        self.configs.get(name)
    }

    pub fn default_model(&self) -> &str {
        &self.default_model
    }

    pub fn names(&self) -> impl Iterator<Item = &String> {
        self.configs.keys()
    }
}

/// Split `provider:model` at the first colon.
///
/// A string without a colon is a bare model name.
pub fn parse_model_string(model_string: &str) -> (Option<ModelProvider>, String) {
    match model_string.split_once(':') {
        Some((provider, model)) if !provider.is_empty() => {
            (Some(ModelProvider::parse(provider)), model.to_string())
        }
        _ => (None, model_string.to_string()),
    }
}

/// Guess the provider from a bare model name.
fn detect_provider(model: &str) -> Option<ModelProvider> {
    let lower = model.to_lowercase();
    if lower.starts_with("gpt-") || lower.starts_with("o1") || lower.starts_with("o3") {
        Some(ModelProvider::OpenAI)
    } else if lower.starts_with("claude") {
        Some(ModelProvider::Claude)
    } else if lower.starts_with("qwen") {
        Some(ModelProvider::Qwen)
    } else if lower.starts_with("deepseek") {
        Some(ModelProvider::DeepSeek)
    } else if lower.starts_with("gemini") {
        Some(ModelProvider::Gemini)
    } else {
        None
    }
}

/// Resolve a model string to a configuration.
///
/// Lookup order: custom configs, built-in defaults by full string, built-in
/// defaults by model part, explicit `provider:model`, name heuristics, and
/// finally Gemini.
pub fn get_model_config(
    model_string: &str,
    custom_configs: &HashMap<String, ModelConfig>,
    defaults: &ModelDefaults,
) -> ModelConfig {
    let (provider, model) = parse_model_string(model_string);

    if let Some(config) = custom_configs.get(model_string) {
        return config.clone();
    }
    if let Some(config) = defaults.get(model_string) {
        return config.clone();
    }
    if let Some(config) = defaults.get(&model) {
        let provider_matches = provider
            .as_ref()
            .map_or(true, |p| *p == config.provider);
        if provider_matches {
            return config.clone();
        }
    }
    if let Some(provider) = provider {
        return ModelConfig::new(provider, model);
    }
    if let Some(provider) = detect_provider(&model) {
        return ModelConfig::new(provider, model);
    }

    log_debug!(model = %model_string, "Unknown model, using Gemini configuration");
    ModelConfig::new(ModelProvider::Gemini, model)
}

// ============================================================================
// Environment configuration
// ============================================================================

/// Providers that can be configured from the environment alone, in fallback
/// preference order.
const ENV_PROVIDERS: [ModelProvider; 8] = [
    ModelProvider::OpenAI,
    ModelProvider::Claude,
    ModelProvider::Qwen,
    ModelProvider::DeepSeek,
    ModelProvider::Moonshot,
    ModelProvider::Zhipu,
    ModelProvider::MiniMax,
    ModelProvider::Gemini,
];

/// `<provider>:default` configs built from environment credentials.
#[derive(Debug, Clone, Default)]
pub struct EnvironmentConfigs {
    configs: Vec<(String, ModelConfig)>,
}

impl EnvironmentConfigs {
    /// Read the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from any variable lookup, so tests need not touch the process
    /// environment.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let mut configs = Vec::new();

        for provider in ENV_PROVIDERS {
            let Some(api_key) = provider.api_key_env_vars().iter().find_map(|n| get(*n)) else {
                continue;
            };
            let Some(model) = provider.env_default_model() else {
                continue;
            };
            let base_url = provider
                .base_url_env_var()
                .and_then(|n| get(n))
                .or_else(|| provider.default_base_url().map(str::to_string));

            let mut config = ModelConfig::new(provider.clone(), model).with_api_key(api_key);
            config.base_url = base_url;
            configs.push((format!("{provider}:default"), config));
        }

        if let Some(url) = get("CUSTOM_MODEL_URL") {
            let model = get("CUSTOM_MODEL_NAME").unwrap_or_else(|| "custom-model".to_string());
            let mut config = ModelConfig::new(ModelProvider::Custom, model).with_base_url(url);
            config.api_key = ModelProvider::Custom
                .api_key_env_vars()
                .iter()
                .find_map(|n| get(*n));
            config.options.response_format = get("CUSTOM_RESPONSE_FORMAT")
                .map(|f| CustomResponseFormat::parse(&f));
            configs.push(("custom:default".to_string(), config));
        }

        log_debug!(
            configured = ?configs.iter().map(|(k, _)| k.as_str()).collect::<Vec<_>>(),
            "Loaded environment model configurations"
        );

        Self { configs }
    }

    pub fn get(&self, key: &str) -> Option<&ModelConfig> {
        self.configs.iter().find(|(k, _)| k == key).map(|(_, c)| c)
    }

    /// Environment config for a provider (`<provider>:default`).
    pub fn for_provider(&self, provider: &ModelProvider) -> Option<&ModelConfig> {
        self.get(&format!("{provider}:default"))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ModelConfig)> {
        self.configs.iter().map(|(k, c)| (k.as_str(), c))
    }

    pub fn len(&self) -> usize {
        self.configs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.configs.is_empty()
    }
}

// ============================================================================
// Fallback computation
// ============================================================================

fn downgrade_model(provider: &ModelProvider) -> Option<&'static str> {
    match provider {
        ModelProvider::OpenAI => Some("gpt-4o-mini"),
        ModelProvider::Claude => Some("claude-3-5-haiku"),
        _ => None,
    }
}

/// Ordered fallback configs for a primary.
///
/// A cheaper model of the same provider comes first, then one
/// environment-configured model per other provider. Gemini is never a
/// fallback target; custom primaries get no fallbacks.
pub fn fallback_configs(
    primary: &ModelConfig,
    env: &EnvironmentConfigs,
    defaults: &ModelDefaults,
) -> Vec<ModelConfig> {
    let primary_provider = primary.effective_provider().clone();
    if matches!(
        primary_provider,
        ModelProvider::Custom | ModelProvider::Other(_)
    ) {
        return Vec::new();
    }

    let mut fallbacks: Vec<ModelConfig> = Vec::new();

    // Same credentials and endpoint, cheaper model
    if let Some(downgrade) = downgrade_model(&primary_provider).and_then(|n| defaults.get(n)) {
        if downgrade.model != primary.model {
            let mut cheaper = primary.clone().merged_with(env.for_provider(&primary_provider));
            cheaper.model = downgrade.model.clone();
            cheaper.capabilities = downgrade.capabilities;
            fallbacks.push(cheaper);
        }
    }

    for (_, config) in env.iter() {
        let provider = config.effective_provider();
        if *provider == primary_provider
            || matches!(provider, ModelProvider::Gemini | ModelProvider::Custom)
        {
            continue;
        }
        fallbacks.push(config.clone());
    }

    fallbacks.dedup_by(|a, b| a.provider == b.provider && a.model == b.model);
    fallbacks
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_api_key_resolution_prefers_explicit_key() {
        let config = ModelConfig::new("claude", "claude-3-5-haiku-20241022").with_api_key("explicit");
        let key = config.resolve_api_key_with(lookup(&[("CLAUDE_API_KEY", "env")]));
        assert_eq!(key.as_deref(), Some("explicit"));
    }

    #[test]
    fn test_api_key_resolution_walks_env_list_in_order() {
        let config = ModelConfig::new("qwen", "qwen-max");
        let key = config.resolve_api_key_with(lookup(&[
            ("DASHSCOPE_API_KEY", "third"),
            ("QWEN_API_KEY", "second"),
        ]));
        assert_eq!(key.as_deref(), Some("second"));
    }

    #[test]
    fn test_original_provider_drives_key_lookup() {
        let mut config = ModelConfig::new("openai", "deepseek-chat");
        config.original_provider = Some(ModelProvider::DeepSeek);
        let key = config.resolve_api_key_with(lookup(&[
            ("OPENAI_API_KEY", "wrong"),
            ("DEEPSEEK_API_KEY", "right"),
        ]));
        assert_eq!(key.as_deref(), Some("right"));
        assert_eq!(
            config.resolved_base_url().as_deref(),
            Some("https://api.deepseek.com/v1")
        );
    }
}
