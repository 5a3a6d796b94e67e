//! Adapter registry
//!
//! Maps adapter-type keys to constructor closures and resolves a
//! [`ModelConfig`] to the adapter type that serves it. The registry is an
//! explicit value owned by the application and shared with the router through
//! an `Arc`; nothing here is global.

use crate::config::{ModelConfig, ModelProvider};
use crate::core_types::provider::ModelClient;
use crate::error::{LlmError, LlmResult};
use crate::logging::log_debug;
use crate::providers::{ClaudeAdapter, CustomAdapter, GeminiAdapter, OpenAIAdapter};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

pub const OPENAI_ADAPTER: &str = "openai";
pub const CLAUDE_ADAPTER: &str = "claude";
pub const GEMINI_ADAPTER: &str = "gemini";
pub const CUSTOM_ADAPTER: &str = "custom";

/// Builds an adapter from an already normalized config.
pub type AdapterConstructor =
    Arc<dyn Fn(ModelConfig) -> LlmResult<Arc<dyn ModelClient>> + Send + Sync>;

/// Adapter-type table.
#[derive(Clone)]
pub struct AdapterRegistry {
    constructors: HashMap<String, AdapterConstructor>,
}

impl fmt::Debug for AdapterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdapterRegistry")
            .field("registered_types", &self.registered_types())
            .finish()
    }
}

impl Default for AdapterRegistry {
    fn default() -> Self {
        Self::with_builtin_adapters()
    }
}

impl AdapterRegistry {
    /// Registry with no adapters at all.
    pub fn empty() -> Self {
        Self {
            constructors: HashMap::new(),
        }
    }

    /// Registry serving `openai`, `claude`, `gemini` and `custom`.
    pub fn with_builtin_adapters() -> Self {
        let mut registry = Self::empty();
        registry.register(OPENAI_ADAPTER, |config| {
            Ok(Arc::new(OpenAIAdapter::new(config)?) as Arc<dyn ModelClient>)
        });
        registry.register(CLAUDE_ADAPTER, |config| {
            Ok(Arc::new(ClaudeAdapter::new(config)?) as Arc<dyn ModelClient>)
        });
        registry.register(GEMINI_ADAPTER, |config| {
            Ok(Arc::new(GeminiAdapter::new(config)?) as Arc<dyn ModelClient>)
        });
        registry.register(CUSTOM_ADAPTER, |config| {
            Ok(Arc::new(CustomAdapter::new(config)?) as Arc<dyn ModelClient>)
        });
        registry
    }

    /// Register or replace the constructor for an adapter type.
    pub fn register<F>(&mut self, adapter_type: impl Into<String>, constructor: F)
    where
        F: Fn(ModelConfig) -> LlmResult<Arc<dyn ModelClient>> + Send + Sync + 'static,
    {
        let adapter_type = normalize_type(&adapter_type.into());
        log_debug!(adapter_type = %adapter_type, "Registering adapter constructor");
        self.constructors.insert(adapter_type, Arc::new(constructor));
    }

    pub fn has_adapter(&self, adapter_type: &str) -> bool {
        self.constructors.contains_key(&normalize_type(adapter_type))
    }

    /// Registered adapter types, sorted.
    pub fn registered_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self.constructors.keys().cloned().collect();
        types.sort();
        types
    }

    /// Whether some registered adapter would serve this config.
    pub fn supports(&self, config: &ModelConfig) -> bool {
        let (adapter_type, _) = Self::resolve(config);
        self.has_adapter(&adapter_type)
    }

    /// Adapter type and normalized config for `config`.
    ///
    /// An explicit `adapter_type` wins over the provider table. When the
    /// adapter is one of the built-in four and the provider tag differs from
    /// its identity, the returned config carries the adapter identity as
    /// `provider` and the caller's tag as `original_provider`. The input is
    /// never modified.
    pub fn resolve(config: &ModelConfig) -> (String, ModelConfig) {
        let adapter_type = match config.adapter_type.as_deref() {
            Some(explicit) if !explicit.trim().is_empty() => normalize_type(explicit),
            _ => adapter_type_for_provider(&config.provider).to_string(),
        };

        let mut normalized = config.clone();
        if let Some(identity) = adapter_identity(&adapter_type) {
            if normalized.provider != identity {
                if normalized.original_provider.is_none() {
                    normalized.original_provider = Some(normalized.provider.clone());
                }
                normalized.provider = identity;
            }
        }

        (adapter_type, normalized)
    }

    /// Build the adapter serving `config`.
    ///
    /// # Errors
    ///
    /// - [`LlmError::Configuration`] if no constructor is registered for the
    ///   resolved adapter type
    /// - whatever the adapter's constructor returns
    pub fn create_adapter(&self, config: &ModelConfig) -> LlmResult<Arc<dyn ModelClient>> {
        let (adapter_type, normalized) = Self::resolve(config);
        let constructor = self.constructors.get(&adapter_type).ok_or_else(|| {
            LlmError::configuration(
                config.provider_tag(),
                format!(
                    "No adapter registered for type '{adapter_type}' (registered: {})",
                    self.registered_types().join(", ")
                ),
            )
        })?;

        log_debug!(
            adapter_type = %adapter_type,
            provider = %normalized.provider,
            original_provider = ?normalized.original_provider,
            model = %normalized.model,
            "Creating adapter"
        );

        constructor(normalized)
    }
}

fn normalize_type(adapter_type: &str) -> String {
    adapter_type.trim().to_lowercase()
}

/// Provider table used when no adapter type is given.
pub fn adapter_type_for_provider(provider: &ModelProvider) -> &'static str {
    match provider {
        ModelProvider::OpenAI
        | ModelProvider::Qwen
        | ModelProvider::DeepSeek
        | ModelProvider::Moonshot
        | ModelProvider::Zhipu
        | ModelProvider::MiniMax
        | ModelProvider::OpenAICompatible => OPENAI_ADAPTER,
        ModelProvider::Claude | ModelProvider::ClaudeCompatible => CLAUDE_ADAPTER,
        ModelProvider::Gemini => GEMINI_ADAPTER,
        ModelProvider::Custom | ModelProvider::Other(_) => CUSTOM_ADAPTER,
    }
}

fn adapter_identity(adapter_type: &str) -> Option<ModelProvider> {
    match adapter_type {
        OPENAI_ADAPTER => Some(ModelProvider::OpenAI),
        CLAUDE_ADAPTER => Some(ModelProvider::Claude),
        GEMINI_ADAPTER => Some(ModelProvider::Gemini),
        CUSTOM_ADAPTER => Some(ModelProvider::Custom),
        _ => None,
    }
}
