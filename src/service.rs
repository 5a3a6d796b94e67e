//! Model service facade
//!
//! Resolves model strings such as `"gpt-4o"` or `"deepseek:deepseek-chat"` to
//! configurations, fills in environment credentials, computes fallbacks and
//! delegates to the [`ModelRouter`].

use crate::config::{
    fallback_configs, get_model_config, EnvironmentConfigs, ModelConfig, ModelDefaults,
    ModelProvider,
};
use crate::core_types::messages::{
    EmbeddingRequest, EmbeddingResponse, TokenCountResponse, UnifiedRequest, UnifiedResponse,
};
use crate::core_types::provider::ChunkStream;
use crate::error::{LlmError, LlmResult};
use crate::logging::{log_debug, log_warn};
use crate::registry::AdapterRegistry;
use crate::router::{ModelRouter, RouterStats};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Debug)]
pub struct ModelService {
    router: ModelRouter,
    defaults: ModelDefaults,
    env: EnvironmentConfigs,
    custom_configs: RwLock<HashMap<String, ModelConfig>>,
}

impl ModelService {
    pub fn new(
        registry: Arc<AdapterRegistry>,
        defaults: ModelDefaults,
        env: EnvironmentConfigs,
    ) -> Self {
        log_debug!(
            env_configs = env.len(),
            registered_types = ?registry.registered_types(),
            "Creating model service"
        );
        Self {
            router: ModelRouter::new(registry),
            defaults,
            env,
            custom_configs: RwLock::new(HashMap::new()),
        }
    }

    /// Built-in adapters and defaults, credentials from the process
    /// environment.
    pub fn from_env() -> Self {
        Self::new(
            Arc::new(AdapterRegistry::with_builtin_adapters()),
            ModelDefaults::builtin(),
            EnvironmentConfigs::from_env(),
        )
    }

    pub fn with_custom_configs(self, configs: HashMap<String, ModelConfig>) -> Self {
        Self {
            custom_configs: RwLock::new(configs),
            ..self
        }
    }

    pub fn router(&self) -> &ModelRouter {
        &self.router
    }

    /// Config a model string resolves to, with missing credentials and base
    /// URL taken from the provider's environment config.
    pub async fn resolve_config(&self, model: Option<&str>) -> ModelConfig {
        let model_string = model.unwrap_or(self.defaults.default_model());
        let custom = self.custom_configs.read().await;
        let config = get_model_config(model_string, &custom, &self.defaults);
        let env_config = self.env.for_provider(config.effective_provider());
        config.merged_with(env_config)
    }

    /// Fallbacks for `primary` that some registered adapter can serve.
    pub fn fallbacks_for(&self, primary: &ModelConfig) -> Vec<ModelConfig> {
        fallback_configs(primary, &self.env, &self.defaults)
            .into_iter()
            .filter(|config| self.router.registry().supports(config))
            .collect()
    }

    /// The explicit `model` argument wins over `request.model`. The request
    /// is forwarded without its model string, so adapters use the resolved
    /// config's model.
    async fn prepare(
        &self,
        mut request: UnifiedRequest,
        model: Option<&str>,
    ) -> (ModelConfig, UnifiedRequest) {
        let selector = model.map(str::to_string).or_else(|| request.model.take());
        request.model = None;
        let config = self.resolve_config(selector.as_deref()).await;
        log_debug!(
            provider = %config.provider_tag(),
            model = %config.model,
            message_count = request.messages.len(),
            "Resolved model for request"
        );
        (config, request)
    }

    pub async fn generate_content(
        &self,
        request: UnifiedRequest,
        model: Option<&str>,
    ) -> LlmResult<UnifiedResponse> {
        let (config, request) = self.prepare(request, model).await;
        let fallbacks = self.fallbacks_for(&config);
        self.router
            .generate_content(&config, &fallbacks, request)
            .await
    }

    pub async fn generate_content_stream(
        &self,
        request: UnifiedRequest,
        model: Option<&str>,
    ) -> LlmResult<ChunkStream> {
        let (config, request) = self.prepare(request, model).await;
        let fallbacks = self.fallbacks_for(&config);
        self.router
            .generate_content_stream(&config, &fallbacks, request)
            .await
    }

    pub async fn count_tokens(
        &self,
        request: UnifiedRequest,
        model: Option<&str>,
    ) -> LlmResult<TokenCountResponse> {
        let (config, request) = self.prepare(request, model).await;
        self.router.count_tokens(&config, &request).await
    }

    pub async fn embed_content(
        &self,
        request: EmbeddingRequest,
        model: Option<&str>,
    ) -> LlmResult<EmbeddingResponse> {
        let config = self.resolve_config(model).await;
        self.router.embed_content(&config, request).await
    }

    /// Whether an adapter for `model` can be built and validated.
    pub async fn validate_model(&self, model: &str) -> bool {
        let config = self.resolve_config(Some(model)).await;
        match self.router.get_adapter(&config).await {
            Ok(_) => true,
            Err(error) => {
                log_warn!(model = %model, error = %error, "Model validation failed");
                false
            }
        }
    }

    /// Models offered by one provider (`"openai"`, `"claude"`, ...), or by
    /// every environment-configured provider as `provider:model` when
    /// `provider` is `None`. Providers that fail to answer are skipped in the
    /// latter case.
    pub async fn get_available_models(&self, provider: Option<&str>) -> LlmResult<Vec<String>> {
        if let Some(tag) = provider {
            let provider = ModelProvider::parse(tag);
            let config = match self.env.for_provider(&provider) {
                Some(config) => config.clone(),
                None => {
                    let Some(model) = provider.env_default_model() else {
                        return Err(LlmError::configuration(
                            provider.as_str(),
                            "no configuration available for model listing",
                        ));
                    };
                    ModelConfig::new(provider, model)
                }
            };
            return self.router.get_available_models(&config).await;
        }

        let mut all = Vec::new();
        for (key, config) in self.env.iter() {
            match self.router.get_available_models(config).await {
                Ok(models) => {
                    let tag = config.provider_tag();
                    all.extend(models.into_iter().map(|m| format!("{tag}:{m}")));
                }
                Err(error) => {
                    log_warn!(config = %key, error = %error, "Skipping provider in model listing");
                }
            }
        }
        all.dedup();
        Ok(all)
    }

    pub async fn set_custom_model_config(&self, name: impl Into<String>, config: ModelConfig) {
        let name = name.into();
        log_debug!(name = %name, provider = %config.provider_tag(), "Setting custom model config");
        self.custom_configs.write().await.insert(name, config);
    }

    pub async fn remove_custom_model_config(&self, name: &str) -> Option<ModelConfig> {
        self.custom_configs.write().await.remove(name)
    }

    pub async fn custom_model_configs(&self) -> HashMap<String, ModelConfig> {
        self.custom_configs.read().await.clone()
    }

    pub async fn stats(&self) -> RouterStats {
        self.router.stats().await
    }

    pub async fn clear_cache(&self) {
        self.router.clear_cache().await;
    }
}
