//! Model router
//!
//! Executes a request against a primary config and, when the failure is one
//! another provider could avoid, against each fallback in order. Adapters are
//! built through the [`AdapterRegistry`], validated once and cached.
//!
//! ## Fallback rules
//!
//! - Errors for which [`LlmError::stops_fallback`] holds (authentication,
//!   invalid input, content filtering, unknown model, cancellation) are
//!   returned immediately.
//! - Anything else moves on to the next fallback. Fallbacks run one after
//!   another, never in parallel.
//! - When every candidate failed, the caller gets
//!   [`LlmError::AllProvidersFailed`] wrapping the last error.
//! - Streams fall back only while being opened. A stream that has been
//!   handed out is never restarted.

use crate::config::ModelConfig;
use crate::core_types::messages::{
    EmbeddingRequest, EmbeddingResponse, TokenCountResponse, UnifiedRequest, UnifiedResponse,
};
use crate::core_types::provider::{ChunkStream, ModelClient};
use crate::error::{LlmError, LlmResult};
use crate::logging::{log_debug, log_info, log_warn};
use crate::registry::AdapterRegistry;
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Snapshot of the router's adapter cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RouterStats {
    pub cached_adapters: usize,
    pub cache_keys: Vec<String>,
    pub registered_types: Vec<String>,
}

pub struct ModelRouter {
    registry: Arc<AdapterRegistry>,
    adapters: RwLock<HashMap<String, Arc<dyn ModelClient>>>,
}

impl fmt::Debug for ModelRouter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelRouter")
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}

impl ModelRouter {
    pub fn new(registry: Arc<AdapterRegistry>) -> Self {
        Self {
            registry,
            adapters: RwLock::new(HashMap::new()),
        }
    }

    pub fn registry(&self) -> &AdapterRegistry {
        &self.registry
    }

    /// Cached adapter for `config`, building and validating it on first use.
    ///
    /// The adapter is built outside the lock; when two calls race, the last
    /// insert wins and both callers get a working adapter.
    pub async fn get_adapter(&self, config: &ModelConfig) -> LlmResult<Arc<dyn ModelClient>> {
        let (_, normalized) = AdapterRegistry::resolve(config);
        let key = normalized.cache_key();

        if let Some(adapter) = self.adapters.read().await.get(&key) {
            log_debug!(cache_key = %key, "Adapter cache hit");
            return Ok(Arc::clone(adapter));
        }

        let adapter = self.registry.create_adapter(config)?;
        adapter.validate().await?;

        log_debug!(cache_key = %key, "Caching validated adapter");
        self.adapters
            .write()
            .await
            .insert(key, Arc::clone(&adapter));
        Ok(adapter)
    }

    pub async fn generate_content(
        &self,
        primary: &ModelConfig,
        fallbacks: &[ModelConfig],
        request: UnifiedRequest,
    ) -> LlmResult<UnifiedResponse> {
        self.with_fallbacks(primary, fallbacks, &request, |adapter, config, request, attempt| async move {
            let mut response = adapter.generate_content(request).await?;
            attach_metadata(&mut response, &config, attempt);
            Ok(response)
        })
        .await
    }

    /// Open a stream on the first candidate that accepts the request.
    pub async fn generate_content_stream(
        &self,
        primary: &ModelConfig,
        fallbacks: &[ModelConfig],
        request: UnifiedRequest,
    ) -> LlmResult<ChunkStream> {
        self.with_fallbacks(primary, fallbacks, &request, |adapter, _, request, _| async move {
            adapter.generate_content_stream(request).await
        })
        .await
    }

    /// Primary only.
    pub async fn count_tokens(
        &self,
        config: &ModelConfig,
        request: &UnifiedRequest,
    ) -> LlmResult<TokenCountResponse> {
        self.get_adapter(config).await?.count_tokens(request).await
    }

    /// Primary only.
    pub async fn embed_content(
        &self,
        config: &ModelConfig,
        request: EmbeddingRequest,
    ) -> LlmResult<EmbeddingResponse> {
        self.get_adapter(config).await?.embed_content(request).await
    }

    pub async fn get_available_models(&self, config: &ModelConfig) -> LlmResult<Vec<String>> {
        self.get_adapter(config).await?.get_available_models().await
    }

    pub async fn clear_cache(&self) {
        let mut adapters = self.adapters.write().await;
        log_debug!(cleared = adapters.len(), "Clearing adapter cache");
        adapters.clear();
    }

    pub async fn stats(&self) -> RouterStats {
        let adapters = self.adapters.read().await;
        let mut cache_keys: Vec<String> = adapters.keys().cloned().collect();
        cache_keys.sort();
        RouterStats {
            cached_adapters: cache_keys.len(),
            cache_keys,
            registered_types: self.registry.registered_types(),
        }
    }

    /// Run `operation` on the primary, then on each fallback, until one
    /// succeeds or an error stops the chain.
    async fn with_fallbacks<T, F, Fut>(
        &self,
        primary: &ModelConfig,
        fallbacks: &[ModelConfig],
        request: &UnifiedRequest,
        operation: F,
    ) -> LlmResult<T>
    where
        F: Fn(Arc<dyn ModelClient>, ModelConfig, UnifiedRequest, usize) -> Fut,
        Fut: Future<Output = LlmResult<T>>,
    {
        let candidates = std::iter::once(primary).chain(fallbacks.iter());
        let total = fallbacks.len() + 1;
        let mut last_error = None;
        let mut attempts = 0;

        for (index, config) in candidates.enumerate() {
            if request.is_cancelled() {
                return Err(LlmError::cancelled(config.provider_tag()));
            }
            attempts += 1;

            let result = match self.get_adapter(config).await {
                Ok(adapter) => {
                    let (_, normalized) = AdapterRegistry::resolve(config);
                    operation(adapter, normalized, request.clone(), attempts).await
                }
                Err(error) => Err(error),
            };

            let error = match result {
                Ok(value) => {
                    if index > 0 {
                        log_info!(
                            provider = %config.provider_tag(),
                            model = %config.model,
                            attempt = attempts,
                            "Fallback provider succeeded"
                        );
                    }
                    return Ok(value);
                }
                Err(error) => error,
            };

            if error.stops_fallback() {
                log_debug!(
                    provider = %config.provider_tag(),
                    code = error.code(),
                    "Error is not recoverable by another provider"
                );
                return Err(error);
            }

            if index + 1 < total {
                log_warn!(
                    provider = %config.provider_tag(),
                    model = %config.model,
                    error = %error,
                    remaining_fallbacks = total - index - 1,
                    "Provider failed, trying next fallback"
                );
            }
            last_error = Some(error);
        }

        match last_error {
            // A lone primary reports its own error
            Some(error) if attempts == 1 => Err(error),
            Some(error) => Err(LlmError::all_providers_failed(attempts, error)),
            None => Err(LlmError::configuration(
                primary.provider_tag(),
                "No provider configuration to try",
            )),
        }
    }
}

/// Record which candidate answered.
fn attach_metadata(response: &mut UnifiedResponse, config: &ModelConfig, attempt: usize) {
    let routing = json!({
        "provider": config.provider_tag(),
        "model": config.model,
        "attempt": attempt,
        "completed_at": chrono::Utc::now().to_rfc3339(),
    });

    match response.metadata.as_mut() {
        Some(Value::Object(existing)) => {
            existing.insert("routing".to_string(), routing);
        }
        _ => response.metadata = Some(json!({ "routing": routing })),
    }
}
