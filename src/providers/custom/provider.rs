//! Custom adapter implementation

use super::raw::{raw_response_to_unified, unified_to_raw_request, RawStreamTranslator};
use crate::config::{CustomResponseFormat, ModelConfig, ModelProvider};
use crate::core_types::messages::{
    EmbeddingRequest, EmbeddingResponse, TokenCountResponse, TokenUsage, UnifiedRequest,
    UnifiedResponse,
};
use crate::core_types::provider::{ChunkStream, ModelClient};
use crate::error::{LlmError, LlmResult};
use crate::internals::sse::chunk_stream;
use crate::internals::tokens::estimate_request_tokens;
use crate::logging::{log_debug, log_warn};
use crate::providers::anthropic::types::AnthropicResponse;
use crate::providers::anthropic::{
    anthropic_response_to_unified, unified_to_anthropic_request, AnthropicStreamTranslator,
};
use crate::providers::ensure_provider;
use crate::providers::http::{bearer_headers, join_url, HttpTransport};
use crate::providers::openai_shared::{
    openai_response_to_unified, unified_to_openai_request, OpenAIResponse,
    OpenAIStreamTranslator,
};
use async_trait::async_trait;
use reqwest::header::HeaderMap;
use serde_json::{json, Value};

/// Adapter for self-hosted and otherwise unknown endpoints
#[derive(Debug)]
pub struct CustomAdapter {
    config: ModelConfig,
    base_url: String,
    headers: HeaderMap,
    format: CustomResponseFormat,
    transport: HttpTransport,
}

impl CustomAdapter {
    /// Create a new custom adapter
    ///
    /// The API key is optional; local deployments often run without one.
    ///
    /// # Errors
    ///
    /// - [`LlmError::InvalidRequest`] if `config.provider` is not `custom`
    /// - [`LlmError::Configuration`] if no base URL is set or a header is invalid
    pub fn new(config: ModelConfig) -> LlmResult<Self> {
        ensure_provider(&config, &ModelProvider::Custom, "CustomAdapter")?;
        let tag = config.provider_tag().to_string();

        let base_url = config.resolved_base_url().ok_or_else(|| {
            LlmError::configuration(&tag, "Custom models need a base URL (CUSTOM_MODEL_URL)")
        })?;
        let api_key = config.resolve_api_key();
        let headers = bearer_headers(&tag, api_key.as_deref(), &config.custom_headers)?;
        let format = config.options.response_format.unwrap_or_default();

        log_debug!(
            provider = %tag,
            model = %config.model,
            base_url = %base_url,
            response_format = ?format,
            has_api_key = api_key.is_some(),
            "Custom adapter initialized"
        );

        Ok(Self {
            transport: HttpTransport::new(&tag, config.retry_policy.clone()),
            config,
            base_url,
            headers,
            format,
        })
    }

    /// Absolute endpoints are used verbatim, relative ones join the base URL.
    fn endpoint_url(&self, configured: Option<&str>, default: &str) -> String {
        match configured {
            Some(url) if url.starts_with("http://") || url.starts_with("https://") => {
                url.to_string()
            }
            Some(path) => join_url(&self.base_url, path),
            None => join_url(&self.base_url, default),
        }
    }

    fn completion_url(&self) -> String {
        let default = match self.format {
            CustomResponseFormat::Claude => "messages",
            CustomResponseFormat::OpenAI | CustomResponseFormat::Raw => "chat/completions",
        };
        self.endpoint_url(self.config.options.completion_endpoint.as_deref(), default)
    }

    fn model_for<'a>(&'a self, request: &'a UnifiedRequest) -> &'a str {
        request.model.as_deref().unwrap_or(&self.config.model)
    }

    fn with_default_max_tokens(&self, request: &UnifiedRequest) -> UnifiedRequest {
        let mut request = request.clone();
        if request.max_tokens.is_none() {
            request.max_tokens = self.config.options.max_tokens;
        }
        request
    }

    /// Request body in the configured format.
    fn build_body(&self, request: &UnifiedRequest, stream: bool) -> LlmResult<Value> {
        let mut request = self.with_default_max_tokens(request);
        request.stream = stream.then_some(true);
        let model = self.model_for(&request).to_string();

        let body = match self.format {
            CustomResponseFormat::OpenAI => {
                serde_json::to_value(unified_to_openai_request(&request, &model))
            }
            CustomResponseFormat::Claude => {
                serde_json::to_value(unified_to_anthropic_request(&request, &model))
            }
            CustomResponseFormat::Raw => {
                serde_json::to_value(unified_to_raw_request(&request, &model))
            }
        };
        body.map_err(|e| {
            LlmError::invalid_request(
                self.transport.provider(),
                format!("Failed to encode request: {e}"),
            )
        })
    }

    fn decode<T: serde::de::DeserializeOwned>(&self, body: Value) -> LlmResult<T> {
        serde_json::from_value(body).map_err(|e| {
            LlmError::response_parsing(
                self.transport.provider(),
                format!("Unexpected {:?} response: {e}", self.format),
            )
        })
    }
}

#[async_trait]
impl ModelClient for CustomAdapter {
    fn config(&self) -> &ModelConfig {
        &self.config
    }

    async fn generate_content(&self, request: UnifiedRequest) -> LlmResult<UnifiedResponse> {
        let model = self.model_for(&request).to_string();
        let body = self.build_body(&request, false)?;
        let url = self.completion_url();

        log_debug!(
            provider = %self.transport.provider(),
            model = %model,
            message_count = request.messages.len(),
            response_format = ?self.format,
            "Sending custom completion request"
        );

        let response: Value = self
            .transport
            .post_json(&url, &self.headers, &body, request.cancel.as_ref())
            .await?;

        let mut unified = match self.format {
            CustomResponseFormat::OpenAI => {
                openai_response_to_unified(self.decode::<OpenAIResponse>(response)?)
            }
            CustomResponseFormat::Claude => {
                anthropic_response_to_unified(self.decode::<AnthropicResponse>(response)?)
            }
            CustomResponseFormat::Raw => raw_response_to_unified(&response, &model),
        };
        unified.model.get_or_insert(model);
        Ok(unified)
    }

    async fn generate_content_stream(&self, request: UnifiedRequest) -> LlmResult<ChunkStream> {
        let body = self.build_body(&request, true)?;
        let url = self.completion_url();
        let provider = self.transport.provider();

        let response = self
            .transport
            .post_stream(&url, &self.headers, &body, request.cancel.as_ref())
            .await?;

        let cancel = request.cancel.clone();
        Ok(match self.format {
            CustomResponseFormat::OpenAI => {
                chunk_stream(provider, response, OpenAIStreamTranslator::new(), cancel)
            }
            CustomResponseFormat::Claude => {
                chunk_stream(provider, response, AnthropicStreamTranslator::new(), cancel)
            }
            CustomResponseFormat::Raw => {
                chunk_stream(provider, response, RawStreamTranslator::new(), cancel)
            }
        })
    }

    async fn count_tokens(&self, request: &UnifiedRequest) -> LlmResult<TokenCountResponse> {
        Ok(TokenCountResponse {
            token_count: estimate_request_tokens(request),
        })
    }

    /// Pings the health endpoint when one is configured.
    async fn validate(&self) -> LlmResult<()> {
        match self.config.options.health_endpoint.as_deref() {
            Some(endpoint) => {
                let url = self.endpoint_url(Some(endpoint), endpoint);
                self.transport.get_ok(&url, &self.headers, None).await
            }
            None => Ok(()),
        }
    }

    async fn embed_content(&self, request: EmbeddingRequest) -> LlmResult<EmbeddingResponse> {
        let model = self
            .config
            .options
            .embedding_model
            .as_deref()
            .unwrap_or(&self.config.model);
        let body = json!({ "model": model, "input": request.text });
        let url =
            self.endpoint_url(self.config.options.embedding_endpoint.as_deref(), "embeddings");

        let response: Value = self
            .transport
            .post_json(&url, &self.headers, &body, None)
            .await?;

        parse_embedding_response(self.transport.provider(), &response)
    }

    async fn get_available_models(&self) -> LlmResult<Vec<String>> {
        let url = self.endpoint_url(self.config.options.models_endpoint.as_deref(), "models");
        let listing: LlmResult<Value> = self.transport.get_json(&url, &self.headers, None).await;

        let models = match listing {
            Ok(listing) => parse_model_listing(&listing),
            Err(e) => {
                log_warn!(
                    provider = %self.transport.provider(),
                    error = %e,
                    "Model listing failed, using configured model"
                );
                Vec::new()
            }
        };

        if models.is_empty() {
            return Ok(vec![self.config.model.clone()]);
        }
        Ok(models)
    }
}

/// OpenAI-style `{data: [{embedding}]}`, a bare vector or `{embedding: [...]}`.
fn parse_embedding_response(provider: &str, response: &Value) -> LlmResult<EmbeddingResponse> {
    let as_vector = |value: &Value| -> Option<Vec<f32>> {
        value
            .as_array()?
            .iter()
            .map(|v| v.as_f64().map(|f| f as f32))
            .collect()
    };

    if let Some(data) = response.get("data").and_then(Value::as_array) {
        let embeddings = data
            .iter()
            .map(|item| item.get("embedding").and_then(as_vector))
            .collect::<Option<Vec<_>>>()
            .ok_or_else(|| LlmError::response_parsing(provider, "Malformed embedding data"))?;
        let usage = response.get("usage").map(|usage| {
            let count = |key: &str| {
                usage
                    .get(key)
                    .and_then(Value::as_u64)
                    .and_then(|v| u32::try_from(v).ok())
                    .unwrap_or(0)
            };
            TokenUsage {
                prompt_tokens: count("prompt_tokens"),
                completion_tokens: 0,
                total_tokens: count("total_tokens"),
            }
        });
        return Ok(EmbeddingResponse { embeddings, usage });
    }

    let vector = as_vector(response).or_else(|| response.get("embedding").and_then(as_vector));
    match vector {
        Some(vector) => Ok(EmbeddingResponse {
            embeddings: vec![vector],
            usage: None,
        }),
        None => Err(LlmError::response_parsing(
            provider,
            "Unexpected embedding response format",
        )),
    }
}

/// `{data: [{id|name}]}` or a bare array of strings.
fn parse_model_listing(listing: &Value) -> Vec<String> {
    let entries = listing
        .get("data")
        .or_else(|| listing.get("models"))
        .unwrap_or(listing);
    entries
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(|item| {
                    item.as_str()
                        .or_else(|| item.get("id").and_then(Value::as_str))
                        .or_else(|| item.get("name").and_then(Value::as_str))
                        .map(str::to_string)
                })
                .collect()
        })
        .unwrap_or_default()
}
