//! OpenAI adapter
//!
//! Speaks the chat-completions protocol for OpenAI and every
//! OpenAI-compatible provider (Qwen, DeepSeek, Moonshot, Zhipu, MiniMax).
//! The compatible providers reach this adapter through the registry, which
//! rewrites their provider tag to `openai` and keeps the original tag in
//! `original_provider`; key lookup, default base URL and model listing all
//! follow that original tag.

use super::http::{bearer_headers, join_url, HttpTransport};
use super::openai_shared::{
    openai_response_to_unified, unified_to_openai_request, OpenAIEmbeddingRequest,
    OpenAIEmbeddingResponse, OpenAIModelList, OpenAIResponse, OpenAIStreamTranslator,
};
use super::ensure_provider;
use crate::config::{ModelConfig, ModelProvider, DEFAULT_OPENAI_EMBEDDING_MODEL};
use crate::core_types::messages::{
    EmbeddingRequest, EmbeddingResponse, TokenCountResponse, TokenUsage, UnifiedRequest,
    UnifiedResponse,
};
use crate::core_types::provider::{ChunkStream, ModelClient};
use crate::error::{LlmError, LlmResult};
use crate::internals::sse::chunk_stream;
use crate::internals::tokens::estimate_request_tokens;
use crate::logging::{log_debug, log_warn};
use async_trait::async_trait;
use reqwest::header::HeaderMap;

const OPENAI_MODELS: &[&str] = &["gpt-4o", "gpt-4o-mini", "gpt-4-turbo", "gpt-3.5-turbo"];

const QWEN_MODELS: &[&str] = &[
    "qwen-coder-turbo",
    "qwen-max",
    "qwen-plus",
    "qwen-turbo",
    "qwen-long",
    "qwen3-coder-flash",
    "qwen-coder-plus",
];

/// OpenAI chat-completions adapter
#[derive(Debug)]
pub struct OpenAIAdapter {
    config: ModelConfig,
    base_url: String,
    headers: HeaderMap,
    transport: HttpTransport,
}

impl OpenAIAdapter {
    /// Create a new OpenAI adapter
    ///
    /// # Errors
    ///
    /// - [`LlmError::InvalidRequest`] if `config.provider` is not `openai`
    /// - [`LlmError::Authentication`] if no API key is configured or found in
    ///   the environment
    /// - [`LlmError::Configuration`] if no base URL is known for the provider
    pub fn new(config: ModelConfig) -> LlmResult<Self> {
        ensure_provider(&config, &ModelProvider::OpenAI, "OpenAIAdapter")?;
        let tag = config.provider_tag().to_string();

        let api_key = config.resolve_api_key().ok_or_else(|| {
            LlmError::authentication(
                &tag,
                format!(
                    "No API key configured; set one of {:?}",
                    config.effective_provider().api_key_env_vars()
                ),
            )
        })?;
        let base_url = config.resolved_base_url().ok_or_else(|| {
            LlmError::configuration(&tag, "A base URL is required for this provider")
        })?;
        let headers = bearer_headers(&tag, Some(&api_key), &config.custom_headers)?;

        log_debug!(
            provider = %tag,
            model = %config.model,
            base_url = %base_url,
            "Creating OpenAI adapter"
        );

        Ok(Self {
            transport: HttpTransport::new(&tag, config.retry_policy.clone()),
            config,
            base_url,
            headers,
        })
    }

    fn tag(&self) -> &str {
        self.transport.provider()
    }

    fn model_for<'a>(&'a self, request: &'a UnifiedRequest) -> &'a str {
        request.model.as_deref().unwrap_or(&self.config.model)
    }

    fn static_models(&self) -> Vec<String> {
        let list = match self.config.effective_provider() {
            ModelProvider::OpenAI => OPENAI_MODELS,
            ModelProvider::Qwen => QWEN_MODELS,
            _ => return vec![self.config.model.clone()],
        };
        list.iter().map(|m| m.to_string()).collect()
    }
}

#[async_trait]
impl ModelClient for OpenAIAdapter {
    fn config(&self) -> &ModelConfig {
        &self.config
    }

    async fn generate_content(&self, request: UnifiedRequest) -> LlmResult<UnifiedResponse> {
        let model = self.model_for(&request).to_string();
        let mut body = unified_to_openai_request(&request, &model);
        body.stream = None;
        if body.max_tokens.is_none() {
            body.max_tokens = self.config.options.max_tokens;
        }

        log_debug!(
            provider = %self.tag(),
            model = %model,
            message_count = body.messages.len(),
            "Sending chat completion request"
        );

        let url = join_url(&self.base_url, "chat/completions");
        let response: OpenAIResponse = self
            .transport
            .post_json(&url, &self.headers, &body, request.cancel.as_ref())
            .await?;

        let mut unified = openai_response_to_unified(response);
        unified.model.get_or_insert(model);
        Ok(unified)
    }

    async fn generate_content_stream(&self, request: UnifiedRequest) -> LlmResult<ChunkStream> {
        let model = self.model_for(&request).to_string();
        let mut body = unified_to_openai_request(&request, &model);
        body.stream = Some(true);
        if body.max_tokens.is_none() {
            body.max_tokens = self.config.options.max_tokens;
        }

        log_debug!(
            provider = %self.tag(),
            model = %model,
            message_count = body.messages.len(),
            "Opening chat completion stream"
        );

        let url = join_url(&self.base_url, "chat/completions");
        let response = self
            .transport
            .post_stream(&url, &self.headers, &body, request.cancel.as_ref())
            .await?;

        Ok(chunk_stream(
            self.tag(),
            response,
            OpenAIStreamTranslator::new(),
            request.cancel.clone(),
        ))
    }

    async fn count_tokens(&self, request: &UnifiedRequest) -> LlmResult<TokenCountResponse> {
        Ok(TokenCountResponse {
            token_count: estimate_request_tokens(request),
        })
    }

    async fn validate(&self) -> LlmResult<()> {
        let url = join_url(&self.base_url, "models");
        self.transport.get_ok(&url, &self.headers, None).await
    }

    async fn embed_content(&self, request: EmbeddingRequest) -> LlmResult<EmbeddingResponse> {
        let model = self
            .config
            .options
            .embedding_model
            .clone()
            .unwrap_or_else(|| DEFAULT_OPENAI_EMBEDDING_MODEL.to_string());
        let body = OpenAIEmbeddingRequest {
            model,
            input: request.text,
        };

        let url = join_url(&self.base_url, "embeddings");
        let response: OpenAIEmbeddingResponse = self
            .transport
            .post_json(&url, &self.headers, &body, None)
            .await?;

        Ok(EmbeddingResponse {
            embeddings: response.data.into_iter().map(|d| d.embedding).collect(),
            usage: response.usage.map(TokenUsage::from),
        })
    }

    async fn get_available_models(&self) -> LlmResult<Vec<String>> {
        let url = join_url(&self.base_url, "models");
        let listing: LlmResult<OpenAIModelList> =
            self.transport.get_json(&url, &self.headers, None).await;

        match listing {
            Ok(listing) => {
                let is_openai = *self.config.effective_provider() == ModelProvider::OpenAI;
                let mut models: Vec<String> = listing
                    .data
                    .into_iter()
                    .map(|m| m.id)
                    .filter(|id| !is_openai || is_chat_model(id))
                    .collect();
                models.sort();
                Ok(models)
            }
            Err(e) => {
                log_warn!(
                    provider = %self.tag(),
                    error = %e,
                    "Model listing failed, using known models"
                );
                Ok(self.static_models())
            }
        }
    }
}

fn is_chat_model(id: &str) -> bool {
    id.starts_with("gpt-") || id.starts_with("o1") || id.starts_with("o3")
}
