//! Gemini adapter implementation

use super::conversion::{gemini_response_to_unified, unified_to_gemini_request, GeminiStreamTranslator};
use super::types::*;
use crate::config::{ModelConfig, ModelProvider, DEFAULT_GEMINI_EMBEDDING_MODEL};
use crate::core_types::messages::{
    EmbeddingRequest, EmbeddingResponse, TokenCountResponse, UnifiedRequest, UnifiedResponse,
};
use crate::core_types::provider::{ChunkStream, ModelClient};
use crate::error::{LlmError, LlmResult};
use crate::internals::sse::chunk_stream;
use crate::internals::tokens::estimate_request_tokens;
use crate::logging::{log_debug, log_warn};
use crate::providers::ensure_provider;
use crate::providers::http::{build_headers, join_url, HttpTransport};
use async_trait::async_trait;
use reqwest::header::HeaderMap;

const KNOWN_MODELS: &[&str] = &[
    "gemini-2.5-pro",
    "gemini-2.5-flash",
    "gemini-2.5-flash-lite",
    "gemini-1.5-pro",
    "gemini-1.5-flash",
];

/// Google Gemini adapter
#[derive(Debug)]
pub struct GeminiAdapter {
    config: ModelConfig,
    base_url: String,
    headers: HeaderMap,
    transport: HttpTransport,
}

impl GeminiAdapter {
    /// Create a new Gemini adapter
    ///
    /// # Errors
    ///
    /// - [`LlmError::InvalidRequest`] if `config.provider` is not `gemini`
    /// - [`LlmError::Authentication`] if no API key is configured or found in
    ///   `GEMINI_API_KEY` / `GOOGLE_API_KEY`
    pub fn new(config: ModelConfig) -> LlmResult<Self> {
        ensure_provider(&config, &ModelProvider::Gemini, "GeminiAdapter")?;
        let tag = config.provider_tag().to_string();

        let api_key = config.resolve_api_key().ok_or_else(|| {
            LlmError::authentication(
                &tag,
                "No API key found for Gemini. Set GEMINI_API_KEY or GOOGLE_API_KEY",
            )
        })?;
        let base_url = config
            .resolved_base_url()
            .ok_or_else(|| LlmError::configuration(&tag, "A base URL is required"))?;
        let headers = build_headers(&tag, &[("x-goog-api-key", api_key)], &config.custom_headers)?;

        log_debug!(
            provider = %tag,
            model = %config.model,
            base_url = %base_url,
            "Gemini adapter initialized"
        );

        Ok(Self {
            transport: HttpTransport::new(&tag, config.retry_policy.clone()),
            config,
            base_url,
            headers,
        })
    }

    fn model_for<'a>(&'a self, request: &'a UnifiedRequest) -> &'a str {
        request
            .model
            .as_deref()
            .unwrap_or(&self.config.model)
            .trim_start_matches("models/")
    }

    fn model_url(&self, model: &str, method: &str) -> String {
        join_url(&self.base_url, &format!("models/{model}:{method}"))
    }

    fn build_request(&self, request: &UnifiedRequest) -> GeminiRequest {
        let mut body = unified_to_gemini_request(request);
        if request.max_tokens.is_none() {
            if let Some(max_tokens) = self.config.options.max_tokens {
                body.generation_config
                    .get_or_insert_with(GeminiGenerationConfig::default)
                    .max_output_tokens = Some(max_tokens);
            }
        }
        body
    }
}

#[async_trait]
impl ModelClient for GeminiAdapter {
    fn config(&self) -> &ModelConfig {
        &self.config
    }

    async fn generate_content(&self, request: UnifiedRequest) -> LlmResult<UnifiedResponse> {
        let model = self.model_for(&request).to_string();
        let body = self.build_request(&request);

        log_debug!(
            provider = %self.transport.provider(),
            model = %model,
            message_count = body.contents.len(),
            "Sending Gemini generateContent request"
        );

        let url = self.model_url(&model, "generateContent");
        let response: GeminiResponse = self
            .transport
            .post_json(&url, &self.headers, &body, request.cancel.as_ref())
            .await?;

        let mut unified = gemini_response_to_unified(response);
        unified.model.get_or_insert(model);
        Ok(unified)
    }

    async fn generate_content_stream(&self, request: UnifiedRequest) -> LlmResult<ChunkStream> {
        let model = self.model_for(&request).to_string();
        let body = self.build_request(&request);

        log_debug!(
            provider = %self.transport.provider(),
            model = %model,
            message_count = body.contents.len(),
            "Opening Gemini stream"
        );

        let url = format!("{}?alt=sse", self.model_url(&model, "streamGenerateContent"));
        let response = self
            .transport
            .post_stream(&url, &self.headers, &body, request.cancel.as_ref())
            .await?;

        Ok(chunk_stream(
            self.transport.provider(),
            response,
            GeminiStreamTranslator::new(),
            request.cancel.clone(),
        ))
    }

    /// Native count, degrading to the character estimate when the call fails.
    async fn count_tokens(&self, request: &UnifiedRequest) -> LlmResult<TokenCountResponse> {
        let model = self.model_for(request).to_string();
        let body = GeminiRequest {
            contents: unified_to_gemini_request(request).contents,
            ..Default::default()
        };

        let url = self.model_url(&model, "countTokens");
        let counted: LlmResult<GeminiCountTokensResponse> = self
            .transport
            .post_json(&url, &self.headers, &body, request.cancel.as_ref())
            .await;

        match counted {
            Ok(counted) => Ok(TokenCountResponse {
                token_count: counted.total_tokens,
            }),
            Err(LlmError::Cancelled { provider }) => Err(LlmError::Cancelled { provider }),
            Err(e) => {
                log_warn!(
                    provider = %self.transport.provider(),
                    error = %e,
                    "Native token count failed, using estimate"
                );
                Ok(TokenCountResponse {
                    token_count: estimate_request_tokens(request),
                })
            }
        }
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
            .as_deref()
            .unwrap_or(DEFAULT_GEMINI_EMBEDDING_MODEL)
            .trim_start_matches("models/")
            .to_string();
        let body = GeminiEmbedRequest {
            model: format!("models/{model}"),
            content: GeminiContent {
                role: None,
                parts: vec![GeminiPart::text(request.text)],
            },
        };

        let url = self.model_url(&model, "embedContent");
        let response: GeminiEmbedResponse = self
            .transport
            .post_json(&url, &self.headers, &body, None)
            .await?;

        Ok(EmbeddingResponse {
            embeddings: vec![response.embedding.values],
            usage: None,
        })
    }

    async fn get_available_models(&self) -> LlmResult<Vec<String>> {
        let url = join_url(&self.base_url, "models");
        let listing: LlmResult<GeminiModelList> =
            self.transport.get_json(&url, &self.headers, None).await;

        match listing {
            Ok(listing) => {
                let mut models: Vec<String> = listing
                    .models
                    .into_iter()
                    .filter(|m| {
                        m.supported_generation_methods.is_empty()
                            || m
                                .supported_generation_methods
                                .iter()
                                .any(|method| method == "generateContent")
                    })
                    .map(|m| m.name.trim_start_matches("models/").to_string())
                    .collect();
                models.sort();
                Ok(models)
            }
            Err(e) => {
                log_warn!(
                    provider = %self.transport.provider(),
                    error = %e,
                    "Model listing failed, using known models"
                );
                Ok(KNOWN_MODELS.iter().map(|m| m.to_string()).collect())
            }
        }
    }
}
