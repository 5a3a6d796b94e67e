//! Claude adapter implementation

use super::conversion::{
    anthropic_response_to_unified, unified_to_anthropic_request, AnthropicStreamTranslator,
};
use super::types::{AnthropicRequest, AnthropicResponse};
use crate::config::{ModelConfig, ModelProvider};
use crate::core_types::messages::{TokenCountResponse, UnifiedRequest, UnifiedResponse};
use crate::core_types::provider::{ChunkStream, ModelClient};
use crate::error::{LlmError, LlmResult};
use crate::internals::sse::chunk_stream;
use crate::internals::tokens::estimate_request_tokens;
use crate::logging::log_debug;
use crate::providers::ensure_provider;
use crate::providers::http::{build_headers, join_url, HttpTransport};
use async_trait::async_trait;
use reqwest::header::HeaderMap;

pub const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Claude has no model discovery endpoint.
const KNOWN_MODELS: &[&str] = &[
    "claude-3-5-sonnet-20241022",
    "claude-3-5-sonnet-20240620",
    "claude-3-5-haiku-20241022",
    "claude-3-opus-20240229",
    "claude-3-sonnet-20240229",
    "claude-3-haiku-20240307",
];

/// Anthropic Claude adapter
#[derive(Debug)]
pub struct ClaudeAdapter {
    config: ModelConfig,
    base_url: String,
    headers: HeaderMap,
    transport: HttpTransport,
}

impl ClaudeAdapter {
    /// Create a new Claude adapter
    ///
    /// # Errors
    ///
    /// - [`LlmError::InvalidRequest`] if `config.provider` is not `claude`
    /// - [`LlmError::Authentication`] if no API key is configured or found in
    ///   `CLAUDE_API_KEY` / `ANTHROPIC_API_KEY`
    /// - [`LlmError::Configuration`] if no base URL is known or a header is invalid
    pub fn new(config: ModelConfig) -> LlmResult<Self> {
        ensure_provider(&config, &ModelProvider::Claude, "ClaudeAdapter")?;
        let tag = config.provider_tag().to_string();

        let api_key = config.resolve_api_key().ok_or_else(|| {
            LlmError::authentication(
                &tag,
                "No API key found for Claude. Set CLAUDE_API_KEY or ANTHROPIC_API_KEY",
            )
        })?;
        let base_url = config
            .resolved_base_url()
            .ok_or_else(|| LlmError::configuration(&tag, "A base URL is required"))?;
        let headers = build_headers(
            &tag,
            &[
                ("x-api-key", api_key),
                ("anthropic-version", ANTHROPIC_VERSION.to_string()),
            ],
            &config.custom_headers,
        )?;

        log_debug!(
            provider = %tag,
            model = %config.model,
            base_url = %base_url,
            "Claude adapter initialized"
        );

        Ok(Self {
            transport: HttpTransport::new(&tag, config.retry_policy.clone()),
            config,
            base_url,
            headers,
        })
    }

    fn build_request(&self, request: &UnifiedRequest, stream: bool) -> AnthropicRequest {
        let model = request.model.as_deref().unwrap_or(&self.config.model);
        let mut body = unified_to_anthropic_request(request, model);
        if request.max_tokens.is_none() {
            if let Some(max_tokens) = self.config.options.max_tokens {
                body.max_tokens = max_tokens;
            }
        }
        body.stream = stream.then_some(true);

        log_debug!(
            provider = %self.transport.provider(),
            model = %body.model,
            message_count = body.messages.len(),
            has_system = body.system.is_some(),
            stream = stream,
            "Sending Claude messages request"
        );
        body
    }
}

#[async_trait]
impl ModelClient for ClaudeAdapter {
    fn config(&self) -> &ModelConfig {
        &self.config
    }

    async fn generate_content(&self, request: UnifiedRequest) -> LlmResult<UnifiedResponse> {
        let body = self.build_request(&request, false);
        let url = join_url(&self.base_url, "messages");

        let response: AnthropicResponse = self
            .transport
            .post_json(&url, &self.headers, &body, request.cancel.as_ref())
            .await?;

        let mut unified = anthropic_response_to_unified(response);
        unified.model.get_or_insert(body.model);
        Ok(unified)
    }

    async fn generate_content_stream(&self, request: UnifiedRequest) -> LlmResult<ChunkStream> {
        let body = self.build_request(&request, true);
        let url = join_url(&self.base_url, "messages");

        let response = self
            .transport
            .post_stream(&url, &self.headers, &body, request.cancel.as_ref())
            .await?;

        Ok(chunk_stream(
            self.transport.provider(),
            response,
            AnthropicStreamTranslator::new(),
            request.cancel.clone(),
        ))
    }

    async fn count_tokens(&self, request: &UnifiedRequest) -> LlmResult<TokenCountResponse> {
        Ok(TokenCountResponse {
            token_count: estimate_request_tokens(request),
        })
    }

    /// The key was resolved at construction; Claude offers no cheap
    /// credential check that is not billed.
    async fn validate(&self) -> LlmResult<()> {
        Ok(())
    }

    async fn get_available_models(&self) -> LlmResult<Vec<String>> {
        Ok(KNOWN_MODELS.iter().map(|m| m.to_string()).collect())
    }
}
