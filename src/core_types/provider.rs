//! Adapter trait implemented by every provider family
//!
//! One concrete adapter exists per wire protocol (OpenAI chat completions,
//! Anthropic messages, Gemini, custom endpoints). The router only ever talks
//! to `dyn ModelClient`.

use crate::config::ModelConfig;
use crate::core_types::messages::{
    EmbeddingRequest, EmbeddingResponse, StreamChunk, TokenCountResponse, UnifiedRequest,
    UnifiedResponse,
};
use crate::error::{LlmError, LlmResult};
use async_trait::async_trait;
use futures_util::Stream;
use std::pin::Pin;

/// Lazy, finite, non-restartable stream of unified chunks.
///
/// The last successful item has `done: true`. A transport failure or
/// cancellation ends the stream with one `Err` item instead.
pub type ChunkStream = Pin<Box<dyn Stream<Item = LlmResult<StreamChunk>> + Send>>;

/// Provider adapter contract.
///
/// # Implementing a new provider
///
/// An adapter checks at construction that `config.provider` matches its own
/// identity and fails with [`LlmError::InvalidRequest`] otherwise, before any
/// network I/O. Provider errors are classified into [`LlmError`] and returned;
/// they are never swallowed or replaced by a different provider.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// Normalized configuration this adapter was built from.
    fn config(&self) -> &ModelConfig;

    async fn generate_content(&self, request: UnifiedRequest) -> LlmResult<UnifiedResponse>;

    /// Open a streaming generation.
    ///
    /// The HTTP status is checked before the stream is returned, so
    /// connection and HTTP errors surface from this call rather than from
    /// the stream.
    async fn generate_content_stream(&self, request: UnifiedRequest) -> LlmResult<ChunkStream>;

    async fn count_tokens(&self, request: &UnifiedRequest) -> LlmResult<TokenCountResponse>;

    /// Check that the adapter can reach its provider with its credentials.
    async fn validate(&self) -> LlmResult<()>;

    async fn embed_content(&self, _request: EmbeddingRequest) -> LlmResult<EmbeddingResponse> {
        Err(LlmError::unsupported(
            self.config().provider_tag(),
            "embeddings",
        ))
    }

    async fn get_available_models(&self) -> LlmResult<Vec<String>> {
        Ok(vec![self.config().model.clone()])
    }
}
