//! Unit Tests for the Model Router
//!
//! UNIT UNDER TEST: ModelRouter
//!
//! BUSINESS RESPONSIBILITY:
//!   - Try the primary config, then fallbacks in order, on recoverable errors
//!   - Surface irrecoverable errors without consulting fallbacks
//!   - Cache validated adapters per normalized config
//!   - Keep token counting, embeddings and model listing on the primary
//!
//! TEST COVERAGE:
//!   - Retryable primary failure invokes exactly one fallback
//!   - Authentication failure invokes zero fallbacks
//!   - Exhaustion reports AllProvidersFailed with the last error
//!   - Stream establishment falls back like generation
//!   - Cancellation before dispatch
//!   - Adapter cache, stats and clearing

use crate::config::ModelConfig;
use crate::core_types::messages::{
    EmbeddingRequest, StreamChunk, TokenCountResponse, UnifiedMessage, UnifiedRequest,
    UnifiedResponse,
};
use crate::core_types::provider::{ChunkStream, ModelClient};
use crate::core_types::MockModelClient;
use crate::error::{ErrorCategory, LlmError, LlmResult};
use crate::registry::AdapterRegistry;
use crate::router::ModelRouter;
use futures_util::{stream, StreamExt};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

type Outcome = fn(&str) -> LlmResult<UnifiedResponse>;

fn answer(provider: &str) -> LlmResult<UnifiedResponse> {
    Ok(UnifiedResponse {
        content: vec![crate::core_types::ContentPart::text(format!("from {provider}"))],
        ..Default::default()
    })
}

fn rate_limited(provider: &str) -> LlmResult<UnifiedResponse> {
    Err(LlmError::rate_limit(provider, "slow down", None))
}

fn unavailable(provider: &str) -> LlmResult<UnifiedResponse> {
    Err(LlmError::from_status(provider, 503, "overloaded", None))
}

fn bad_key(provider: &str) -> LlmResult<UnifiedResponse> {
    Err(LlmError::authentication(provider, "invalid key"))
}

/// Call counters for one mock adapter type.
#[derive(Default)]
struct Counters {
    constructed: AtomicUsize,
    generate: AtomicUsize,
    stream: AtomicUsize,
}

impl Counters {
    fn generate_calls(&self) -> usize {
        self.generate.load(Ordering::SeqCst)
    }
}

/// Register a mock adapter type whose operations answer with `outcome`.
fn register_mock(registry: &mut AdapterRegistry, adapter_type: &str, outcome: Outcome) -> Arc<Counters> {
    let counters = Arc::new(Counters::default());
    let shared = Arc::clone(&counters);

    registry.register(adapter_type, move |config: ModelConfig| {
        shared.constructed.fetch_add(1, Ordering::SeqCst);
        let tag = config.provider_tag().to_string();
        let mut mock = MockModelClient::new();

        mock.expect_config().return_const(config);
        mock.expect_validate().returning(|| Ok(()));

        let generate = Arc::clone(&shared);
        let generate_tag = tag.clone();
        mock.expect_generate_content().returning(move |_| {
            generate.generate.fetch_add(1, Ordering::SeqCst);
            outcome(&generate_tag)
        });

        let streams = Arc::clone(&shared);
        let stream_tag = tag.clone();
        mock.expect_generate_content_stream().returning(move |_| {
            streams.stream.fetch_add(1, Ordering::SeqCst);
            outcome(&stream_tag).map(|response| {
                let chunks = vec![Ok(StreamChunk::delta(response)), Ok(StreamChunk::done())];
                Box::pin(stream::iter(chunks)) as ChunkStream
            })
        });

        mock.expect_count_tokens()
            .returning(|_| Ok(TokenCountResponse { token_count: 42 }));
        mock.expect_embed_content()
            .returning(move |_| Err(LlmError::unsupported(tag.clone(), "embeddings")));

        Ok(Arc::new(mock) as Arc<dyn ModelClient>)
    });

    counters
}

fn primary() -> ModelConfig {
    ModelConfig::new("openai", "gpt-4o").with_adapter_type("mock-primary")
}

fn fallback() -> ModelConfig {
    ModelConfig::new("claude", "claude-3-5-sonnet-20241022").with_adapter_type("mock-fallback")
}

fn second_fallback() -> ModelConfig {
    ModelConfig::new("qwen", "qwen-max").with_adapter_type("mock-second")
}

fn request() -> UnifiedRequest {
    UnifiedRequest::new(vec![UnifiedMessage::user("Hello")])
}

#[tokio::test]
async fn test_primary_success_skips_fallbacks() {
    // Arrange
    let mut registry = AdapterRegistry::empty();
    let primary_calls = register_mock(&mut registry, "mock-primary", answer);
    let fallback_calls = register_mock(&mut registry, "mock-fallback", answer);
    let router = ModelRouter::new(Arc::new(registry));

    // Act
    let response = router
        .generate_content(&primary(), &[fallback()], request())
        .await
        .expect("primary answers");

    // Assert
    assert_eq!(response.text(), "from openai");
    assert_eq!(primary_calls.generate_calls(), 1);
    assert_eq!(fallback_calls.generate_calls(), 0);
    let metadata = response.metadata.expect("metadata");
    let routing = &metadata["routing"];
    assert_eq!(routing["provider"], "openai");
    assert_eq!(routing["attempt"], 1);
    assert!(routing["completed_at"].is_string());
}

#[tokio::test]
async fn test_retryable_failure_invokes_exactly_one_fallback() {
    // Arrange
    let mut registry = AdapterRegistry::empty();
    let primary_calls = register_mock(&mut registry, "mock-primary", rate_limited);
    let fallback_calls = register_mock(&mut registry, "mock-fallback", answer);
    let second_calls = register_mock(&mut registry, "mock-second", answer);
    let router = ModelRouter::new(Arc::new(registry));

    // Act
    let response = router
        .generate_content(&primary(), &[fallback(), second_fallback()], request())
        .await
        .expect("fallback answers");

    // Assert
    assert_eq!(response.text(), "from claude");
    assert_eq!(primary_calls.generate_calls(), 1);
    assert_eq!(fallback_calls.generate_calls(), 1);
    assert_eq!(second_calls.generate_calls(), 0);
    assert_eq!(response.metadata.expect("metadata")["routing"]["attempt"], 2);
}

#[tokio::test]
async fn test_authentication_failure_invokes_no_fallback() {
    // Arrange
    let mut registry = AdapterRegistry::empty();
    register_mock(&mut registry, "mock-primary", bad_key);
    let fallback_calls = register_mock(&mut registry, "mock-fallback", answer);
    let router = ModelRouter::new(Arc::new(registry));

    // Act
    let result = router
        .generate_content(&primary(), &[fallback()], request())
        .await;

    // Assert
    assert!(matches!(result, Err(LlmError::Authentication { .. })));
    assert_eq!(fallback_calls.generate_calls(), 0);
    assert_eq!(fallback_calls.constructed.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_exhaustion_reports_last_error() {
    // Arrange
    let mut registry = AdapterRegistry::empty();
    register_mock(&mut registry, "mock-primary", rate_limited);
    register_mock(&mut registry, "mock-fallback", unavailable);
    let router = ModelRouter::new(Arc::new(registry));

    // Act
    let error = router
        .generate_content(&primary(), &[fallback()], request())
        .await
        .expect_err("every provider fails");

    // Assert
    assert!(matches!(error, LlmError::AllProvidersFailed { attempts: 2, .. }));
    assert_eq!(error.provider(), "claude");
    assert_eq!(error.category(), ErrorCategory::ModelUnavailable);
}

#[tokio::test]
async fn test_lone_primary_reports_its_own_error() {
    // Arrange
    let mut registry = AdapterRegistry::empty();
    register_mock(&mut registry, "mock-primary", unavailable);
    let router = ModelRouter::new(Arc::new(registry));

    // Act
    let result = router.generate_content(&primary(), &[], request()).await;

    // Assert
    assert!(matches!(result, Err(LlmError::ServiceUnavailable { .. })));
}

#[tokio::test]
async fn test_unbuildable_primary_stops_the_chain() {
    // Arrange
    let mut registry = AdapterRegistry::empty();
    let fallback_calls = register_mock(&mut registry, "mock-fallback", answer);
    let router = ModelRouter::new(Arc::new(registry));
    let unknown = ModelConfig::new("openai", "gpt-4o").with_adapter_type("missing");

    // Act
    let result = router
        .generate_content(&unknown, &[fallback()], request())
        .await;

    // Assert
    assert!(matches!(result, Err(LlmError::Configuration { .. })));
    assert_eq!(fallback_calls.generate_calls(), 0);
}

#[tokio::test]
async fn test_stream_establishment_falls_back() {
    // Arrange
    let mut registry = AdapterRegistry::empty();
    let primary_calls = register_mock(&mut registry, "mock-primary", unavailable);
    let fallback_calls = register_mock(&mut registry, "mock-fallback", answer);
    let router = ModelRouter::new(Arc::new(registry));

    // Act
    let chunks: Vec<_> = router
        .generate_content_stream(&primary(), &[fallback()], request())
        .await
        .expect("fallback stream")
        .collect()
        .await;

    // Assert
    assert_eq!(primary_calls.stream.load(Ordering::SeqCst), 1);
    assert_eq!(fallback_calls.stream.load(Ordering::SeqCst), 1);
    assert_eq!(chunks.len(), 2);
    assert_eq!(chunks[0].as_ref().expect("delta").delta.text(), "from claude");
    assert!(chunks[1].as_ref().expect("done").done);
}

#[tokio::test]
async fn test_cancelled_request_is_not_dispatched() {
    // Arrange
    let mut registry = AdapterRegistry::empty();
    let primary_calls = register_mock(&mut registry, "mock-primary", answer);
    let router = ModelRouter::new(Arc::new(registry));
    let token = CancellationToken::new();
    token.cancel();

    // Act
    let result = router
        .generate_content(&primary(), &[fallback()], request().with_cancellation(token))
        .await;

    // Assert
    assert!(matches!(result, Err(LlmError::Cancelled { .. })));
    assert_eq!(primary_calls.generate_calls(), 0);
}

#[tokio::test]
async fn test_adapters_are_cached_per_config() {
    // Arrange
    let mut registry = AdapterRegistry::empty();
    let primary_calls = register_mock(&mut registry, "mock-primary", answer);
    let router = ModelRouter::new(Arc::new(registry));

    // Act
    for _ in 0..3 {
        router
            .generate_content(&primary(), &[], request())
            .await
            .expect("answer");
    }
    let stats = router.stats().await;

    // Assert
    assert_eq!(primary_calls.constructed.load(Ordering::SeqCst), 1);
    assert_eq!(primary_calls.generate_calls(), 3);
    assert_eq!(stats.cached_adapters, 1);
    assert_eq!(stats.cache_keys, vec!["openai:gpt-4o:default"]);
    assert_eq!(stats.registered_types, vec!["mock-primary"]);

    router.clear_cache().await;
    assert_eq!(router.stats().await.cached_adapters, 0);
}

#[tokio::test]
async fn test_auxiliary_operations_use_primary_only() {
    // Arrange
    let mut registry = AdapterRegistry::empty();
    register_mock(&mut registry, "mock-primary", answer);
    let fallback_calls = register_mock(&mut registry, "mock-fallback", answer);
    let router = ModelRouter::new(Arc::new(registry));

    // Act
    let count = router.count_tokens(&primary(), &request()).await;
    let embedding = router
        .embed_content(&primary(), EmbeddingRequest::new("text"))
        .await;

    // Assert
    assert_eq!(count.expect("count").token_count, 42);
    assert!(matches!(embedding, Err(LlmError::Unsupported { .. })));
    assert_eq!(fallback_calls.constructed.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_failed_validation_is_not_cached() {
    // Arrange
    let mut registry = AdapterRegistry::empty();
    registry.register("mock-primary", |config: ModelConfig| {
        let mut mock = MockModelClient::new();
        mock.expect_config().return_const(config);
        mock.expect_validate()
            .returning(|| Err(LlmError::authentication("openai", "rejected")));
        Ok(Arc::new(mock) as Arc<dyn ModelClient>)
    });
    let router = ModelRouter::new(Arc::new(registry));

    // Act
    let result = router.get_adapter(&primary()).await;

    // Assert
    assert!(matches!(result, Err(LlmError::Authentication { .. })));
    assert_eq!(router.stats().await.cached_adapters, 0);
}
