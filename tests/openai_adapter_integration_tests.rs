//! Integration Tests for the OpenAI Adapter
//!
//! UNIT UNDER TEST: OpenAIAdapter (against a mock chat-completions server)
//!
//! BUSINESS RESPONSIBILITY:
//!   - Send chat completion, embedding and model listing requests over HTTP
//!   - Authenticate with a bearer token
//!   - Classify HTTP failures into LlmError variants
//!   - Decode SSE streams into unified chunks ending in one done chunk
//!
//! TEST COVERAGE:
//!   - Successful completion with usage and tool calls
//!   - 401 / 429 / 503 / 400 classification, Retry-After
//!   - Outages returned after one attempt, even with retries configured
//!   - Streaming text and tool call reassembly
//!   - Embeddings, model listing filter and offline fallback

mod common;

use common::*;
use futures_util::StreamExt;
use llm_router::{
    ContentPart, EmbeddingRequest, FinishReason, LlmError, ModelClient, OpenAIAdapter,
    ToolDefinition,
};
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ============================================================================
// Completion
// ============================================================================

#[tokio::test]
async fn test_generate_content_success() {
    // Arrange
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer test-openai-key"))
        .and(body_partial_json(json!({
            "model": "gpt-4o",
            "messages": [{"role": "user", "content": "Hello"}]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(openai_text_response("Hi there")))
        .expect(1)
        .mount(&server)
        .await;
    let adapter = OpenAIAdapter::new(openai_config(&server.uri())).expect("adapter");

    // Act
    let response = adapter
        .generate_content(user_request("Hello"))
        .await
        .expect("completion");

    // Assert
    assert_eq!(response.text(), "Hi there");
    assert_eq!(response.finish_reason, Some(FinishReason::Stop));
    let usage = response.usage.expect("usage");
    assert_eq!(usage.prompt_tokens, 10);
    assert_eq!(usage.completion_tokens, 5);
    assert_eq!(usage.total_tokens, 15);
}

#[tokio::test]
async fn test_generate_content_returns_tool_calls() {
    // Arrange
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_partial_json(json!({
            "tools": [{"type": "function", "function": {"name": "get_weather"}}]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{
                "index": 0,
                "message": {
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [{
                        "id": "call_1",
                        "type": "function",
                        "function": {"name": "get_weather", "arguments": "{\"city\":\"Paris\"}"}
                    }]
                },
                "finish_reason": "tool_calls"
            }]
        })))
        .mount(&server)
        .await;
    let adapter = OpenAIAdapter::new(openai_config(&server.uri())).expect("adapter");
    let request = user_request("Weather in Paris?").with_tools(vec![ToolDefinition {
        name: "get_weather".to_string(),
        description: "Current weather".to_string(),
        parameters: json!({"type": "object", "properties": {"city": {"type": "string"}}}),
    }]);

    // Act
    let response = adapter.generate_content(request).await.expect("completion");

    // Assert
    assert_eq!(
        response.content,
        vec![ContentPart::function_call("call_1", "get_weather", json!({"city": "Paris"}))]
    );
    assert_eq!(response.finish_reason, Some(FinishReason::FunctionCall));
}

// ============================================================================
// Error classification
// ============================================================================

#[tokio::test]
async fn test_unauthorized_maps_to_authentication() {
    // Arrange
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(error_response(401, "Incorrect API key provided"))
        .mount(&server)
        .await;
    let adapter = OpenAIAdapter::new(openai_config(&server.uri())).expect("adapter");

    // Act
    let error = adapter
        .generate_content(user_request("Hello"))
        .await
        .expect_err("401 must fail");

    // Assert
    assert!(matches!(error, LlmError::Authentication { .. }));
    assert!(error.to_string().contains("Incorrect API key provided"));
    assert!(error.stops_fallback());
}

#[tokio::test]
async fn test_rate_limit_carries_retry_after() {
    // Arrange
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(error_response(429, "Rate limit reached").insert_header("retry-after", "7"))
        .mount(&server)
        .await;
    let adapter = OpenAIAdapter::new(openai_config(&server.uri())).expect("adapter");

    // Act
    let error = adapter
        .generate_content(user_request("Hello"))
        .await
        .expect_err("429 must fail");

    // Assert
    match error {
        LlmError::RateLimit {
            retry_after_seconds,
            ..
        } => assert_eq!(retry_after_seconds, Some(7)),
        other => panic!("expected RateLimit, got {other:?}"),
    }
}

#[tokio::test]
async fn test_service_unavailable_is_retryable() {
    // Arrange
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(error_response(503, "Overloaded"))
        .mount(&server)
        .await;
    let adapter = OpenAIAdapter::new(openai_config(&server.uri())).expect("adapter");

    // Act
    let error = adapter
        .generate_content(user_request("Hello"))
        .await
        .expect_err("503 must fail");

    // Assert
    assert!(matches!(error, LlmError::ServiceUnavailable { .. }));
    assert!(error.is_retryable());
    assert!(!error.stops_fallback());
}

#[tokio::test]
async fn test_bad_request_mentioning_moderation_is_content_filter() {
    // Arrange
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(error_response(400, "Request blocked by moderation"))
        .mount(&server)
        .await;
    let adapter = OpenAIAdapter::new(openai_config(&server.uri())).expect("adapter");

    // Act
    let error = adapter
        .generate_content(user_request("Hello"))
        .await
        .expect_err("400 must fail");

    // Assert
    assert!(matches!(error, LlmError::ContentFilter { .. }));
}

#[tokio::test]
async fn test_outage_is_left_to_the_router() {
    // Arrange
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(error_response(503, "Overloaded"))
        .expect(1)
        .mount(&server)
        .await;
    let config = openai_config(&server.uri()).with_retry_policy(retrying_policy());
    let adapter = OpenAIAdapter::new(config).expect("adapter");

    // Act
    let error = adapter
        .generate_content(user_request("Hello"))
        .await
        .expect_err("503 is not re-sent");

    // Assert
    assert!(matches!(error, LlmError::ServiceUnavailable { .. }));
}

#[tokio::test]
async fn test_malformed_body_is_response_parsing_error() {
    // Arrange
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;
    let adapter = OpenAIAdapter::new(openai_config(&server.uri())).expect("adapter");

    // Act
    let error = adapter
        .generate_content(user_request("Hello"))
        .await
        .expect_err("garbage must fail");

    // Assert
    assert!(matches!(error, LlmError::ResponseParsing { .. }));
}

#[tokio::test]
async fn test_unreachable_server_is_network_error() {
    // Arrange
    let config = openai_config("http://127.0.0.1:1");
    let adapter = OpenAIAdapter::new(config).expect("adapter");

    // Act
    let error = adapter
        .generate_content(user_request("Hello"))
        .await
        .expect_err("nothing listens on port 1");

    // Assert
    assert!(matches!(
        error,
        LlmError::Network { .. } | LlmError::Timeout { .. }
    ));
}

// ============================================================================
// Streaming
// ============================================================================

#[tokio::test]
async fn test_stream_text_ends_with_single_done_chunk() {
    // Arrange
    let server = MockServer::start().await;
    let body = sse_body(&[
        json!({"choices": [{"index": 0, "delta": {"role": "assistant", "content": "Hello"}}]}),
        json!({"choices": [{"index": 0, "delta": {"content": " world"}}]}),
        json!({"choices": [{"index": 0, "delta": {}, "finish_reason": "stop"}]}),
    ]);
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_partial_json(json!({"stream": true})))
        .respond_with(sse_response(body))
        .mount(&server)
        .await;
    let adapter = OpenAIAdapter::new(openai_config(&server.uri())).expect("adapter");

    // Act
    let chunks: Vec<_> = adapter
        .generate_content_stream(user_request("Hello"))
        .await
        .expect("stream opens")
        .collect()
        .await;

    // Assert
    let chunks: Vec<_> = chunks.into_iter().map(|c| c.expect("chunk")).collect();
    let text: String = chunks.iter().map(|c| c.delta.text()).collect();
    assert_eq!(text, "Hello world");
    assert_eq!(chunks.iter().filter(|c| c.done).count(), 1);
    assert!(chunks.last().expect("chunks").done);
}

#[tokio::test]
async fn test_stream_reassembles_tool_call() {
    // Arrange
    let server = MockServer::start().await;
    let body = sse_body(&[
        json!({"choices": [{"index": 0, "delta": {"tool_calls": [
            {"index": 0, "id": "call_7", "type": "function", "function": {"name": "search", "arguments": ""}}
        ]}}]}),
        json!({"choices": [{"index": 0, "delta": {"tool_calls": [
            {"index": 0, "function": {"arguments": "{\"q\":\"ru"}}
        ]}}]}),
        json!({"choices": [{"index": 0, "delta": {"tool_calls": [
            {"index": 0, "function": {"arguments": "st\"}"}}
        ]}}]}),
        json!({"choices": [{"index": 0, "delta": {}, "finish_reason": "tool_calls"}]}),
    ]);
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(sse_response(body))
        .mount(&server)
        .await;
    let adapter = OpenAIAdapter::new(openai_config(&server.uri())).expect("adapter");

    // Act
    let chunks: Vec<_> = adapter
        .generate_content_stream(user_request("Search rust"))
        .await
        .expect("stream opens")
        .collect()
        .await;

    // Assert
    let calls: Vec<ContentPart> = chunks
        .into_iter()
        .map(|c| c.expect("chunk"))
        .flat_map(|c| c.delta.content)
        .filter(ContentPart::is_function_call)
        .collect();
    assert_eq!(
        calls,
        vec![ContentPart::function_call("call_7", "search", json!({"q": "rust"}))]
    );
}

#[tokio::test]
async fn test_stream_open_failure_is_classified() {
    // Arrange
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(error_response(401, "bad key"))
        .mount(&server)
        .await;
    let adapter = OpenAIAdapter::new(openai_config(&server.uri())).expect("adapter");

    // Act
    let result = adapter.generate_content_stream(user_request("Hello")).await;

    // Assert
    assert!(matches!(result, Err(LlmError::Authentication { .. })));
}

// ============================================================================
// Embeddings and models
// ============================================================================

#[tokio::test]
async fn test_embed_content_uses_default_embedding_model() {
    // Arrange
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/embeddings"))
        .and(body_partial_json(json!({
            "model": "text-embedding-3-small",
            "input": "embed me"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{"index": 0, "embedding": [0.1, 0.2, 0.3]}],
            "usage": {"prompt_tokens": 2, "total_tokens": 2}
        })))
        .mount(&server)
        .await;
    let adapter = OpenAIAdapter::new(openai_config(&server.uri())).expect("adapter");

    // Act
    let response = adapter
        .embed_content(EmbeddingRequest::new("embed me"))
        .await
        .expect("embedding");

    // Assert
    assert_eq!(response.embeddings, vec![vec![0.1, 0.2, 0.3]]);
}

#[tokio::test]
async fn test_model_listing_keeps_chat_models_sorted() {
    // Arrange
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/models"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [
                {"id": "gpt-4o-mini"},
                {"id": "text-embedding-3-small"},
                {"id": "whisper-1"},
                {"id": "gpt-4o"}
            ]
        })))
        .mount(&server)
        .await;
    let adapter = OpenAIAdapter::new(openai_config(&server.uri())).expect("adapter");

    // Act
    let models = adapter.get_available_models().await.expect("models");

    // Assert
    assert_eq!(models, vec!["gpt-4o".to_string(), "gpt-4o-mini".to_string()]);
}

#[tokio::test]
async fn test_model_listing_falls_back_to_known_models() {
    // Arrange
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/models"))
        .respond_with(error_response(500, "internal"))
        .mount(&server)
        .await;
    let adapter = OpenAIAdapter::new(openai_config(&server.uri())).expect("adapter");

    // Act
    let models = adapter.get_available_models().await.expect("models");

    // Assert
    assert!(models.contains(&"gpt-4o".to_string()));
}

#[tokio::test]
async fn test_validate_pings_models_endpoint() {
    // Arrange
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/models"))
        .and(header("authorization", "Bearer test-openai-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": []})))
        .expect(1)
        .mount(&server)
        .await;
    let adapter = OpenAIAdapter::new(openai_config(&server.uri())).expect("adapter");

    // Act
    let result = adapter.validate().await;

    // Assert
    assert!(result.is_ok());
}

#[tokio::test]
async fn test_count_tokens_is_local_estimate() {
    // Arrange
    let adapter = OpenAIAdapter::new(openai_config("http://127.0.0.1:1")).expect("adapter");

    // Act
    let counted = adapter
        .count_tokens(&user_request("a fairly short sentence to count"))
        .await
        .expect("estimate");

    // Assert
    assert!(counted.token_count > 0);
}
