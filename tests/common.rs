//! Test helper utilities for llm-router integration tests
//!
//! This module provides reusable test fixtures and helper functions
//! that are shared across multiple test modules.
//!
//! IMPORTANT: These helpers are test-only and should NEVER be used in production code.

// Allow dead code in test utilities - functions are used across different test files
#![allow(dead_code)]

use llm_router::{ModelConfig, RetryPolicy, UnifiedMessage, UnifiedRequest};
use serde_json::{json, Value};
use std::time::Duration;
use wiremock::ResponseTemplate;

/// Single attempt with short timeouts so error tests stay fast.
pub fn fast_retry_policy() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 1,
        initial_delay: Duration::from_millis(10),
        max_delay: Duration::from_millis(50),
        backoff_multiplier: 2.0,
        total_timeout: Duration::from_secs(10),
        request_timeout: Duration::from_secs(5),
    }
}

/// Two attempts; only transport failures use the second one.
pub fn retrying_policy() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 2,
        ..fast_retry_policy()
    }
}

pub fn openai_config(server_uri: &str) -> ModelConfig {
    ModelConfig::new("openai", "gpt-4o")
        .with_api_key("test-openai-key")
        .with_base_url(format!("{server_uri}/v1"))
        .with_retry_policy(fast_retry_policy())
}

pub fn claude_config(server_uri: &str) -> ModelConfig {
    ModelConfig::new("claude", "claude-3-5-sonnet-20241022")
        .with_api_key("test-claude-key")
        .with_base_url(format!("{server_uri}/v1"))
        .with_retry_policy(fast_retry_policy())
}

pub fn gemini_config(server_uri: &str) -> ModelConfig {
    ModelConfig::new("gemini", "gemini-2.5-flash")
        .with_api_key("test-gemini-key")
        .with_base_url(format!("{server_uri}/v1beta"))
        .with_retry_policy(fast_retry_policy())
}

pub fn custom_config(server_uri: &str) -> ModelConfig {
    ModelConfig::new("custom", "local-model")
        .with_base_url(server_uri)
        .with_retry_policy(fast_retry_policy())
}

pub fn user_request(text: &str) -> UnifiedRequest {
    UnifiedRequest::new(vec![UnifiedMessage::user(text)])
}

/// Chat-completions answer with a single text message.
pub fn openai_text_response(text: &str) -> Value {
    json!({
        "id": "chatcmpl-1",
        "model": "gpt-4o",
        "choices": [{
            "index": 0,
            "message": {"role": "assistant", "content": text},
            "finish_reason": "stop"
        }],
        "usage": {"prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15}
    })
}

/// Messages API answer with a single text block.
pub fn claude_text_response(text: &str) -> Value {
    json!({
        "id": "msg_1",
        "type": "message",
        "role": "assistant",
        "model": "claude-3-5-sonnet-20241022",
        "content": [{"type": "text", "text": text}],
        "stop_reason": "end_turn",
        "usage": {"input_tokens": 12, "output_tokens": 6}
    })
}

/// `data:` lines for each frame followed by `[DONE]`.
pub fn sse_body(frames: &[Value]) -> String {
    let mut body: String = frames
        .iter()
        .map(|frame| format!("data: {frame}\n\n"))
        .collect();
    body.push_str("data: [DONE]\n\n");
    body
}

pub fn sse_response(body: String) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .insert_header("content-type", "text/event-stream")
        .set_body_string(body)
}

pub fn error_response(status: u16, message: &str) -> ResponseTemplate {
    ResponseTemplate::new(status).set_body_json(json!({
        "error": {"message": message, "type": "error"}
    }))
}
