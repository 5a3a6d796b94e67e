//! Unit Tests for OpenAI Stream Translation
//!
//! UNIT UNDER TEST: OpenAIStreamTranslator
//!
//! BUSINESS RESPONSIBILITY:
//!   - Turn chat-completions chunks into unified stream deltas
//!   - Reassemble tool calls streamed as fragments keyed by index
//!   - Flush unfinished tool calls when the stream ends without finish_reason
//!
//! TEST COVERAGE:
//!   - Text deltas
//!   - Fragmented tool call arguments emitted at finish_reason
//!   - End-of-stream flush through the chunk stream driver

use super::super::conversion::OpenAIStreamTranslator;
use crate::core_types::messages::{ContentPart, FinishReason};
use crate::internals::sse::{chunk_stream_from_bytes, FrameTranslator};
use futures_util::{stream, StreamExt};
use serde_json::json;

#[test]
fn test_text_delta_is_forwarded() {
    // Arrange
    let mut translator = OpenAIStreamTranslator::new();

    // Act
    let outcome = translator.translate(json!({
        "choices": [{"index": 0, "delta": {"content": "Hel"}, "finish_reason": null}]
    }));

    // Assert
    let delta = outcome.delta.expect("delta");
    assert_eq!(delta.text(), "Hel");
    assert!(!outcome.done);
    assert!(delta.finish_reason.is_none());
}

#[test]
fn test_fragmented_tool_call_is_emitted_at_finish_reason() {
    // Arrange
    let mut translator = OpenAIStreamTranslator::new();
    let fragments = [
        json!({"choices": [{"delta": {"tool_calls": [
            {"index": 0, "id": "call_9", "function": {"name": "search", "arguments": ""}}
        ]}}]}),
        json!({"choices": [{"delta": {"tool_calls": [
            {"index": 0, "function": {"arguments": "{\"q\":"}}
        ]}}]}),
        json!({"choices": [{"delta": {"tool_calls": [
            {"index": 0, "function": {"arguments": "\"rust\"}"}}
        ]}}]}),
    ];

    // Act
    for fragment in fragments {
        let outcome = translator.translate(fragment);
        assert!(outcome.delta.map_or(true, |d| d.content.is_empty()));
    }
    let last = translator
        .translate(json!({"choices": [{"delta": {}, "finish_reason": "tool_calls"}]}))
        .delta
        .expect("final delta");

    // Assert
    assert_eq!(last.finish_reason, Some(FinishReason::FunctionCall));
    assert_eq!(
        last.content,
        vec![ContentPart::function_call("call_9", "search", json!({"q": "rust"}))]
    );
    assert!(translator.finish().is_none());
}

#[tokio::test]
async fn test_pending_tool_calls_flush_at_end_of_body() {
    // Arrange: body ends without finish_reason or [DONE]
    let body = concat!(
        "data: {\"choices\":[{\"delta\":{\"tool_calls\":[{\"index\":0,\"id\":\"c1\",",
        "\"function\":{\"name\":\"f\",\"arguments\":\"{}\"}}]}}]}\n\n"
    );
    let bytes = stream::iter(vec![Ok::<_, reqwest::Error>(body.as_bytes().to_vec())]);

    // Act
    let chunks: Vec<_> = chunk_stream_from_bytes(
        "openai",
        Box::pin(bytes),
        OpenAIStreamTranslator::new(),
        None,
    )
    .collect()
    .await;

    // Assert
    assert_eq!(chunks.len(), 2);
    let flushed = chunks[0].as_ref().expect("flushed chunk");
    assert_eq!(flushed.delta.function_calls().len(), 1);
    assert!(!flushed.done);
    assert!(chunks[1].as_ref().expect("done chunk").done);
}
