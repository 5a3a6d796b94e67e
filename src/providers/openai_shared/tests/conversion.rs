//! Unit Tests for OpenAI-Shared Conversion Functions
//!
//! UNIT UNDER TEST: unified_to_openai_request, openai_response_to_unified
//!
//! BUSINESS RESPONSIBILITY:
//!   - Convert unified conversations to chat-completions messages
//!   - Repair unmatched tool calls before they reach the provider
//!   - Convert tool definitions to OpenAI function tools
//!   - Convert chat-completions responses back to the unified shape
//!   - Map finish reasons and usage
//!
//! TEST COVERAGE:
//!   - System message placement and role mapping
//!   - String vs part-array content flattening, images as data URLs
//!   - Tool calls with JSON-string arguments and tool answers
//!   - Partially answered and unanswered tool calls
//!   - Response parsing: text, tool calls, bad arguments, empty choices

use super::super::conversion::*;
use super::super::types::*;
use crate::core_types::messages::{
    ContentPart, FinishReason, MessageRole, ToolDefinition, UnifiedMessage, UnifiedRequest,
};
use serde_json::json;

// ============================================================================
// Test Helper Functions
// ============================================================================

fn assistant_with_calls(text: Option<&str>, ids: &[&str]) -> UnifiedMessage {
    let mut content = Vec::new();
    if let Some(text) = text {
        content.push(ContentPart::text(text));
    }
    for id in ids {
        content.push(ContentPart::function_call(
            *id,
            "get_weather",
            json!({"city": "Paris"}),
        ));
    }
    UnifiedMessage::new(MessageRole::Assistant, content)
}

fn tool_answer(id: &str) -> UnifiedMessage {
    UnifiedMessage::function_response(id, "get_weather", json!({"temp": 21}))
}

fn response_from(value: serde_json::Value) -> OpenAIResponse {
    serde_json::from_value(value).expect("valid response fixture")
}

// ============================================================================
// Request conversion
// ============================================================================

#[cfg(test)]
mod request_conversion_tests {
    use super::*;

    #[test]
    fn test_system_message_leads_and_single_text_is_a_string() {
        // Arrange
        let request = UnifiedRequest::new(vec![UnifiedMessage::user("Hello")])
            .with_system_message("Be brief");

        // Act
        let converted = unified_to_openai_request(&request, "gpt-4o");

        // Assert
        assert_eq!(converted.model, "gpt-4o");
        assert_eq!(converted.messages.len(), 2);
        assert_eq!(converted.messages[0].role, "system");
        assert_eq!(
            converted.messages[0].content,
            Some(OpenAIContent::Text("Be brief".to_string()))
        );
        assert_eq!(
            converted.messages[1].content,
            Some(OpenAIContent::Text("Hello".to_string()))
        );
    }

    #[test]
    fn test_multimodal_content_becomes_part_array() {
        // Arrange
        let message = UnifiedMessage::new(
            MessageRole::User,
            vec![
                ContentPart::text("What is this?"),
                ContentPart::image("aGVsbG8=", "image/png"),
            ],
        );
        let request = UnifiedRequest::new(vec![message]);

        // Act
        let converted = unified_to_openai_request(&request, "gpt-4o");

        // Assert
        let Some(OpenAIContent::Parts(parts)) = &converted.messages[0].content else {
            panic!("expected part array");
        };
        assert_eq!(parts.len(), 2);
        assert_eq!(
            parts[1],
            OpenAIContentPart::ImageUrl {
                image_url: OpenAIImageUrl {
                    url: "data:image/png;base64,aGVsbG8=".to_string()
                }
            }
        );
    }

    #[test]
    fn test_matched_tool_calls_and_answers_are_translated() {
        // Arrange
        let request = UnifiedRequest::new(vec![
            UnifiedMessage::user("Weather?"),
            assistant_with_calls(None, &["call_1"]),
            tool_answer("call_1"),
        ]);

        // Act
        let converted = unified_to_openai_request(&request, "gpt-4o");

        // Assert
        assert_eq!(converted.messages.len(), 3);
        let assistant = &converted.messages[1];
        assert!(assistant.content.is_none());
        let calls = assistant.tool_calls.as_ref().expect("tool calls");
        assert_eq!(calls[0].id, "call_1");
        assert_eq!(calls[0].call_type, "function");
        assert_eq!(calls[0].function.arguments, r#"{"city":"Paris"}"#);

        let tool = &converted.messages[2];
        assert_eq!(tool.role, "tool");
        assert_eq!(tool.tool_call_id.as_deref(), Some("call_1"));
        assert_eq!(
            tool.content,
            Some(OpenAIContent::Text(r#"{"temp":21}"#.to_string()))
        );
    }

    #[test]
    fn test_partially_answered_calls_are_stripped_and_text_kept() {
        // Arrange: two calls, only one answered
        let request = UnifiedRequest::new(vec![
            UnifiedMessage::user("Weather in two cities?"),
            assistant_with_calls(Some("Checking both."), &["call_1", "call_2"]),
            tool_answer("call_1"),
        ]);

        // Act
        let converted = unified_to_openai_request(&request, "gpt-4o");

        // Assert
        let serialized = serde_json::to_value(&converted).expect("serializes");
        let assistant = &serialized["messages"][1];
        assert_eq!(assistant["content"], "Checking both.");
        assert!(assistant.get("tool_calls").is_none());
        assert!(converted.messages.iter().all(|m| m.role != "tool"));
    }

    #[test]
    fn test_unanswered_calls_only_message_is_removed() {
        // Arrange
        let messages = vec![
            UnifiedMessage::user("Weather?"),
            assistant_with_calls(None, &["call_1"]),
            UnifiedMessage::user("Never mind"),
        ];
        let request = UnifiedRequest::new(messages.clone());

        // Act
        let converted = unified_to_openai_request(&request, "gpt-4o");

        // Assert
        assert_eq!(converted.messages.len(), messages.len() - 1);
        assert!(converted.messages.iter().all(|m| m.tool_calls.is_none()));
    }

    #[test]
    fn test_tool_messages_never_exceed_retained_call_ids() {
        // Arrange
        let request = UnifiedRequest::new(vec![
            tool_answer("orphan"),
            assistant_with_calls(None, &["a"]),
            tool_answer("a"),
            tool_answer("a"),
        ]);

        // Act
        let converted = unified_to_openai_request(&request, "gpt-4o");

        // Assert
        let call_ids: usize = converted
            .messages
            .iter()
            .filter_map(|m| m.tool_calls.as_ref())
            .map(Vec::len)
            .sum();
        let tool_messages = converted.messages.iter().filter(|m| m.role == "tool").count();
        assert!(tool_messages <= call_ids);
        assert_eq!(tool_messages, 1);
    }

    #[test]
    fn test_tools_and_parameters_are_copied() {
        // Arrange
        let request = UnifiedRequest::new(vec![UnifiedMessage::user("hi")])
            .with_tools(vec![ToolDefinition {
                name: "get_weather".to_string(),
                description: "Current weather".to_string(),
                parameters: json!({"type": "object"}),
            }])
            .with_max_tokens(256)
            .with_temperature(0.2);

        // Act
        let converted = unified_to_openai_request(&request, "gpt-4o");

        // Assert
        let tools = converted.tools.expect("tools");
        assert_eq!(tools[0].tool_type, "function");
        assert_eq!(tools[0].function.name, "get_weather");
        assert_eq!(converted.max_tokens, Some(256));
        assert_eq!(converted.temperature, Some(0.2));
        assert_eq!(converted.stream, None);
    }
}

// ============================================================================
// Response conversion
// ============================================================================

#[cfg(test)]
mod response_conversion_tests {
    use super::*;

    #[test]
    fn test_text_response_with_usage() {
        // Arrange
        let response = response_from(json!({
            "model": "gpt-4o",
            "choices": [{"message": {"role": "assistant", "content": "Hi!"}, "finish_reason": "stop"}],
            "usage": {"prompt_tokens": 5, "completion_tokens": 2, "total_tokens": 7}
        }));

        // Act
        let unified = openai_response_to_unified(response);

        // Assert
        assert_eq!(unified.text(), "Hi!");
        assert_eq!(unified.finish_reason, Some(FinishReason::Stop));
        assert_eq!(unified.usage.map(|u| u.total_tokens), Some(7));
        assert_eq!(unified.model.as_deref(), Some("gpt-4o"));
    }

    #[test]
    fn test_tool_calls_are_parsed_and_bad_arguments_skipped() {
        // Arrange
        let response = response_from(json!({
            "choices": [{
                "message": {
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [
                        {"id": "c1", "type": "function", "function": {"name": "ok", "arguments": "{\"x\":1}"}},
                        {"id": "c2", "type": "function", "function": {"name": "broken", "arguments": "{not json"}},
                        {"id": "c3", "type": "function", "function": {"name": "empty", "arguments": ""}}
                    ]
                },
                "finish_reason": "tool_calls"
            }]
        }));

        // Act
        let unified = openai_response_to_unified(response);

        // Assert
        assert_eq!(unified.finish_reason, Some(FinishReason::FunctionCall));
        assert_eq!(
            unified.content,
            vec![
                ContentPart::function_call("c1", "ok", json!({"x": 1})),
                ContentPart::function_call("c3", "empty", json!({})),
            ]
        );
    }

    #[test]
    fn test_no_choices_yields_empty_stop() {
        // Act
        let unified = openai_response_to_unified(response_from(json!({"choices": []})));

        // Assert
        assert!(unified.content.is_empty());
        assert_eq!(unified.finish_reason, Some(FinishReason::Stop));
        assert!(unified.usage.is_none());
    }

    #[test]
    fn test_finish_reason_mapping() {
        assert_eq!(map_finish_reason("stop"), FinishReason::Stop);
        assert_eq!(map_finish_reason("length"), FinishReason::Length);
        assert_eq!(map_finish_reason("tool_calls"), FinishReason::FunctionCall);
        assert_eq!(map_finish_reason("function_call"), FinishReason::FunctionCall);
        assert_eq!(map_finish_reason("content_filter"), FinishReason::ContentFilter);
        assert_eq!(map_finish_reason("something_new"), FinishReason::Stop);
    }
}
