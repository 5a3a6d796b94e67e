//! Translation between the unified model and the OpenAI chat-completions shape
//!
//! Used by the OpenAI adapter for OpenAI itself and every OpenAI-compatible
//! provider, and by the custom adapter in `openai` response format.

use super::types::*;
use crate::core_types::messages::{
    ContentPart, FinishReason, MessageRole, TokenUsage, ToolDefinition, UnifiedMessage,
    UnifiedRequest, UnifiedResponse,
};
use crate::core_types::tool_pairing::repair_tool_call_pairs;
use crate::internals::sse::{FrameOutcome, FrameTranslator};
use crate::logging::{log_debug, log_warn};
use std::collections::BTreeMap;

/// Build an OpenAI chat-completions request.
///
/// Unmatched tool calls are repaired before translation, so the result never
/// carries a `tool_calls` entry without its `tool` answer.
pub fn unified_to_openai_request(request: &UnifiedRequest, model: &str) -> OpenAIRequest {
    let mut messages = Vec::with_capacity(request.messages.len() + 1);

    if let Some(system) = request.system_message.as_ref().filter(|s| !s.is_empty()) {
        messages.push(text_message("system", system.clone()));
    }

    for message in repair_tool_call_pairs(&request.messages) {
        convert_message(&message, &mut messages);
    }

    OpenAIRequest {
        model: model.to_string(),
        messages,
        tools: request
            .tools
            .as_deref()
            .filter(|tools| !tools.is_empty())
            .map(convert_tools),
        stream: request.stream,
        temperature: request.temperature,
        max_tokens: request.max_tokens,
    }
}

fn text_message(role: &str, text: String) -> OpenAIMessage {
    OpenAIMessage {
        role: role.to_string(),
        content: Some(OpenAIContent::Text(text)),
        tool_calls: None,
        tool_call_id: None,
    }
}

fn convert_message(message: &UnifiedMessage, out: &mut Vec<OpenAIMessage>) {
    // Tool answers become standalone `tool` messages and must directly
    // follow the assistant message that made the calls.
    for part in &message.content {
        if let ContentPart::FunctionResponse { response, id, .. } = part {
            out.push(OpenAIMessage {
                role: "tool".to_string(),
                content: Some(OpenAIContent::Text(stringify_response(response))),
                tool_calls: None,
                tool_call_id: Some(id.clone().unwrap_or_default()),
            });
        }
    }

    let role = match message.role {
        MessageRole::System => "system",
        MessageRole::User => "user",
        MessageRole::Assistant => "assistant",
        // Plain content left on a function message is passed on as user input
        MessageRole::Function => "user",
    };

    let content = convert_content(&message.content);
    let tool_calls: Vec<OpenAIToolCall> = message
        .content
        .iter()
        .filter_map(|part| match part {
            ContentPart::FunctionCall { name, args, id } => Some(OpenAIToolCall {
                id: id.clone().unwrap_or_default(),
                call_type: "function".to_string(),
                function: OpenAIFunctionCall {
                    name: name.clone(),
                    arguments: args.to_string(),
                },
            }),
            _ => None,
        })
        .collect();

    if content.is_none() && tool_calls.is_empty() {
        return;
    }

    out.push(OpenAIMessage {
        role: role.to_string(),
        content,
        tool_calls: (!tool_calls.is_empty()).then_some(tool_calls),
        tool_call_id: None,
    });
}

fn convert_content(parts: &[ContentPart]) -> Option<OpenAIContent> {
    let converted: Vec<OpenAIContentPart> = parts
        .iter()
        .filter_map(|part| match part {
            ContentPart::Text { text } => Some(OpenAIContentPart::Text { text: text.clone() }),
            ContentPart::Image { data, mime_type } => Some(OpenAIContentPart::ImageUrl {
                image_url: OpenAIImageUrl {
                    url: image_url(data, mime_type),
                },
            }),
            _ => None,
        })
        .collect();

    match converted.as_slice() {
        [] => None,
        [OpenAIContentPart::Text { text }] => Some(OpenAIContent::Text(text.clone())),
        _ => Some(OpenAIContent::Parts(converted)),
    }
}

fn image_url(data: &str, mime_type: &str) -> String {
    if data.starts_with("data:") || data.starts_with("http://") || data.starts_with("https://") {
        data.to_string()
    } else {
        format!("data:{mime_type};base64,{data}")
    }
}

/// Strings pass through verbatim, anything else is JSON-encoded.
pub(crate) fn stringify_response(response: &serde_json::Value) -> String {
    match response {
        serde_json::Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

fn convert_tools(tools: &[ToolDefinition]) -> Vec<OpenAITool> {
    tools
        .iter()
        .map(|tool| OpenAITool {
            tool_type: "function".to_string(),
            function: OpenAIFunctionDefinition {
                name: tool.name.clone(),
                description: tool.description.clone(),
                parameters: tool.parameters.clone(),
            },
        })
        .collect()
}

/// Map an OpenAI `finish_reason` string.
pub fn map_finish_reason(reason: &str) -> FinishReason {
    match reason {
        "length" => FinishReason::Length,
        "tool_calls" | "function_call" => FinishReason::FunctionCall,
        "content_filter" => FinishReason::ContentFilter,
        _ => FinishReason::Stop,
    }
}

/// Parse a tool-call arguments string; an empty string means no arguments.
pub(crate) fn parse_arguments(name: &str, arguments: &str) -> Option<serde_json::Value> {
    if arguments.trim().is_empty() {
        return Some(serde_json::json!({}));
    }
    match serde_json::from_str(arguments) {
        Ok(value) => Some(value),
        Err(e) => {
            log_warn!(
                function = %name,
                error = %e,
                "Skipping tool call with unparsable arguments"
            );
            None
        }
    }
}

/// Translate a chat-completions response (or a single stream chunk).
pub fn openai_response_to_unified(response: OpenAIResponse) -> UnifiedResponse {
    let usage = response.usage.map(TokenUsage::from);
    let model = response.model;

    let Some(choice) = response.choices.into_iter().next() else {
        return UnifiedResponse {
            content: Vec::new(),
            finish_reason: Some(FinishReason::Stop),
            usage,
            model,
            metadata: None,
        };
    };

    let message = choice.message.or(choice.delta).unwrap_or_default();
    let mut content = Vec::new();

    if let Some(text) = message.content.filter(|t| !t.is_empty()) {
        content.push(ContentPart::text(text));
    }

    for call in message.tool_calls.unwrap_or_default() {
        let function = call.function.unwrap_or_default();
        let name = function.name.unwrap_or_default();
        let arguments = function.arguments.unwrap_or_default();
        if let Some(args) = parse_arguments(&name, &arguments) {
            content.push(ContentPart::FunctionCall {
                name,
                args,
                id: call.id,
            });
        }
    }

    UnifiedResponse {
        content,
        finish_reason: choice.finish_reason.as_deref().map(map_finish_reason),
        usage,
        model,
        metadata: None,
    }
}

// ============================================================================
// Streaming
// ============================================================================

#[derive(Debug, Default)]
struct PartialToolCall {
    id: Option<String>,
    name: String,
    arguments: String,
}

/// Stream translator for chat-completions chunks.
///
/// Tool calls arrive as fragments keyed by `index`; they are accumulated and
/// emitted whole in the chunk carrying `finish_reason`, or at end of stream.
#[derive(Debug, Default)]
pub struct OpenAIStreamTranslator {
    pending: BTreeMap<u32, PartialToolCall>,
}

impl OpenAIStreamTranslator {
    pub fn new() -> Self {
        Self::default()
    }

    fn take_tool_calls(&mut self) -> Vec<ContentPart> {
        std::mem::take(&mut self.pending)
            .into_values()
            .filter_map(|call| {
                let args = parse_arguments(&call.name, &call.arguments)?;
                Some(ContentPart::FunctionCall {
                    name: call.name,
                    args,
                    id: call.id,
                })
            })
            .collect()
    }
}

impl FrameTranslator for OpenAIStreamTranslator {
    fn translate(&mut self, frame: serde_json::Value) -> FrameOutcome {
        let chunk: OpenAIResponse = match serde_json::from_value(frame) {
            Ok(chunk) => chunk,
            Err(e) => {
                log_debug!(error = %e, "Skipping unrecognized chat-completions chunk");
                return FrameOutcome::skip();
            }
        };

        let mut delta = UnifiedResponse {
            usage: chunk.usage.map(TokenUsage::from),
            model: chunk.model,
            ..Default::default()
        };

        let Some(choice) = chunk.choices.into_iter().next() else {
            return FrameOutcome::delta(delta);
        };
        let message = choice.delta.or(choice.message).unwrap_or_default();

        if let Some(text) = message.content.filter(|t| !t.is_empty()) {
            delta.content.push(ContentPart::text(text));
        }

        for (position, fragment) in message.tool_calls.unwrap_or_default().into_iter().enumerate() {
            let index = fragment.index.unwrap_or(position as u32);
            let entry = self.pending.entry(index).or_default();
            if let Some(id) = fragment.id.filter(|id| !id.is_empty()) {
                entry.id = Some(id);
            }
            if let Some(function) = fragment.function {
                if let Some(name) = function.name {
                    entry.name.push_str(&name);
                }
                if let Some(arguments) = function.arguments {
                    entry.arguments.push_str(&arguments);
                }
            }
        }

        if let Some(reason) = choice.finish_reason.as_deref() {
            delta.content.extend(self.take_tool_calls());
            delta.finish_reason = Some(map_finish_reason(reason));
        }

        FrameOutcome::delta(delta)
    }

    fn finish(&mut self) -> Option<UnifiedResponse> {
        if self.pending.is_empty() {
            return None;
        }
        Some(UnifiedResponse {
            content: self.take_tool_calls(),
            finish_reason: Some(FinishReason::FunctionCall),
            ..Default::default()
        })
    }
}
