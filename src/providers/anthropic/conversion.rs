//! Message conversion between unified format and Anthropic API format

use super::types::{
    AnthropicContent, AnthropicContentBlock, AnthropicImageSource, AnthropicMessage,
    AnthropicRequest, AnthropicResponse, AnthropicResponseBlock, AnthropicTool, AnthropicUsage,
};
use crate::core_types::messages::{
    ContentPart, FinishReason, MessageRole, TokenUsage, ToolDefinition, UnifiedMessage,
    UnifiedRequest, UnifiedResponse,
};
use crate::core_types::tool_pairing::repair_tool_call_pairs;
use crate::internals::sse::{FrameOutcome, FrameTranslator};
use crate::logging::log_debug;
use crate::providers::openai_shared::conversion::{parse_arguments, stringify_response};
use crate::providers::strip_data_url;
use serde_json::Value;
use std::collections::BTreeMap;

/// Used when neither the request nor the config sets `max_tokens`.
pub const DEFAULT_MAX_TOKENS: u32 = 4096;

/// Build an Anthropic Messages request.
///
/// System text moves to the top-level `system` field and consecutive
/// same-role messages are merged, since the API requires strict
/// user/assistant alternation.
pub fn unified_to_anthropic_request(request: &UnifiedRequest, model: &str) -> AnthropicRequest {
    let repaired = repair_tool_call_pairs(&request.messages);

    let mut system_parts: Vec<String> = request
        .system_message
        .iter()
        .filter(|s| !s.is_empty())
        .cloned()
        .collect();
    let mut messages: Vec<AnthropicMessage> = Vec::with_capacity(repaired.len());

    for message in &repaired {
        if message.role == MessageRole::System {
            let text = message.text();
            if !text.is_empty() {
                system_parts.push(text);
            }
            continue;
        }
        if let Some(converted) = convert_message(message) {
            combine_or_add_message(&mut messages, converted);
        }
    }

    AnthropicRequest {
        model: model.to_string(),
        messages,
        system: (!system_parts.is_empty()).then(|| system_parts.join("\n\n")),
        max_tokens: request.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
        temperature: request.temperature,
        tools: request
            .tools
            .as_deref()
            .filter(|tools| !tools.is_empty())
            .map(convert_tools),
        stream: request.stream,
    }
}

fn convert_message(message: &UnifiedMessage) -> Option<AnthropicMessage> {
    let role = match message.role {
        MessageRole::Assistant => "assistant",
        // Tool results travel in user turns
        MessageRole::User | MessageRole::Function | MessageRole::System => "user",
    };

    let blocks: Vec<AnthropicContentBlock> =
        message.content.iter().filter_map(convert_part).collect();

    let content = match blocks.as_slice() {
        [] => return None,
        [AnthropicContentBlock::Text { text }] => AnthropicContent::Text(text.clone()),
        _ => AnthropicContent::Blocks(blocks),
    };

    Some(AnthropicMessage {
        role: role.to_string(),
        content,
    })
}

fn convert_part(part: &ContentPart) -> Option<AnthropicContentBlock> {
    match part {
        ContentPart::Text { text } if text.is_empty() => None,
        ContentPart::Text { text } => Some(AnthropicContentBlock::Text { text: text.clone() }),
        ContentPart::Image { data, mime_type } => Some(AnthropicContentBlock::Image {
            source: AnthropicImageSource {
                source_type: "base64".to_string(),
                media_type: mime_type.clone(),
                data: strip_data_url(data).to_string(),
            },
        }),
        ContentPart::FunctionCall { name, args, id } => Some(AnthropicContentBlock::ToolUse {
            id: id.clone().unwrap_or_default(),
            name: name.clone(),
            input: args.clone(),
        }),
        ContentPart::FunctionResponse { response, id, .. } => {
            Some(AnthropicContentBlock::ToolResult {
                tool_use_id: id.clone().unwrap_or_default(),
                content: stringify_response(response),
            })
        }
    }
}

fn combine_or_add_message(messages: &mut Vec<AnthropicMessage>, message: AnthropicMessage) {
    if let Some(last) = messages.last_mut() {
        if last.role == message.role {
            log_debug!(
                provider = "claude",
                role = %message.role,
                "Combining consecutive messages with same role"
            );
            merge_content_blocks(&mut last.content, message.content);
            return;
        }
    }
    messages.push(message);
}

fn merge_content_blocks(existing: &mut AnthropicContent, new: AnthropicContent) {
    let mut blocks = match std::mem::replace(existing, AnthropicContent::Blocks(Vec::new())) {
        AnthropicContent::Blocks(blocks) => blocks,
        AnthropicContent::Text(text) => vec![AnthropicContentBlock::Text { text }],
    };
    match new {
        AnthropicContent::Blocks(new_blocks) => blocks.extend(new_blocks),
        AnthropicContent::Text(text) => blocks.push(AnthropicContentBlock::Text { text }),
    }
    *existing = AnthropicContent::Blocks(blocks);
}

fn convert_tools(tools: &[ToolDefinition]) -> Vec<AnthropicTool> {
    tools
        .iter()
        .map(|tool| AnthropicTool {
            name: tool.name.clone(),
            description: tool.description.clone(),
            input_schema: tool.parameters.clone(),
        })
        .collect()
}

/// Map an Anthropic `stop_reason` string.
pub fn map_stop_reason(reason: &str) -> FinishReason {
    match reason {
        "max_tokens" => FinishReason::Length,
        "tool_use" => FinishReason::FunctionCall,
        "refusal" => FinishReason::ContentFilter,
        _ => FinishReason::Stop,
    }
}

impl From<AnthropicUsage> for TokenUsage {
    fn from(usage: AnthropicUsage) -> Self {
        TokenUsage::new(usage.input_tokens, usage.output_tokens)
    }
}

/// Translate a Messages API response.
pub fn anthropic_response_to_unified(response: AnthropicResponse) -> UnifiedResponse {
    let content = response
        .content
        .into_iter()
        .filter_map(|block| match block {
            AnthropicResponseBlock::Text { text } if !text.is_empty() => {
                Some(ContentPart::text(text))
            }
            AnthropicResponseBlock::ToolUse { id, name, input } => {
                Some(ContentPart::function_call(id, name, input))
            }
            _ => None,
        })
        .collect();

    UnifiedResponse {
        content,
        finish_reason: Some(
            response
                .stop_reason
                .as_deref()
                .map_or(FinishReason::Stop, map_stop_reason),
        ),
        usage: response.usage.map(TokenUsage::from),
        model: response.model,
        metadata: None,
    }
}

// ============================================================================
// Streaming
// ============================================================================

#[derive(Debug)]
struct PendingToolUse {
    id: String,
    name: String,
    input_json: String,
}

/// Stream translator for Messages API events.
///
/// Text arrives as `text_delta`s; tool input arrives as `input_json_delta`
/// fragments and is emitted whole at `content_block_stop`. `message_stop`
/// ends the stream.
#[derive(Debug, Default)]
pub struct AnthropicStreamTranslator {
    tool_blocks: BTreeMap<u64, PendingToolUse>,
    input_tokens: u32,
    model: Option<String>,
}

impl AnthropicStreamTranslator {
    pub fn new() -> Self {
        Self::default()
    }

    fn complete_tool_use(tool: PendingToolUse) -> Option<ContentPart> {
        let args = parse_arguments(&tool.name, &tool.input_json)?;
        Some(ContentPart::function_call(tool.id, tool.name, args))
    }
}

fn text_delta(text: &str) -> FrameOutcome {
    if text.is_empty() {
        return FrameOutcome::skip();
    }
    FrameOutcome::delta(UnifiedResponse {
        content: vec![ContentPart::text(text)],
        ..Default::default()
    })
}

impl FrameTranslator for AnthropicStreamTranslator {
    fn translate(&mut self, frame: Value) -> FrameOutcome {
        let index = frame.get("index").and_then(Value::as_u64).unwrap_or(0);

        match frame.get("type").and_then(Value::as_str).unwrap_or_default() {
            "message_start" => {
                if let Some(tokens) = frame
                    .pointer("/message/usage/input_tokens")
                    .and_then(Value::as_u64)
                {
                    self.input_tokens = u32::try_from(tokens).unwrap_or(u32::MAX);
                }
                self.model = frame
                    .pointer("/message/model")
                    .and_then(Value::as_str)
                    .map(str::to_string);
                FrameOutcome::skip()
            }
            "content_block_start" => {
                let block = frame.get("content_block").cloned().unwrap_or_default();
                match block.get("type").and_then(Value::as_str) {
                    Some("tool_use") => {
                        self.tool_blocks.insert(
                            index,
                            PendingToolUse {
                                id: str_field(&block, "id"),
                                name: str_field(&block, "name"),
                                input_json: String::new(),
                            },
                        );
                        FrameOutcome::skip()
                    }
                    Some("text") => text_delta(&str_field(&block, "text")),
                    _ => FrameOutcome::skip(),
                }
            }
            "content_block_delta" => {
                let delta = frame.get("delta").cloned().unwrap_or_default();
                match delta.get("type").and_then(Value::as_str) {
                    Some("text_delta") => text_delta(&str_field(&delta, "text")),
                    Some("input_json_delta") => {
                        if let Some(tool) = self.tool_blocks.get_mut(&index) {
                            tool.input_json.push_str(&str_field(&delta, "partial_json"));
                        }
                        FrameOutcome::skip()
                    }
                    _ => FrameOutcome::skip(),
                }
            }
            "content_block_stop" => match self.tool_blocks.remove(&index) {
                Some(tool) => match Self::complete_tool_use(tool) {
                    Some(call) => FrameOutcome::delta(UnifiedResponse {
                        content: vec![call],
                        ..Default::default()
                    }),
                    None => FrameOutcome::skip(),
                },
                None => FrameOutcome::skip(),
            },
            "message_delta" => {
                let finish_reason = frame
                    .pointer("/delta/stop_reason")
                    .and_then(Value::as_str)
                    .map(map_stop_reason);
                let usage = frame
                    .pointer("/usage/output_tokens")
                    .and_then(Value::as_u64)
                    .map(|out| {
                        TokenUsage::new(self.input_tokens, u32::try_from(out).unwrap_or(u32::MAX))
                    });
                FrameOutcome::delta(UnifiedResponse {
                    finish_reason,
                    usage,
                    model: self.model.clone(),
                    ..Default::default()
                })
            }
            "message_stop" => FrameOutcome::stop(),
            "error" => {
                let message = frame
                    .pointer("/error/message")
                    .and_then(Value::as_str)
                    .unwrap_or("stream error event");
                FrameOutcome::error(message)
            }
            // ping and unknown events
            _ => FrameOutcome::skip(),
        }
    }

    fn finish(&mut self) -> Option<UnifiedResponse> {
        if self.tool_blocks.is_empty() {
            return None;
        }
        let content: Vec<ContentPart> = std::mem::take(&mut self.tool_blocks)
            .into_values()
            .filter_map(Self::complete_tool_use)
            .collect();
        Some(UnifiedResponse {
            content,
            finish_reason: Some(FinishReason::FunctionCall),
            ..Default::default()
        })
    }
}

fn str_field(value: &Value, key: &str) -> String {
    value
        .get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}
