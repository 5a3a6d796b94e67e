//! Translation between the unified model and the Gemini `generateContent` shape

use super::types::*;
use crate::core_types::messages::{
    ContentPart, FinishReason, MessageRole, TokenUsage, ToolDefinition, UnifiedMessage,
    UnifiedRequest, UnifiedResponse,
};
use crate::core_types::tool_pairing::repair_tool_call_pairs;
use crate::internals::sse::{FrameOutcome, FrameTranslator};
use crate::logging::log_debug;
use crate::providers::strip_data_url;
use serde_json::{json, Value};

/// Build a Gemini request. The model travels in the URL, not the body.
pub fn unified_to_gemini_request(request: &UnifiedRequest) -> GeminiRequest {
    let repaired = repair_tool_call_pairs(&request.messages);

    let mut system_parts: Vec<String> = request
        .system_message
        .iter()
        .filter(|s| !s.is_empty())
        .cloned()
        .collect();
    let mut contents: Vec<GeminiContent> = Vec::with_capacity(repaired.len());

    for message in &repaired {
        if message.role == MessageRole::System {
            let text = message.text();
            if !text.is_empty() {
                system_parts.push(text);
            }
            continue;
        }
        let Some(content) = convert_message(message) else {
            continue;
        };
        match contents.last_mut() {
            Some(last) if last.role == content.role => last.parts.extend(content.parts),
            _ => contents.push(content),
        }
    }

    let generation_config = (request.max_tokens.is_some() || request.temperature.is_some())
        .then(|| GeminiGenerationConfig {
            temperature: request.temperature,
            max_output_tokens: request.max_tokens,
        });

    GeminiRequest {
        contents,
        system_instruction: (!system_parts.is_empty()).then(|| GeminiContent {
            role: None,
            parts: vec![GeminiPart::text(system_parts.join("\n\n"))],
        }),
        generation_config,
        tools: request
            .tools
            .as_deref()
            .filter(|tools| !tools.is_empty())
            .map(convert_tools),
    }
}

fn convert_message(message: &UnifiedMessage) -> Option<GeminiContent> {
    let role = match message.role {
        MessageRole::Assistant => "model",
        MessageRole::User | MessageRole::Function | MessageRole::System => "user",
    };
    let parts: Vec<GeminiPart> = message.content.iter().filter_map(convert_part).collect();
    if parts.is_empty() {
        return None;
    }
    Some(GeminiContent {
        role: Some(role.to_string()),
        parts,
    })
}

fn convert_part(part: &ContentPart) -> Option<GeminiPart> {
    let converted = match part {
        ContentPart::Text { text } if text.is_empty() => return None,
        ContentPart::Text { text } => GeminiPart::text(text.clone()),
        ContentPart::Image { data, mime_type } => GeminiPart {
            inline_data: Some(GeminiInlineData {
                mime_type: mime_type.clone(),
                data: strip_data_url(data).to_string(),
            }),
            ..Default::default()
        },
        ContentPart::FunctionCall { name, args, .. } => GeminiPart {
            function_call: Some(GeminiFunctionCall {
                name: name.clone(),
                args: args.clone(),
            }),
            ..Default::default()
        },
        ContentPart::FunctionResponse { name, response, .. } => GeminiPart {
            function_response: Some(GeminiFunctionResponse {
                name: name.clone(),
                response: wrap_response(response),
            }),
            ..Default::default()
        },
    };
    Some(converted)
}

/// Gemini only accepts objects as function responses.
fn wrap_response(response: &Value) -> Value {
    if response.is_object() {
        response.clone()
    } else {
        json!({ "content": response })
    }
}

fn convert_tools(tools: &[ToolDefinition]) -> Vec<GeminiTool> {
    vec![GeminiTool {
        function_declarations: tools
            .iter()
            .map(|tool| GeminiFunctionDeclaration {
                name: tool.name.clone(),
                description: Some(tool.description.clone()).filter(|d| !d.is_empty()),
                parameters: Some(tool.parameters.clone()).filter(|p| !p.is_null()),
            })
            .collect(),
    }]
}

/// Map a Gemini `finishReason` string.
pub fn map_finish_reason(reason: &str) -> FinishReason {
    match reason {
        "MAX_TOKENS" => FinishReason::Length,
        "SAFETY" | "RECITATION" | "BLOCKLIST" | "PROHIBITED_CONTENT" | "SPII" => {
            FinishReason::ContentFilter
        }
        _ => FinishReason::Stop,
    }
}

impl From<GeminiUsageMetadata> for TokenUsage {
    fn from(usage: GeminiUsageMetadata) -> Self {
        let mut mapped = TokenUsage::new(usage.prompt_token_count, usage.candidates_token_count);
        // Reported totals include thinking tokens
        if usage.total_token_count > mapped.total_tokens {
            mapped.total_tokens = usage.total_token_count;
        }
        mapped
    }
}

/// Gemini does not assign ids to function calls.
fn generated_call_id() -> String {
    format!("call_{}", uuid::Uuid::new_v4().simple())
}

fn convert_response(response: GeminiResponse, default_finish: bool) -> UnifiedResponse {
    let usage = response.usage_metadata.map(TokenUsage::from);
    let model = response.model_version;

    let Some(candidate) = response.candidates.into_iter().next() else {
        return UnifiedResponse {
            finish_reason: default_finish.then_some(FinishReason::Stop),
            usage,
            model,
            ..Default::default()
        };
    };

    let mut content = Vec::new();
    for part in candidate.content.map(|c| c.parts).unwrap_or_default() {
        if let Some(text) = part.text.filter(|t| !t.is_empty()) {
            content.push(ContentPart::text(text));
        }
        if let Some(call) = part.function_call {
            content.push(ContentPart::function_call(
                generated_call_id(),
                call.name,
                call.args,
            ));
        }
    }

    let has_calls = content.iter().any(ContentPart::is_function_call);
    let finish_reason = match candidate.finish_reason.as_deref() {
        _ if has_calls => Some(FinishReason::FunctionCall),
        Some(reason) => Some(map_finish_reason(reason)),
        None if default_finish => Some(FinishReason::Stop),
        None => None,
    };

    UnifiedResponse {
        content,
        finish_reason,
        usage,
        model,
        metadata: None,
    }
}

/// Translate a `generateContent` response.
pub fn gemini_response_to_unified(response: GeminiResponse) -> UnifiedResponse {
    convert_response(response, true)
}

/// Stream translator for `streamGenerateContent?alt=sse` frames, each a
/// complete `generateContent` response fragment.
#[derive(Debug, Default)]
pub struct GeminiStreamTranslator;

impl GeminiStreamTranslator {
    pub fn new() -> Self {
        Self
    }
}

impl FrameTranslator for GeminiStreamTranslator {
    fn translate(&mut self, frame: Value) -> FrameOutcome {
        match serde_json::from_value::<GeminiResponse>(frame) {
            Ok(chunk) => FrameOutcome::delta(convert_response(chunk, false)),
            Err(e) => {
                log_debug!(provider = "gemini", error = %e, "Skipping unrecognized stream frame");
                FrameOutcome::skip()
            }
        }
    }
}
