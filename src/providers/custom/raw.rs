//! The `raw` custom response format
//!
//! Self-hosted servers answer in many loosely OpenAI-like shapes. The raw
//! format sends a single prompt and reads whatever text and tool calls it can
//! find in the answer, salvaging malformed tool arguments where possible.

use crate::core_types::messages::{
    ContentPart, FinishReason, TokenUsage, UnifiedRequest, UnifiedResponse,
};
use crate::internals::sse::{FrameOutcome, FrameTranslator};
use crate::logging::{log_debug, log_warn};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use serde_json::{Map, Value};

/// Request body of the raw format
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RawRequest {
    pub model: String,
    pub prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream: Option<bool>,
}

/// Flatten the conversation's text into one prompt, one line per part.
pub fn unified_to_raw_request(request: &UnifiedRequest, model: &str) -> RawRequest {
    let prompt = request
        .system_message
        .iter()
        .map(String::as_str)
        .chain(
            request
                .messages
                .iter()
                .flat_map(|m| m.content.iter())
                .filter_map(ContentPart::as_text),
        )
        .filter(|text| !text.is_empty())
        .collect::<Vec<_>>()
        .join("\n");

    RawRequest {
        model: model.to_string(),
        prompt,
        max_tokens: request.max_tokens,
        temperature: request.temperature,
        stream: request.stream,
    }
}

/// Translate a raw-format answer.
///
/// When nothing recognizable is found the whole body is returned as text.
pub fn raw_response_to_unified(response: &Value, model: &str) -> UnifiedResponse {
    let mut unified = convert(response, true);
    if unified.content.is_empty() {
        unified.content.push(ContentPart::text(response.to_string()));
    }
    unified.model = Some(model.to_string());
    unified
}

fn convert(response: &Value, default_finish: bool) -> UnifiedResponse {
    let mut content = Vec::new();

    if let Some(text) = extract_text(response).filter(|t| !t.is_empty()) {
        content.push(ContentPart::text(text));
    }
    for call in extract_tool_calls(response) {
        content.push(call);
    }

    let stated = response
        .get("finish_reason")
        .or_else(|| response.get("stop_reason"))
        .or_else(|| response.pointer("/choices/0/finish_reason"))
        .and_then(Value::as_str);
    let finish_reason = if content.iter().any(ContentPart::is_function_call) {
        Some(FinishReason::FunctionCall)
    } else {
        match stated {
            Some(reason) => Some(map_finish_reason(reason)),
            None => default_finish.then_some(FinishReason::Stop),
        }
    };

    UnifiedResponse {
        content,
        finish_reason,
        usage: extract_usage(response),
        model: None,
        metadata: None,
    }
}

pub fn map_finish_reason(reason: &str) -> FinishReason {
    match reason {
        "tool_calls" | "tool_use" | "function_call" => FinishReason::FunctionCall,
        "max_tokens" | "length" => FinishReason::Length,
        "content_filter" => FinishReason::ContentFilter,
        _ => FinishReason::Stop,
    }
}

fn extract_text(response: &Value) -> Option<String> {
    if let Value::String(text) = response {
        return Some(text.clone());
    }
    ["/text", "/content", "/message", "/response", "/choices/0/message/content"]
        .iter()
        .find_map(|path| response.pointer(path).and_then(Value::as_str))
        .map(str::to_string)
}

fn extract_tool_calls(response: &Value) -> Vec<ContentPart> {
    let calls: Vec<&Value> = if let Some(single) = response.get("function_call") {
        vec![single]
    } else if let Some(Value::Array(calls)) = response.pointer("/choices/0/message/tool_calls") {
        calls.iter().collect()
    } else if let Some(Value::Array(calls)) =
        response.get("tool_calls").or_else(|| response.get("tools"))
    {
        calls.iter().collect()
    } else {
        Vec::new()
    };

    calls.into_iter().filter_map(convert_tool_call).collect()
}

fn convert_tool_call(call: &Value) -> Option<ContentPart> {
    let function = call.get("function");
    let name = function
        .and_then(|f| f.get("name"))
        .or_else(|| call.get("name"))
        .and_then(Value::as_str)
        .filter(|n| !n.is_empty())?;

    let raw_args = function
        .and_then(|f| f.get("arguments"))
        .or_else(|| call.get("arguments"))
        .or_else(|| call.get("input"))
        .unwrap_or(&Value::Null);

    let id = call
        .get("id")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| format!("call_{}", uuid::Uuid::new_v4().simple()));

    Some(ContentPart::function_call(id, name, safe_parse_arguments(name, raw_args)))
}

fn extract_usage(response: &Value) -> Option<TokenUsage> {
    let usage = response.get("usage")?;
    let field = |names: &[&str]| {
        names
            .iter()
            .find_map(|n| usage.get(*n).and_then(Value::as_u64))
            .and_then(|v| u32::try_from(v).ok())
    };
    let prompt = field(&["prompt_tokens", "input_tokens"]);
    let completion = field(&["completion_tokens", "output_tokens"]);
    if prompt.is_none() && completion.is_none() {
        return None;
    }
    Some(TokenUsage::new(prompt.unwrap_or(0), completion.unwrap_or(0)))
}

/// Arguments as an object, whatever shape they arrived in.
pub fn safe_parse_arguments(function: &str, arguments: &Value) -> Value {
    match arguments {
        Value::Object(_) => arguments.clone(),
        Value::String(text) if text.trim().is_empty() => Value::Object(Map::new()),
        Value::String(text) => match serde_json::from_str::<Value>(text) {
            Ok(parsed @ Value::Object(_)) => parsed,
            Ok(_) | Err(_) => {
                log_warn!(
                    function = %function,
                    "Malformed tool arguments, salvaging key/value pairs"
                );
                salvage_arguments(text)
            }
        },
        _ => Value::Object(Map::new()),
    }
}

static KEY_VALUE: Lazy<Option<Regex>> = Lazy::new(|| {
    Regex::new(r#"(?s)["']?(\w+)["']?\s*[:=]\s*("(?:[^"\\]|\\.)*"|'(?:[^'\\]|\\.)*'|[^,}\n]+)"#)
        .ok()
});

/// Recover `key: value` pairs from a broken JSON-like arguments string.
/// Values are kept as strings.
pub fn salvage_arguments(text: &str) -> Value {
    let mut salvaged = Map::new();
    let Some(pattern) = KEY_VALUE.as_ref() else {
        return Value::Object(salvaged);
    };

    for captures in pattern.captures_iter(text) {
        let (Some(key), Some(value)) = (captures.get(1), captures.get(2)) else {
            continue;
        };
        let value = unquote(value.as_str().trim());
        if !value.is_empty() && !salvaged.contains_key(key.as_str()) {
            salvaged.insert(key.as_str().to_string(), Value::String(value));
        }
    }

    log_debug!(recovered_keys = salvaged.len(), "Salvaged tool arguments");
    Value::Object(salvaged)
}

fn unquote(value: &str) -> String {
    let quoted = value.len() >= 2
        && ((value.starts_with('"') && value.ends_with('"'))
            || (value.starts_with('\'') && value.ends_with('\'')));
    if !quoted {
        // Unterminated strings keep their opening quote
        return value
            .trim_matches(|c| c == '"' || c == '\'' || c == '}')
            .trim()
            .to_string();
    }
    let inner = &value[1..value.len() - 1];
    // Double-quoted values are JSON strings; decode their escapes
    serde_json::from_str::<String>(value)
        .unwrap_or_else(|_| inner.replace("\\n", "\n").replace("\\'", "'"))
}

/// Stream translator for raw-format frames. Frames are partial answers, so
/// nothing is invented when a frame carries no recognizable content.
#[derive(Debug, Default)]
pub struct RawStreamTranslator;

impl RawStreamTranslator {
    pub fn new() -> Self {
        Self
    }
}

impl FrameTranslator for RawStreamTranslator {
    fn translate(&mut self, frame: Value) -> FrameOutcome {
        // OpenAI-like servers put streamed text under choices[0].delta
        if let Some(delta) = frame.pointer("/choices/0/delta") {
            let mut unified = convert(delta, false);
            if let Some(reason) = frame
                .pointer("/choices/0/finish_reason")
                .and_then(Value::as_str)
            {
                unified.finish_reason = Some(map_finish_reason(reason));
            }
            return FrameOutcome::delta(unified);
        }
        FrameOutcome::delta(convert(&frame, false))
    }
}
