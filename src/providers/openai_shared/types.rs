//! OpenAI-compatible data structures and types
//!
//! Request/response structures for the chat-completions, embeddings and
//! models endpoints shared by OpenAI and every OpenAI-compatible provider.

use crate::core_types::messages::TokenUsage;
use serde::{Deserialize, Serialize};

/// OpenAI-compatible chat completion request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenAIRequest {
    pub model: String,
    pub messages: Vec<OpenAIMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<OpenAITool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

/// OpenAI-compatible message structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenAIMessage {
    pub role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<OpenAIContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<OpenAIToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

/// Plain string for a single text part, part array otherwise
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OpenAIContent {
    Text(String),
    Parts(Vec<OpenAIContentPart>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OpenAIContentPart {
    Text { text: String },
    ImageUrl { image_url: OpenAIImageUrl },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenAIImageUrl {
    pub url: String,
}

/// Tool call on an outgoing assistant message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenAIToolCall {
    pub id: String,
    #[serde(rename = "type")]
    pub call_type: String,
    pub function: OpenAIFunctionCall,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenAIFunctionCall {
    pub name: String,
    pub arguments: String, // JSON string
}

/// Tool definition offered to the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenAITool {
    #[serde(rename = "type")]
    pub tool_type: String,
    pub function: OpenAIFunctionDefinition,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenAIFunctionDefinition {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

/// OpenAI-compatible chat completion response, also used for stream chunks
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OpenAIResponse {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub choices: Vec<OpenAIChoice>,
    #[serde(default)]
    pub usage: Option<OpenAIUsage>,
}

/// Choice in OpenAI response; `delta` replaces `message` when streaming
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OpenAIChoice {
    #[serde(default)]
    pub index: u32,
    #[serde(default)]
    pub message: Option<OpenAIResponseMessage>,
    #[serde(default)]
    pub delta: Option<OpenAIResponseMessage>,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OpenAIResponseMessage {
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub tool_calls: Option<Vec<OpenAIResponseToolCall>>,
}

/// Tool call in a response; every field may be absent in stream fragments
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OpenAIResponseToolCall {
    #[serde(default)]
    pub index: Option<u32>,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub function: Option<OpenAIResponseFunction>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OpenAIResponseFunction {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub arguments: Option<String>,
}

/// Usage information in OpenAI response
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct OpenAIUsage {
    #[serde(default)]
    pub prompt_tokens: u32,
    #[serde(default)]
    pub completion_tokens: u32,
    #[serde(default)]
    pub total_tokens: u32,
}

impl From<OpenAIUsage> for TokenUsage {
    fn from(usage: OpenAIUsage) -> Self {
        Self {
            prompt_tokens: usage.prompt_tokens,
            completion_tokens: usage.completion_tokens,
            total_tokens: usage.total_tokens,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct OpenAIEmbeddingRequest {
    pub model: String,
    pub input: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OpenAIEmbeddingResponse {
    #[serde(default)]
    pub data: Vec<OpenAIEmbeddingData>,
    #[serde(default)]
    pub usage: Option<OpenAIUsage>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OpenAIEmbeddingData {
    pub embedding: Vec<f32>,
}

/// `GET /models` listing
#[derive(Debug, Clone, Deserialize)]
pub struct OpenAIModelList {
    #[serde(default)]
    pub data: Vec<OpenAIModelEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OpenAIModelEntry {
    pub id: String,
}
