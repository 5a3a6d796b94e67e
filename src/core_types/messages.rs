//! Unified message architecture for routed LLM requests
//!
//! Provider-agnostic conversation, request and response values. Every adapter
//! translates from and to these types; nothing here knows about a wire format.

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

/// Message roles for LLM interactions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
    /// Carries tool execution results back to the model
    Function,
}

impl std::fmt::Display for MessageRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MessageRole::System => write!(f, "system"),
            MessageRole::User => write!(f, "user"),
            MessageRole::Assistant => write!(f, "assistant"),
            MessageRole::Function => write!(f, "function"),
        }
    }
}

/// One piece of message content.
///
/// A `FunctionCall` emitted by the assistant is paired with exactly one later
/// `FunctionResponse` carrying the same id. The pair is preserved or dropped
/// as a unit (see [`crate::core_types::tool_pairing`]).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text {
        text: String,
    },
    /// Base64 image data, optionally already wrapped in a `data:` URL
    Image {
        data: String,
        mime_type: String,
    },
    FunctionCall {
        name: String,
        #[serde(default)]
        args: serde_json::Value,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
    },
    FunctionResponse {
        name: String,
        #[serde(alias = "content")]
        response: serde_json::Value,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
    },
}

impl ContentPart {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    pub fn image(data: impl Into<String>, mime_type: impl Into<String>) -> Self {
        Self::Image {
            data: data.into(),
            mime_type: mime_type.into(),
        }
    }

    pub fn function_call(
        id: impl Into<String>,
        name: impl Into<String>,
        args: serde_json::Value,
    ) -> Self {
        Self::FunctionCall {
            name: name.into(),
            args,
            id: Some(id.into()),
        }
    }

    pub fn function_response(
        id: impl Into<String>,
        name: impl Into<String>,
        response: serde_json::Value,
    ) -> Self {
        Self::FunctionResponse {
            name: name.into(),
            response,
            id: Some(id.into()),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text { text } => Some(text),
            _ => None,
        }
    }

    pub fn is_function_call(&self) -> bool {
        matches!(self, Self::FunctionCall { .. })
    }

    pub fn is_function_response(&self) -> bool {
        matches!(self, Self::FunctionResponse { .. })
    }
}

/// A single conversation turn. Message order is significant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnifiedMessage {
    pub role: MessageRole,
    pub content: Vec<ContentPart>,
}

impl UnifiedMessage {
    pub fn new(role: MessageRole, content: Vec<ContentPart>) -> Self {
        Self { role, content }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::new(MessageRole::User, vec![ContentPart::text(text)])
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(MessageRole::Assistant, vec![ContentPart::text(text)])
    }

    pub fn system(text: impl Into<String>) -> Self {
        Self::new(MessageRole::System, vec![ContentPart::text(text)])
    }

    /// Function-role message answering one tool call.
    pub fn function_response(
        id: impl Into<String>,
        name: impl Into<String>,
        response: serde_json::Value,
    ) -> Self {
        Self::new(
            MessageRole::Function,
            vec![ContentPart::function_response(id, name, response)],
        )
    }

    /// Concatenated text parts, in order.
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(ContentPart::as_text)
            .collect::<Vec<_>>()
            .join("")
    }

    pub fn has_function_calls(&self) -> bool {
        self.content.iter().any(ContentPart::is_function_call)
    }

    /// Text or image content, i.e. anything that is not part of a tool exchange.
    pub fn has_plain_content(&self) -> bool {
        self.content
            .iter()
            .any(|p| matches!(p, ContentPart::Text { .. } | ContentPart::Image { .. }))
    }
}

/// Tool definition offered to the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Tool name - must be unique within a request
    pub name: String,
    pub description: String,
    /// JSON Schema describing the arguments
    pub parameters: serde_json::Value,
}

/// Provider-agnostic generation request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UnifiedRequest {
    pub messages: Vec<UnifiedMessage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<ToolDefinition>>,
    /// Overrides the configured model for this call only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_message: Option<String>,
    /// Caller-owned cancellation signal, checked around every network call
    #[serde(skip)]
    pub cancel: Option<CancellationToken>,
}

impl UnifiedRequest {
    pub fn new(messages: Vec<UnifiedMessage>) -> Self {
        Self {
            messages,
            ..Default::default()
        }
    }

    pub fn with_tools(mut self, tools: Vec<ToolDefinition>) -> Self {
        self.tools = Some(tools);
        self
    }

    pub fn with_system_message(mut self, system: impl Into<String>) -> Self {
        self.system_message = Some(system.into());
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(CancellationToken::is_cancelled)
    }
}

/// Why generation stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    Stop,
    Length,
    FunctionCall,
    ContentFilter,
}

/// Token accounting reported by the provider.
///
/// `total_tokens == prompt_tokens + completion_tokens` whenever computed locally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

impl TokenUsage {
    pub fn new(prompt_tokens: u32, completion_tokens: u32) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens.saturating_add(completion_tokens),
        }
    }
}

/// Provider-agnostic generation result, also used as a stream delta.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UnifiedResponse {
    pub content: Vec<ContentPart>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<FinishReason>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<TokenUsage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

impl UnifiedResponse {
    /// Concatenated text content.
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(ContentPart::as_text)
            .collect::<Vec<_>>()
            .join("")
    }

    pub fn function_calls(&self) -> Vec<&ContentPart> {
        self.content.iter().filter(|p| p.is_function_call()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty() && self.finish_reason.is_none() && self.usage.is_none()
    }
}

/// One element of a streamed response.
///
/// `done: true` is the single termination signal; nothing follows it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StreamChunk {
    pub delta: UnifiedResponse,
    pub done: bool,
}

impl StreamChunk {
    pub fn delta(delta: UnifiedResponse) -> Self {
        Self { delta, done: false }
    }

    /// Final chunk with an empty delta.
    pub fn done() -> Self {
        Self {
            delta: UnifiedResponse::default(),
            done: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenCountResponse {
    pub token_count: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbeddingRequest {
    pub text: String,
}

impl EmbeddingRequest {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingResponse {
    pub embeddings: Vec<Vec<f32>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<TokenUsage>,
}
