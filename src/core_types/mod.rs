//! Core types for the unified request router
//!
//! ## Organization
//! - `messages` - Provider-agnostic conversation, request and response values
//! - `provider` - The `ModelClient` adapter trait
//! - `tool_pairing` - Structural repair of tool-call / tool-response pairs

pub mod messages;
pub mod provider;
pub mod tool_pairing;

// Re-export commonly used types
pub use messages::{
    ContentPart, EmbeddingRequest, EmbeddingResponse, FinishReason, MessageRole, StreamChunk,
    TokenCountResponse, TokenUsage, ToolDefinition, UnifiedMessage, UnifiedRequest,
    UnifiedResponse,
};
pub use provider::{ChunkStream, ModelClient};
pub use tool_pairing::{repair_tool_call_pairs, repair_tool_call_pairs_with_report, RepairReport};

#[cfg(test)]
pub use provider::MockModelClient;
