//! # llm-router
//!
//! Unified request router for LLM providers: OpenAI, Anthropic Claude, Google
//! Gemini, OpenAI-compatible services (Qwen, DeepSeek, Moonshot, Zhipu,
//! MiniMax) and custom self-hosted endpoints.
//!
//! ## Key Features
//!
//! - **Unified Messages**: One provider-agnostic request and response model
//! - **Adapter Registry**: Data-driven resolution of a config to an adapter
//! - **Fallbacks**: Ordered fallback providers driven by error classification
//! - **Tool Calling**: Function calls translated per provider, with repair of
//!   unanswered tool calls before every request
//! - **Streaming**: Typed chunk streams with exactly one final `done` chunk
//!
//! ## Example
//!
//! ```rust,no_run
//! use llm_router::{ModelService, UnifiedMessage, UnifiedRequest};
//!
//! # async fn example() -> llm_router::LlmResult<()> {
//! let service = ModelService::from_env();
//! let request = UnifiedRequest::new(vec![UnifiedMessage::user("Hello, how are you?")]);
//! let response = service.generate_content(request, Some("gpt-4o")).await?;
//! println!("{}", response.text());
//! # Ok(())
//! # }
//! ```

// Allow missing errors documentation - errors are self-documenting via type signatures
#![allow(clippy::missing_errors_doc)]

pub mod core_types;

// Logging utilities (re-exports tracing with log_* naming) - internal only
pub(crate) mod logging;

pub mod config;
pub mod error;
pub(crate) mod internals;
pub mod providers;
pub mod registry;
pub mod router;
pub mod service;

#[cfg(test)]
pub mod tests;

pub use config::{
    fallback_configs, get_model_config, parse_model_string, AuthType, CustomResponseFormat,
    EnvironmentConfigs, ModelCapabilities, ModelConfig, ModelDefaults, ModelOptions,
    ModelProvider, DEFAULT_MODEL,
};
pub use error::{ErrorCategory, ErrorSeverity, LlmError, LlmResult};
pub use internals::retry::RetryPolicy;
pub use internals::sse::{SseEvent, SseLineDecoder};
pub use internals::tokens::{estimate_request_tokens, estimate_tokens};
pub use providers::{ClaudeAdapter, CustomAdapter, GeminiAdapter, OpenAIAdapter};
pub use registry::{AdapterConstructor, AdapterRegistry};
pub use router::{ModelRouter, RouterStats};
pub use service::ModelService;

pub use core_types::{
    repair_tool_call_pairs, repair_tool_call_pairs_with_report, ChunkStream, ContentPart,
    EmbeddingRequest, EmbeddingResponse, FinishReason, MessageRole, ModelClient, RepairReport,
    StreamChunk, TokenCountResponse, TokenUsage, ToolDefinition, UnifiedMessage, UnifiedRequest,
    UnifiedResponse,
};
