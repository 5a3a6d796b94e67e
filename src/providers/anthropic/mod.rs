//! Anthropic Claude adapter
//!
//! This adapter uses Anthropic's native Messages API.
//!
//! ## Module Organization
//!
//! - `types`: Request/response structures for the Anthropic API
//! - `conversion`: Translation between unified and Anthropic formats, including streaming
//! - `provider`: The adapter itself

pub mod conversion;
mod provider;
pub mod types;

#[cfg(test)]
mod tests;

pub use conversion::{
    anthropic_response_to_unified, map_stop_reason, unified_to_anthropic_request,
    AnthropicStreamTranslator, DEFAULT_MAX_TOKENS,
};
pub use provider::{ClaudeAdapter, ANTHROPIC_VERSION};
