//! Shared OpenAI-compatible API structures and translation
//!
//! This module contains the request/response structures used by OpenAI and
//! the OpenAI-compatible providers (Qwen, DeepSeek, Moonshot, Zhipu, MiniMax),
//! and by custom endpoints speaking the same format.
//!
//! - `types` - Wire data structures
//! - `conversion` - Unified <-> chat-completions translation, including streaming

pub mod conversion;
pub mod types;

#[cfg(test)]
mod tests;

pub use conversion::{
    map_finish_reason, openai_response_to_unified, unified_to_openai_request,
    OpenAIStreamTranslator,
};
pub use types::*;
