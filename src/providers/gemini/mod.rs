//! Google Gemini adapter
//!
//! Native Generative Language API: `generateContent`, SSE streaming through
//! `streamGenerateContent?alt=sse`, `countTokens` and `embedContent`.

pub mod conversion;
mod provider;
pub mod types;

#[cfg(test)]
mod tests;

pub use conversion::{
    gemini_response_to_unified, map_finish_reason, unified_to_gemini_request,
    GeminiStreamTranslator,
};
pub use provider::GeminiAdapter;
