//! Custom endpoint adapter
//!
//! Talks to self-hosted or unlisted servers in one of three wire formats
//! selected by `options.response_format`: OpenAI chat completions, Anthropic
//! messages, or the loosely structured `raw` format.

mod provider;
pub mod raw;

#[cfg(test)]
mod tests;

pub use provider::CustomAdapter;
pub use raw::{
    raw_response_to_unified, safe_parse_arguments, salvage_arguments, unified_to_raw_request,
    RawRequest, RawStreamTranslator,
};
