//! Provider adapter implementations
//!
//! One adapter per wire protocol:
//!
//! - **openai**: OpenAI chat completions, also serving Qwen, DeepSeek,
//!   Moonshot, Zhipu, MiniMax and other OpenAI-compatible endpoints
//! - **anthropic**: Anthropic messages API
//! - **gemini**: Google Generative Language API
//! - **custom**: self-hosted endpoints in OpenAI, Claude or raw format
//!
//! ## Architecture
//!
//! ```text
//! openai_shared/   <- chat-completions wire types and translation
//!      |      \
//!  openai.rs   custom/ (openai format)
//!
//! anthropic/       <- messages API types and translation
//!      |      \
//!  provider.rs custom/ (claude format)
//!
//! http.rs          <- transport shared by every adapter
//! ```

pub mod anthropic;
pub mod custom;
pub mod gemini;
pub(crate) mod http;
pub mod openai;
pub mod openai_shared;

pub use anthropic::ClaudeAdapter;
pub use custom::CustomAdapter;
pub use gemini::GeminiAdapter;
pub use openai::OpenAIAdapter;

use crate::config::{ModelConfig, ModelProvider};
use crate::error::{LlmError, LlmResult};

/// Fail fast when a config is handed to the wrong adapter.
pub(crate) fn ensure_provider(
    config: &ModelConfig,
    expected: &ModelProvider,
    adapter: &str,
) -> LlmResult<()> {
    if config.provider != *expected {
        return Err(LlmError::invalid_request(
            config.provider_tag(),
            format!(
                "{adapter} requires provider '{expected}', got '{}'",
                config.provider
            ),
        ));
    }
    Ok(())
}

/// Base64 payload of an image, with any `data:<mime>;base64,` prefix removed.
pub(crate) fn strip_data_url(data: &str) -> &str {
    match data.strip_prefix("data:") {
        Some(rest) => rest
            .split_once(";base64,")
            .map_or(rest, |(_, payload)| payload),
        None => data,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_data_url() {
        assert_eq!(strip_data_url("data:image/png;base64,iVBOR"), "iVBOR");
        assert_eq!(strip_data_url("iVBOR"), "iVBOR");
    }

    #[test]
    fn test_ensure_provider_rejects_mismatch() {
        let config = ModelConfig::new("claude", "claude-3-5-haiku-20241022");

        let result = ensure_provider(&config, &ModelProvider::OpenAI, "OpenAIAdapter");

        assert!(matches!(result, Err(LlmError::InvalidRequest { .. })));
        assert!(ensure_provider(&config, &ModelProvider::Claude, "ClaudeAdapter").is_ok());
    }
}
