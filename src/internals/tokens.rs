//! Approximate token counting
//!
//! Used wherever a provider offers no native count, or its count endpoint
//! fails. The estimate is roughly four characters per token and is never
//! meant to be exact.

use crate::core_types::messages::{ContentPart, UnifiedRequest};

/// Characters per token used by the estimate.
pub const CHARS_PER_TOKEN: usize = 4;

/// Estimate the tokens in a piece of text, rounding up.
pub fn estimate_tokens(text: &str) -> u32 {
    let chars = text.chars().count();
    chars.div_ceil(CHARS_PER_TOKEN) as u32
}

/// Estimate the prompt tokens of a request.
///
/// Counts text parts, serialized function calls and responses, and the
/// system message, joined by single spaces.
pub fn estimate_request_tokens(request: &UnifiedRequest) -> u32 {
    let mut pieces: Vec<String> = Vec::new();

    if let Some(system) = &request.system_message {
        pieces.push(system.clone());
    }

    for message in &request.messages {
        for part in &message.content {
            match part {
                ContentPart::Text { text } => pieces.push(text.clone()),
                ContentPart::FunctionCall { name, args, .. } => {
                    pieces.push(format!("{name} {args}"));
                }
                ContentPart::FunctionResponse { name, response, .. } => {
                    pieces.push(format!("{name} {response}"));
                }
                ContentPart::Image { .. } => {}
            }
        }
    }

    estimate_tokens(&pieces.join(" "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_types::messages::UnifiedMessage;

    #[test]
    fn test_estimate_rounds_up() {
        assert_eq!(estimate_tokens(""), 0);
        assert_eq!(estimate_tokens("abc"), 1);
        assert_eq!(estimate_tokens("abcd"), 1);
        assert_eq!(estimate_tokens("abcde"), 2);
    }

    #[test]
    fn test_request_estimate_joins_text_parts() {
        // Arrange: "hello" + " " + "world!!" = 13 chars
        let request = UnifiedRequest::new(vec![
            UnifiedMessage::user("hello"),
            UnifiedMessage::assistant("world!!"),
        ]);

        // Act
        let count = estimate_request_tokens(&request);

        // Assert
        assert_eq!(count, 4);
    }
}
