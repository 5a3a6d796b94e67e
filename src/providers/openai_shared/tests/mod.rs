//! Tests for OpenAI-Shared Translation
//!
//! Unit tests for the chat-completions translator shared by OpenAI, the
//! OpenAI-compatible providers and custom endpoints in `openai` format.

mod conversion;
mod streaming;
