//! Tests for the Anthropic Adapter
//!
//! Unit tests for Anthropic-specific translation. HTTP behavior is covered in
//! `tests/claude_adapter_integration_tests.rs` against a mock server.
