//! Tests for the Gemini Adapter
//!
//! Unit tests for Gemini translation. HTTP behavior is covered in
//! `tests/gemini_adapter_integration_tests.rs`.
