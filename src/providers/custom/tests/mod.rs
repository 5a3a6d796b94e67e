//! Tests for the Custom Adapter
//!
//! Unit tests for the raw format. Endpoint behavior per format is covered in
//! `tests/custom_adapter_integration_tests.rs`.
