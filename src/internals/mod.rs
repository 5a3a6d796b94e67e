//! Internal utilities for llm-router
//!
//! Retry, token estimation and stream framing shared by every adapter.
//! `RetryPolicy` and the token estimate are re-exported through `lib.rs`.

pub mod retry;
pub mod sse;
pub mod tokens;
