//! Logging for llm-router
//!
//! Tracing macros under `log_*` names. Events carry structured fields rather
//! than formatted strings: `provider` is always the caller-facing provider
//! tag (`deepseek`, not `openai`), `model` the model actually sent, and
//! errors are attached as `error = %e`. The application picks the subscriber.

pub use tracing::{
    debug as log_debug, error as log_error, info as log_info, trace as log_trace,
    warn as log_warn,
};
