//! Error types for routed LLM operations.
//!
//! Every failure an adapter can report is mapped onto one closed taxonomy,
//! [`LlmError`]. The router relies on that taxonomy alone to decide whether a
//! failed attempt may move on to a fallback provider.
//!
//! # Error Handling Example
//!
//! ```rust,no_run
//! use llm_router::{LlmError, error::ErrorCategory};
//!
//! fn handle_error(err: LlmError) {
//!     if err.is_retryable() {
//!         println!("Transient failure from {}: {}", err.provider(), err);
//!     }
//!
//!     match err.category() {
//!         ErrorCategory::Authentication => println!("Check your API key"),
//!         ErrorCategory::RateLimit => println!("Slow down"),
//!         _ => println!("{}", err.user_message()),
//!     }
//! }
//! ```

use crate::logging::{log_error, log_warn};
use thiserror::Error;

// ============================================================================
// Error categorization types
// ============================================================================

/// High-level categorization used for retry and fallback decisions.
///
/// Use [`LlmError::category()`] to get the category for any error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCategory {
    /// Credentials are missing, invalid or lack permission.
    Authentication,

    /// The provider is throttling requests or the quota is exhausted.
    RateLimit,

    /// The request itself is malformed or asks for something unsupported.
    ///
    /// Another provider would reject it the same way.
    InvalidInput,

    /// The model does not exist or the service is temporarily down.
    ModelUnavailable,

    /// The provider refused the content on safety grounds.
    ContentFilter,

    /// Transport-level failure (connection, DNS, timeout).
    Network,

    /// Anything the classifier could not attribute.
    Unknown,
}

/// Severity level for logging and alerting decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    /// Action failed and needs attention (bad credentials, bad configuration).
    Error,

    /// Unexpected but recoverable situation.
    Warning,

    /// Expected outcome such as a caller-initiated cancellation.
    Info,
}

// ============================================================================
// LLM Error types
// ============================================================================

/// Convenient result type for routed LLM operations.
pub type LlmResult<T> = std::result::Result<T, LlmError>;

/// Errors that can occur while routing a request to a provider.
///
/// # Error Categories
///
/// | Variant | Category | Retryable |
/// |---------|----------|-----------|
/// | `Authentication` | Authentication | No |
/// | `RateLimit` | RateLimit | Yes |
/// | `InvalidRequest` | InvalidInput | No |
/// | `Configuration` | InvalidInput | No |
/// | `Unsupported` | InvalidInput | No |
/// | `ContentFilter` | ContentFilter | No |
/// | `ModelNotFound` | ModelUnavailable | No |
/// | `ServiceUnavailable` | ModelUnavailable | Yes |
/// | `Network` | Network | Yes |
/// | `Timeout` | Network | Yes |
/// | `Cancelled` | Unknown | No |
/// | `ResponseParsing` | Unknown | No |
/// | `Provider` | Unknown | No |
/// | `AllProvidersFailed` | same as the last error | same as the last error |
#[derive(Error, Debug)]
pub enum LlmError {
    /// Credentials were rejected (401/403) or could not be found.
    #[error("[{provider}] Authentication failed: {message}")]
    Authentication {
        provider: String,
        message: String,
        status_code: Option<u16>,
    },

    /// Provider rate limit or quota exceeded (429).
    #[error("[{provider}] Rate limit exceeded: {message}")]
    RateLimit {
        provider: String,
        message: String,
        /// Value of the `Retry-After` header when the provider sent one.
        retry_after_seconds: Option<u64>,
    },

    /// The provider rejected the request as malformed (400), or the adapter
    /// refused it before sending.
    #[error("[{provider}] Invalid request: {message}")]
    InvalidRequest {
        provider: String,
        message: String,
        status_code: Option<u16>,
    },

    /// The model configuration cannot be turned into a working adapter.
    #[error("[{provider}] Configuration error: {message}")]
    Configuration { provider: String, message: String },

    /// The provider does not offer the requested operation.
    #[error("[{provider}] Operation not supported: {operation}")]
    Unsupported { provider: String, operation: String },

    /// The provider blocked the content.
    #[error("[{provider}] Content filtered: {message}")]
    ContentFilter { provider: String, message: String },

    /// The requested model does not exist (404).
    #[error("[{provider}] Model not found: {message}")]
    ModelNotFound { provider: String, message: String },

    /// The provider is temporarily unavailable (502/503/504).
    #[error("[{provider}] Service unavailable: {message}")]
    ServiceUnavailable {
        provider: String,
        message: String,
        status_code: Option<u16>,
    },

    /// Transport failure before a status code was received.
    #[error("[{provider}] Network error: {message}")]
    Network {
        provider: String,
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A single attempt exceeded its timeout.
    #[error("[{provider}] Request timed out after {timeout_seconds}s")]
    Timeout {
        provider: String,
        timeout_seconds: u64,
    },

    /// The caller cancelled the request.
    #[error("[{provider}] Request cancelled")]
    Cancelled { provider: String },

    /// The provider answered with a body that could not be decoded.
    #[error("[{provider}] Response parsing failed: {message}")]
    ResponseParsing { provider: String, message: String },

    /// Any other provider failure.
    #[error("[{provider}] Provider error: {message}")]
    Provider {
        provider: String,
        message: String,
        status_code: Option<u16>,
    },

    /// The primary provider and every fallback failed.
    #[error("All {attempts} provider attempts failed; last error: {last}")]
    AllProvidersFailed {
        attempts: usize,
        #[source]
        last: Box<LlmError>,
    },
}

impl LlmError {
    /// Provider tag of the adapter that produced the error.
    pub fn provider(&self) -> &str {
        match self {
            Self::Authentication { provider, .. }
            | Self::RateLimit { provider, .. }
            | Self::InvalidRequest { provider, .. }
            | Self::Configuration { provider, .. }
            | Self::Unsupported { provider, .. }
            | Self::ContentFilter { provider, .. }
            | Self::ModelNotFound { provider, .. }
            | Self::ServiceUnavailable { provider, .. }
            | Self::Network { provider, .. }
            | Self::Timeout { provider, .. }
            | Self::Cancelled { provider }
            | Self::ResponseParsing { provider, .. }
            | Self::Provider { provider, .. } => provider,
            Self::AllProvidersFailed { last, .. } => last.provider(),
        }
    }

    /// Get the error category for retry and fallback decisions.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Authentication { .. } => ErrorCategory::Authentication,
            Self::RateLimit { .. } => ErrorCategory::RateLimit,
            Self::InvalidRequest { .. } | Self::Configuration { .. } | Self::Unsupported { .. } => {
                ErrorCategory::InvalidInput
            }
            Self::ContentFilter { .. } => ErrorCategory::ContentFilter,
            Self::ModelNotFound { .. } | Self::ServiceUnavailable { .. } => {
                ErrorCategory::ModelUnavailable
            }
            Self::Network { .. } | Self::Timeout { .. } => ErrorCategory::Network,
            Self::Cancelled { .. } | Self::ResponseParsing { .. } | Self::Provider { .. } => {
                ErrorCategory::Unknown
            }
            Self::AllProvidersFailed { last, .. } => last.category(),
        }
    }

    /// Stable machine-readable error code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Authentication { .. } => "AUTH_ERROR",
            Self::RateLimit { .. } => "QUOTA_EXCEEDED",
            Self::InvalidRequest { .. } => "INVALID_REQUEST",
            Self::Configuration { .. } => "CONFIGURATION_ERROR",
            Self::Unsupported { .. } => "UNSUPPORTED_OPERATION",
            Self::ContentFilter { .. } => "CONTENT_FILTERED",
            Self::ModelNotFound { .. } => "MODEL_NOT_FOUND",
            Self::ServiceUnavailable { .. } => "SERVICE_UNAVAILABLE",
            Self::Network { .. } => "NETWORK_ERROR",
            Self::Timeout { .. } => "TIMEOUT",
            Self::Cancelled { .. } => "CANCELLED",
            Self::ResponseParsing { .. } => "RESPONSE_PARSING_ERROR",
            Self::Provider { .. } => "UNKNOWN_ERROR",
            Self::AllProvidersFailed { last, .. } => last.code(),
        }
    }

    /// HTTP status that produced the error, when there was one.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Authentication { status_code, .. }
            | Self::InvalidRequest { status_code, .. }
            | Self::ServiceUnavailable { status_code, .. }
            | Self::Provider { status_code, .. } => *status_code,
            Self::RateLimit { .. } => Some(429),
            Self::ModelNotFound { .. } => Some(404),
            Self::ContentFilter { .. } => Some(400),
            Self::AllProvidersFailed { last, .. } => last.status_code(),
            _ => None,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::Authentication { .. } | Self::Configuration { .. } => ErrorSeverity::Error,
            Self::Cancelled { .. } | Self::Unsupported { .. } => ErrorSeverity::Info,
            Self::AllProvidersFailed { .. } => ErrorSeverity::Error,
            _ => ErrorSeverity::Warning,
        }
    }

    /// Whether the same request may succeed if sent again later.
    ///
    /// Returns `true` for rate limits, service outages, network failures and
    /// timeouts.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::RateLimit { .. }
            | Self::ServiceUnavailable { .. }
            | Self::Network { .. }
            | Self::Timeout { .. } => true,
            Self::AllProvidersFailed { last, .. } => last.is_retryable(),
            _ => false,
        }
    }

    /// Whether trying another provider is pointless or unwanted.
    ///
    /// Authentication, invalid input, content filtering and unknown models
    /// would fail the same way elsewhere; a cancelled request must not be
    /// re-sent at all. Everything else (retryable or ambiguous) may fall back.
    pub fn stops_fallback(&self) -> bool {
        match self {
            Self::Cancelled { .. } => true,
            Self::AllProvidersFailed { .. } => true,
            _ => matches!(
                self.category(),
                ErrorCategory::Authentication
                    | ErrorCategory::InvalidInput
                    | ErrorCategory::ContentFilter
            ) || matches!(self, Self::ModelNotFound { .. }),
        }
    }

    /// Message safe to show to end users.
    pub fn user_message(&self) -> String {
        match self {
            Self::Authentication { provider, .. } => {
                format!("Authentication with {provider} failed. Please check your API key")
            }
            Self::RateLimit {
                retry_after_seconds: Some(seconds),
                ..
            } => format!("Service is busy. Please wait {seconds} seconds and try again"),
            Self::RateLimit { .. } => {
                "Rate limit or quota exceeded. Please try again later".to_string()
            }
            Self::InvalidRequest { .. } => {
                "The request was rejected as invalid. Please adjust it and try again".to_string()
            }
            Self::Configuration { .. } => {
                "Model configuration issue. Please check your settings".to_string()
            }
            Self::Unsupported {
                provider,
                operation,
            } => format!("{provider} does not support {operation}"),
            Self::ContentFilter { .. } => {
                "The content was blocked by the provider's safety filters".to_string()
            }
            Self::ModelNotFound { .. } => {
                "The requested model is not available. Please choose another model".to_string()
            }
            Self::ServiceUnavailable { .. } => {
                "The AI service is temporarily unavailable. Please try again".to_string()
            }
            Self::Network { .. } => {
                "Unable to communicate with the AI service. Please check your connection"
                    .to_string()
            }
            Self::Timeout { .. } => "Request timed out. Please try again".to_string(),
            Self::Cancelled { .. } => "Request cancelled".to_string(),
            Self::ResponseParsing { .. } => {
                "Received an invalid response from the AI service".to_string()
            }
            Self::Provider { .. } => "An unexpected error occurred. Please try again".to_string(),
            Self::AllProvidersFailed { last, .. } => last.user_message(),
        }
    }

    // =========================================================================
    // Constructor methods with automatic logging
    // =========================================================================

    pub fn authentication(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::authentication_with_status(provider, message, None)
    }

    fn authentication_with_status(
        provider: impl Into<String>,
        message: impl Into<String>,
        status_code: Option<u16>,
    ) -> Self {
        let provider = provider.into();
        let message = message.into();
        log_error!(
            error_type = "authentication",
            provider = %provider,
            status_code = ?status_code,
            message = %message,
            "LLM provider authentication failed"
        );
        Self::Authentication {
            provider,
            message,
            status_code,
        }
    }

    pub fn rate_limit(
        provider: impl Into<String>,
        message: impl Into<String>,
        retry_after_seconds: Option<u64>,
    ) -> Self {
        let provider = provider.into();
        let message = message.into();
        log_warn!(
            error_type = "rate_limit",
            provider = %provider,
            retry_after_seconds = ?retry_after_seconds,
            "LLM provider rate limit exceeded"
        );
        Self::RateLimit {
            provider,
            message,
            retry_after_seconds,
        }
    }

    pub fn invalid_request(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::invalid_request_with_status(provider, message, None)
    }

    fn invalid_request_with_status(
        provider: impl Into<String>,
        message: impl Into<String>,
        status_code: Option<u16>,
    ) -> Self {
        let provider = provider.into();
        let message = message.into();
        log_warn!(
            error_type = "invalid_request",
            provider = %provider,
            status_code = ?status_code,
            message = %message,
            "LLM request rejected as invalid"
        );
        Self::InvalidRequest {
            provider,
            message,
            status_code,
        }
    }

    pub fn configuration(provider: impl Into<String>, message: impl Into<String>) -> Self {
        let provider = provider.into();
        let message = message.into();
        log_error!(
            error_type = "configuration",
            provider = %provider,
            message = %message,
            "LLM configuration validation failed"
        );
        Self::Configuration { provider, message }
    }

    pub fn unsupported(provider: impl Into<String>, operation: impl Into<String>) -> Self {
        let provider = provider.into();
        let operation = operation.into();
        log_warn!(
            error_type = "unsupported",
            provider = %provider,
            operation = %operation,
            "Operation not supported by provider"
        );
        Self::Unsupported {
            provider,
            operation,
        }
    }

    pub fn content_filter(provider: impl Into<String>, message: impl Into<String>) -> Self {
        let provider = provider.into();
        let message = message.into();
        log_warn!(
            error_type = "content_filter",
            provider = %provider,
            message = %message,
            "LLM provider filtered content"
        );
        Self::ContentFilter { provider, message }
    }

    pub fn model_not_found(provider: impl Into<String>, message: impl Into<String>) -> Self {
        let provider = provider.into();
        let message = message.into();
        log_warn!(
            error_type = "model_not_found",
            provider = %provider,
            message = %message,
            "LLM model not found"
        );
        Self::ModelNotFound { provider, message }
    }

    pub fn service_unavailable(
        provider: impl Into<String>,
        message: impl Into<String>,
        status_code: Option<u16>,
    ) -> Self {
        let provider = provider.into();
        let message = message.into();
        log_warn!(
            error_type = "service_unavailable",
            provider = %provider,
            status_code = ?status_code,
            message = %message,
            "LLM provider temporarily unavailable"
        );
        Self::ServiceUnavailable {
            provider,
            message,
            status_code,
        }
    }

    pub fn network(
        provider: impl Into<String>,
        message: impl Into<String>,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        let provider = provider.into();
        let message = message.into();
        log_error!(
            error_type = "network",
            provider = %provider,
            message = %message,
            has_source = source.is_some(),
            "LLM request transport failed"
        );
        Self::Network {
            provider,
            message,
            source,
        }
    }

    pub fn timeout(provider: impl Into<String>, timeout_seconds: u64) -> Self {
        let provider = provider.into();
        log_warn!(
            error_type = "timeout",
            provider = %provider,
            timeout_seconds = timeout_seconds,
            "LLM request timed out"
        );
        Self::Timeout {
            provider,
            timeout_seconds,
        }
    }

    pub fn cancelled(provider: impl Into<String>) -> Self {
        let provider = provider.into();
        log_warn!(
            error_type = "cancelled",
            provider = %provider,
            "LLM request cancelled by caller"
        );
        Self::Cancelled { provider }
    }

    pub fn response_parsing(provider: impl Into<String>, message: impl Into<String>) -> Self {
        let provider = provider.into();
        let message = message.into();
        log_warn!(
            error_type = "response_parsing",
            provider = %provider,
            message = %message,
            "LLM response format invalid"
        );
        Self::ResponseParsing { provider, message }
    }

    pub fn provider_error(
        provider: impl Into<String>,
        message: impl Into<String>,
        status_code: Option<u16>,
    ) -> Self {
        let provider = provider.into();
        let message = message.into();
        log_error!(
            error_type = "provider",
            provider = %provider,
            status_code = ?status_code,
            message = %message,
            "LLM provider returned an unexpected error"
        );
        Self::Provider {
            provider,
            message,
            status_code,
        }
    }

    pub fn all_providers_failed(attempts: usize, last: LlmError) -> Self {
        log_error!(
            error_type = "all_providers_failed",
            attempts = attempts,
            last_provider = %last.provider(),
            last_code = last.code(),
            "Primary provider and all fallbacks failed"
        );
        Self::AllProvidersFailed {
            attempts,
            last: Box::new(last),
        }
    }

    // =========================================================================
    // Classification
    // =========================================================================

    /// Classify a non-success HTTP response.
    ///
    /// Status code decides first; for a 400 the message is inspected for
    /// content-filter wording before defaulting to an invalid request.
    pub fn from_status(
        provider: impl Into<String>,
        status: u16,
        message: impl Into<String>,
        retry_after_seconds: Option<u64>,
    ) -> Self {
        let provider = provider.into();
        let message = message.into();
        match status {
            401 | 403 => Self::authentication_with_status(provider, message, Some(status)),
            404 => Self::model_not_found(provider, message),
            429 => Self::rate_limit(provider, message, retry_after_seconds),
            502..=504 => Self::service_unavailable(provider, message, Some(status)),
            400 if mentions_content_filter(&message) => Self::content_filter(provider, message),
            400 => Self::invalid_request_with_status(provider, message, Some(status)),
            _ => Self::provider_error(provider, message, Some(status)),
        }
    }

    /// Map a `reqwest` transport error. `request_timeout` is the per-attempt
    /// limit reported when the transport gave up on time.
    pub fn from_transport(
        provider: impl Into<String>,
        error: reqwest::Error,
        request_timeout: std::time::Duration,
    ) -> Self {
        let provider = provider.into();
        if error.is_timeout() {
            return Self::timeout(provider, request_timeout.as_secs());
        }
        Self::network(provider, format!("Request failed: {error}"), Some(Box::new(error)))
    }
}

fn mentions_content_filter(message: &str) -> bool {
    let lower = message.to_lowercase();
    (lower.contains("content") && lower.contains("filter"))
        || lower.contains("safety")
        || lower.contains("moderation")
        || lower.contains("blocked")
}

/// Reduce a provider error body to a human-readable message.
///
/// Looks at `error.message`, then a top-level `message`, then a string
/// `error`, and falls back to the raw text.
pub fn extract_error_message(body: &str) -> String {
    let Ok(json) = serde_json::from_str::<serde_json::Value>(body) else {
        return body.trim().to_string();
    };

    json.pointer("/error/message")
        .and_then(|m| m.as_str())
        .or_else(|| json.get("message").and_then(|m| m.as_str()))
        .or_else(|| json.get("error").and_then(|m| m.as_str()))
        .map(str::to_string)
        .unwrap_or_else(|| body.trim().to_string())
}

/// Parse a `Retry-After` header value given in seconds.
pub fn parse_retry_after(headers: &reqwest::header::HeaderMap) -> Option<u64> {
    headers
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.trim().parse::<u64>().ok())
}
