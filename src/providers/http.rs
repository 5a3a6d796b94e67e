//! Shared HTTP transport for every adapter
//!
//! Sends JSON requests under the adapter's retry policy, races them against
//! the caller's cancellation token and turns non-success responses into
//! classified [`LlmError`]s.

use crate::error::{extract_error_message, parse_retry_after, LlmError, LlmResult};
use crate::internals::retry::{RetryExecutor, RetryPolicy};
use crate::logging::{log_debug, log_error};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use tokio_util::sync::CancellationToken;

/// HTTP client plus retry policy, one per adapter instance.
#[derive(Debug, Clone)]
pub(crate) struct HttpTransport {
    client: reqwest::Client,
    retry: RetryExecutor,
    provider: String,
}

impl HttpTransport {
    pub fn new(provider: impl Into<String>, retry_policy: RetryPolicy) -> Self {
        let provider = provider.into();
        Self {
            client: reqwest::Client::new(),
            retry: RetryExecutor::new(provider.clone(), retry_policy),
            provider,
        }
    }

    pub fn provider(&self) -> &str {
        &self.provider
    }

    /// POST a JSON body and decode the JSON answer.
    pub async fn post_json<B, R>(
        &self,
        url: &str,
        headers: &HeaderMap,
        body: &B,
        cancel: Option<&CancellationToken>,
    ) -> LlmResult<R>
    where
        B: Serialize + ?Sized + Sync,
        R: DeserializeOwned,
    {
        self.retry
            .execute(cancel, || async move {
                let response = self.send(self.client.post(url).json(body), url, headers).await?;
                self.decode(response).await
            })
            .await
    }

    /// GET and decode the JSON answer.
    pub async fn get_json<R>(
        &self,
        url: &str,
        headers: &HeaderMap,
        cancel: Option<&CancellationToken>,
    ) -> LlmResult<R>
    where
        R: DeserializeOwned,
    {
        self.retry
            .execute(cancel, || async move {
                let response = self.send(self.client.get(url), url, headers).await?;
                self.decode(response).await
            })
            .await
    }

    /// GET and only check the status.
    pub async fn get_ok(
        &self,
        url: &str,
        headers: &HeaderMap,
        cancel: Option<&CancellationToken>,
    ) -> LlmResult<()> {
        self.retry
            .execute(cancel, || async move {
                self.send(self.client.get(url), url, headers).await?;
                Ok(())
            })
            .await
    }

    /// POST a streaming request and hand back the response once its status
    /// is known to be a success. The body is left unread.
    pub async fn post_stream<B>(
        &self,
        url: &str,
        headers: &HeaderMap,
        body: &B,
        cancel: Option<&CancellationToken>,
    ) -> LlmResult<reqwest::Response>
    where
        B: Serialize + ?Sized + Sync,
    {
        self.retry
            .execute(cancel, || {
                self.send(self.client.post(url).json(body), url, headers)
            })
            .await
    }

    async fn send(
        &self,
        request: reqwest::RequestBuilder,
        url: &str,
        headers: &HeaderMap,
    ) -> LlmResult<reqwest::Response> {
        let response = request.headers(headers.clone()).send().await.map_err(|e| {
            log_error!(
                provider = %self.provider,
                url = %url,
                error = %e,
                "HTTP request failed"
            );
            LlmError::from_transport(&self.provider, e, self.retry.request_timeout())
        })?;

        if !response.status().is_success() {
            return Err(error_from_response(&self.provider, response).await);
        }

        log_debug!(
            provider = %self.provider,
            status = response.status().as_u16(),
            "HTTP request succeeded"
        );
        Ok(response)
    }

    async fn decode<R: DeserializeOwned>(&self, response: reqwest::Response) -> LlmResult<R> {
        let raw_body = response.text().await.map_err(|e| {
            LlmError::response_parsing(&self.provider, format!("Failed to read response: {e}"))
        })?;

        serde_json::from_str(&raw_body).map_err(|e| {
            log_error!(
                provider = %self.provider,
                error = %e,
                body_length = raw_body.len(),
                "Failed to parse response"
            );
            LlmError::response_parsing(&self.provider, format!("Invalid response: {e}"))
        })
    }
}

/// Classify a non-success response.
pub(crate) async fn error_from_response(provider: &str, response: reqwest::Response) -> LlmError {
    let status = response.status().as_u16();
    let retry_after = parse_retry_after(response.headers());
    let error_text = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());

    log_error!(
        provider = %provider,
        status = status,
        error_text = %error_text,
        "API error response"
    );

    let message = extract_error_message(&error_text);
    let message = if message.is_empty() {
        format!("HTTP {status}")
    } else {
        message
    };
    LlmError::from_status(provider, status, message, retry_after)
}

/// JSON content type plus the caller's custom headers.
pub(crate) fn build_headers(
    provider: &str,
    auth: &[(&str, String)],
    custom_headers: &HashMap<String, String>,
) -> LlmResult<HeaderMap> {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

    for (name, value) in auth {
        insert_header(provider, &mut headers, name, value)?;
    }
    for (name, value) in custom_headers {
        insert_header(provider, &mut headers, name, value)?;
    }
    Ok(headers)
}

/// Bearer authentication for OpenAI-compatible APIs.
pub(crate) fn bearer_headers(
    provider: &str,
    api_key: Option<&str>,
    custom_headers: &HashMap<String, String>,
) -> LlmResult<HeaderMap> {
    let has_custom_auth = custom_headers
        .keys()
        .any(|k| k.eq_ignore_ascii_case(AUTHORIZATION.as_str()));

    let auth = match api_key {
        Some(key) if !has_custom_auth => vec![("authorization", format!("Bearer {key}"))],
        _ => Vec::new(),
    };
    build_headers(provider, &auth, custom_headers)
}

fn insert_header(
    provider: &str,
    headers: &mut HeaderMap,
    name: &str,
    value: &str,
) -> LlmResult<()> {
    let name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| {
        LlmError::configuration(provider, format!("Invalid header name '{name}': {e}"))
    })?;
    let value = HeaderValue::from_str(value).map_err(|e| {
        LlmError::configuration(provider, format!("Invalid header value for '{name}': {e}"))
    })?;
    headers.insert(name, value);
    Ok(())
}

/// Join a base URL and an endpoint path with exactly one slash.
pub(crate) fn join_url(base_url: &str, endpoint: &str) -> String {
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        endpoint.trim_start_matches('/')
    )
}
