//! HTTP utilities for LLM providers
//!
//! Shared request/response handling for the vendor adapters.

use crate::llm::LlmError;
use crate::utils::truncate_str;
use reqwest::header::RETRY_AFTER;
use reqwest::Client as HttpClient;
use reqwest::StatusCode;
use serde_json::Value;
use std::time::Duration;

/// Longest error body kept in an error message
const MAX_ERROR_BODY_CHARS: usize = 500;

/// Creates an HTTP client with the configured LLM timeout.
///
/// The timeout prevents a stuck vendor from blocking a chat forever.
#[must_use]
pub fn create_http_client(timeout_secs: u64) -> HttpClient {
    HttpClient::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .unwrap_or_else(|_| HttpClient::new())
}

/// Joins a base URL and a path without doubling slashes.
#[must_use]
pub fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

/// Sends an HTTP POST request with JSON body and returns parsed JSON response.
///
/// # Arguments
/// * `client` - HTTP client to use
/// * `url` - Target URL
/// * `body` - JSON body to send
/// * `auth_header` - Optional authorization header value (e.g., "Bearer token")
/// * `extra_headers` - Additional headers as key-value pairs
///
/// # Errors
///
/// Returns `LlmError::NetworkError` on connectivity issues, `LlmError::RateLimit` on 429,
/// `LlmError::ApiError` on other non-success status codes,
/// or `LlmError::JsonError` if parsing fails.
pub async fn send_json_request(
    client: &HttpClient,
    url: &str,
    body: &Value,
    auth_header: Option<&str>,
    extra_headers: &[(&str, &str)],
) -> Result<Value, LlmError> {
    let mut request = client.post(url).json(body);

    if let Some(auth) = auth_header {
        request = request.header("Authorization", auth);
    }

    for (key, value) in extra_headers {
        request = request.header(*key, *value);
    }

    let response = request
        .send()
        .await
        .map_err(|e| LlmError::NetworkError(e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        let wait_secs = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok());
        let error_text = response.text().await.unwrap_or_default();
        return Err(status_error(status, &error_text, wait_secs));
    }

    response
        .json()
        .await
        .map_err(|e| LlmError::JsonError(e.to_string()))
}

/// Maps a non-success response to an error, hiding HTML error pages.
fn status_error(status: StatusCode, error_text: &str, wait_secs: Option<u64>) -> LlmError {
    let trimmed = error_text.trim_start();
    // Nginx and other proxies answer with HTML pages
    let is_html = trimmed.starts_with("<!DOCTYPE")
        || trimmed.starts_with("<html")
        || trimmed.starts_with("<HTML");

    let clean_message = if is_html {
        format!("API error: {status} (Server returned HTML error page)")
    } else if error_text.chars().count() > MAX_ERROR_BODY_CHARS {
        format!(
            "API error: {status} - {}... (truncated)",
            truncate_str(error_text, MAX_ERROR_BODY_CHARS)
        )
    } else {
        format!("API error: {status} - {error_text}")
    };

    if status == StatusCode::TOO_MANY_REQUESTS {
        return LlmError::RateLimit {
            wait_secs,
            message: clean_message,
        };
    }
    if matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) {
        return LlmError::MissingConfig(clean_message);
    }
    LlmError::ApiError(clean_message)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_url() {
        assert_eq!(
            join_url("https://api.openai.com/v1/", "/chat/completions"),
            "https://api.openai.com/v1/chat/completions"
        );
        assert_eq!(join_url("http://localhost:11434", "api/chat"), "http://localhost:11434/api/chat");
    }

    #[test]
    fn test_html_error_pages_are_hidden() {
        let err = status_error(StatusCode::BAD_GATEWAY, "<html><body>502</body></html>", None);
        assert!(matches!(err, LlmError::ApiError(ref m) if m.contains("HTML error page")));
    }

    #[test]
    fn test_rate_limit_keeps_wait_hint() {
        let err = status_error(StatusCode::TOO_MANY_REQUESTS, "slow down", Some(7));
        assert!(matches!(
            err,
            LlmError::RateLimit {
                wait_secs: Some(7),
                ..
            }
        ));
    }

    #[test]
    fn test_long_errors_are_truncated() {
        let body = "x".repeat(2000);
        let err = status_error(StatusCode::BAD_REQUEST, &body, None);
        let LlmError::ApiError(message) = err else {
            panic!("expected ApiError");
        };
        assert!(message.ends_with("(truncated)"));
        assert!(message.len() < 600);
    }
}
