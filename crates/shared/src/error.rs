//! Shared error types for the notification API and the feed transport.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error body shape returned by the notification API.
///
/// Different endpoints fill different fields, so everything is optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorBody {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Attempt to parse an error JSON body into a user-facing message.
/// Prefers `detail`, then `message`, then `error`, falls back to `title`.
pub fn try_problem_detail(body: &str) -> Option<String> {
    let parsed = serde_json::from_str::<ErrorBody>(body).ok()?;
    [parsed.detail, parsed.message, parsed.error, parsed.title]
        .into_iter()
        .flatten()
        .find(|s| !s.trim().is_empty())
}

/// API error type for client-side use
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    #[error("Network error: {0}")]
    Network(String),
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },
    #[error("Deserialization error: {0}")]
    Deserialize(String),
    #[error("Signer error: {0}")]
    Signer(String),
}

impl ApiError {
    /// Human-readable message, preferring the server's own explanation.
    pub fn user_message(&self) -> String {
        match self {
            ApiError::Http { status, body } => try_problem_detail(body)
                .unwrap_or_else(|| format!("request failed with status {}", status)),
            other => other.to_string(),
        }
    }
}

/// Errors raised at the feed transport boundary.
///
/// None of these ever reach the host as a failure: the connection manager
/// logs them and reflects the outcome in its observable state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FeedError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("failed to close connection: {0}")]
    Teardown(String),
    #[error("no async runtime available to drive the connection")]
    NoRuntime,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn problem_detail_prefers_detail_then_message() {
        let body = r#"{"title":"Bad Request","detail":"channel not found"}"#;
        assert_eq!(try_problem_detail(body).as_deref(), Some("channel not found"));

        let body = r#"{"error":"boom","message":"invalid address"}"#;
        assert_eq!(try_problem_detail(body).as_deref(), Some("invalid address"));

        let body = r#"{"title":"  ","error":"boom"}"#;
        assert_eq!(try_problem_detail(body).as_deref(), Some("boom"));
    }

    #[test]
    fn problem_detail_ignores_non_json() {
        assert_eq!(try_problem_detail("<html>502</html>"), None);
        assert_eq!(try_problem_detail("{}"), None);
    }

    #[test]
    fn http_error_user_message_falls_back_to_status() {
        let err = ApiError::Http {
            status: 502,
            body: "gateway".to_string(),
        };
        assert_eq!(err.user_message(), "request failed with status 502");
        assert_eq!(err.to_string(), "HTTP 502: gateway");
    }
}
