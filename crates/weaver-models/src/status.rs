//! Mapping of provider HTTP failures onto `ModelError`.

use reqwest::StatusCode;
use tracing::error;
use weaver_abstraction::ModelError;

/// Error `type` values providers use for exhausted quota or throttling.
const QUOTA_ERROR_TYPES: &[&str] =
    &["rate_limit_error", "overloaded_error", "insufficient_quota", "rate_limit_exceeded"];

/// Converts a non-success provider response into a `ModelError`.
///
/// 402 and 429 always become `QuotaExceeded`. Other statuses become
/// `ModelResponseError`, unless the body carries a quota error type.
pub(crate) fn classify_failure(provider: &str, status: StatusCode, body: String) -> ModelError {
    error!(provider, status = %status, error = %body, "Provider returned error status");

    let quota = status == StatusCode::PAYMENT_REQUIRED
        || status == StatusCode::TOO_MANY_REQUESTS
        || error_type(&body).is_some_and(|t| QUOTA_ERROR_TYPES.contains(&t.as_str()));

    if quota {
        ModelError::QuotaExceeded { provider: provider.to_string(), message: Some(body) }
    } else {
        ModelError::ModelResponseError(format!("API error ({status}): {body}"))
    }
}

/// Pulls `error.type` (or a top-level `type`/`code`) out of a JSON error body.
fn error_type(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    let inner = value.get("error").unwrap_or(&value);
    inner
        .get("type")
        .or_else(|| inner.get("code"))
        .and_then(serde_json::Value::as_str)
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limit_status_is_quota() {
        let err = classify_failure("openai", StatusCode::TOO_MANY_REQUESTS, "slow down".to_string());
        assert!(matches!(err, ModelError::QuotaExceeded { ref provider, .. } if provider == "openai"));
    }

    #[test]
    fn test_payment_required_is_quota() {
        let err = classify_failure("claude", StatusCode::PAYMENT_REQUIRED, String::new());
        assert!(matches!(err, ModelError::QuotaExceeded { .. }));
    }

    #[test]
    fn test_overloaded_body_is_quota() {
        let body = r#"{"error":{"type":"overloaded_error","message":"Overloaded"}}"#;
        let err = classify_failure("claude", StatusCode::SERVICE_UNAVAILABLE, body.to_string());
        assert!(matches!(err, ModelError::QuotaExceeded { .. }));
    }

    #[test]
    fn test_bad_request_is_response_error() {
        let body = r#"{"error":{"type":"invalid_request_error","message":"bad"}}"#;
        let err = classify_failure("openai", StatusCode::BAD_REQUEST, body.to_string());
        match err {
            ModelError::ModelResponseError(msg) => assert!(msg.contains("400")),
            other => panic!("Expected ModelResponseError, got {other:?}"),
        }
    }

    #[test]
    fn test_error_type_shapes() {
        assert_eq!(error_type(r#"{"type":"rate_limit_error"}"#).as_deref(), Some("rate_limit_error"));
        assert_eq!(
            error_type(r#"{"error":{"code":"insufficient_quota"}}"#).as_deref(),
            Some("insufficient_quota")
        );
        assert_eq!(error_type("not json"), None);
    }
}
