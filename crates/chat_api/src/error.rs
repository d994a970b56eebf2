use std::time::Duration;

use auth_session::AuthError;
use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChatApiError {
    #[error("request error: {0}")]
    Request(#[from] reqwest::Error),

    #[error("HTTP {status}: {message}")]
    Status { status: StatusCode, message: String },

    /// The server signalled failure through a `type: "error"` stream event;
    /// the payload is a human-readable message to surface.
    #[error("{0}")]
    Stream(String),

    /// The stream reached end of input without a `done` or `error` event,
    /// even after flushing the decoder residual.
    #[error("stream ended without a terminal event")]
    MissingTerminal,

    #[error("stream idle for longer than {0:?}")]
    IdleTimeout(Duration),

    /// User-initiated abort; explicitly not a failure.
    #[error("request was cancelled")]
    Cancelled,

    #[error(transparent)]
    Auth(#[from] AuthError),
}

impl ChatApiError {
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// True when the caller must discard the session and return to login.
    #[must_use]
    pub fn is_session_expired(&self) -> bool {
        matches!(self, Self::Auth(error) if error.is_session_expired())
    }
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    detail: Option<serde_json::Value>,
    message: Option<String>,
}

/// Extract a human-readable message from an error response body.
///
/// The backend wraps errors as `{"detail": "..."}`; `detail` may also be a
/// validation structure, in which case the raw body is more useful than a
/// lossy rendering of it.
pub fn parse_error_message(status: StatusCode, body: &str) -> String {
    if let Ok(parsed) = serde_json::from_str::<ErrorBody>(body) {
        if let Some(serde_json::Value::String(detail)) = parsed.detail {
            if !detail.is_empty() {
                return detail;
            }
        }
        if let Some(message) = parsed.message.filter(|message| !message.is_empty()) {
            return message;
        }
    }

    if body.is_empty() {
        status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_string()
    } else {
        body.to_string()
    }
}

#[cfg(test)]
mod tests {
    use reqwest::StatusCode;

    use super::parse_error_message;

    #[test]
    fn detail_string_is_extracted() {
        let message =
            parse_error_message(StatusCode::NOT_FOUND, r#"{"detail":"session not found"}"#);
        assert_eq!(message, "session not found");
    }

    #[test]
    fn structured_detail_falls_back_to_raw_body() {
        let body = r#"{"detail":[{"loc":["body","content"],"msg":"field required"}]}"#;
        assert_eq!(parse_error_message(StatusCode::UNPROCESSABLE_ENTITY, body), body);
    }

    #[test]
    fn empty_body_uses_canonical_reason() {
        assert_eq!(
            parse_error_message(StatusCode::BAD_GATEWAY, ""),
            "Bad Gateway"
        );
    }

    #[test]
    fn non_json_body_is_passed_through() {
        assert_eq!(
            parse_error_message(StatusCode::INTERNAL_SERVER_ERROR, "upstream exploded"),
            "upstream exploded"
        );
    }
}
