use std::fmt;

use relay_protocol::FailureKind;
use reqwest::StatusCode;
use serde_json::Value;

#[derive(Debug)]
pub enum FetchError {
    Client(reqwest::Error),
    InvalidUrl(String),
    InvalidHeader(String),
    Request(reqwest::Error),
    Status(StatusCode, String),
    Body(reqwest::Error),
    NotJson(String),
}

impl FetchError {
    /// Maps the error onto the relay failure taxonomy.
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Status(..) | Self::NotJson(_) => FailureKind::Upstream,
            Self::Client(_)
            | Self::InvalidUrl(_)
            | Self::InvalidHeader(_)
            | Self::Request(_)
            | Self::Body(_) => FailureKind::Transport,
        }
    }
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Client(error) => write!(f, "failed to build HTTP client: {error}"),
            Self::InvalidUrl(value) => write!(f, "invalid URL: {value}"),
            Self::InvalidHeader(message) => write!(f, "invalid header: {message}"),
            Self::Request(error) => write!(f, "request error: {error}"),
            Self::Status(status, message) => write!(f, "HTTP {status} {message}"),
            Self::Body(error) => write!(f, "failed to read response body: {error}"),
            Self::NotJson(message) => write!(f, "response body is not JSON: {message}"),
        }
    }
}

impl std::error::Error for FetchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Client(error) | Self::Request(error) | Self::Body(error) => Some(error),
            _ => None,
        }
    }
}

/// Extracts a human-readable message from an error response body.
///
/// Understands `{"error":{"message":..}}`, `{"error":".."}` and `{"message":..}`,
/// falling back to the raw body, then to the status' canonical reason.
pub fn parse_error_message(status: StatusCode, body: &str) -> String {
    let fallback = || {
        if body.trim().is_empty() {
            status
                .canonical_reason()
                .unwrap_or("request failed")
                .to_string()
        } else {
            body.trim().to_string()
        }
    };

    let Ok(value) = serde_json::from_str::<Value>(body) else {
        return fallback();
    };

    let explicit = match value.get("error") {
        Some(Value::String(message)) => Some(message.as_str()),
        Some(error) => error.get("message").and_then(Value::as_str),
        None => value.get("message").and_then(Value::as_str),
    };

    explicit
        .map(str::trim)
        .filter(|message| !message.is_empty())
        .map(ToString::to_string)
        .unwrap_or_else(fallback)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use relay_protocol::FailureKind;
    use reqwest::StatusCode;

    use super::{parse_error_message, FetchError};

    #[test]
    fn parse_error_message_reads_nested_and_flat_shapes() {
        assert_eq!(
            parse_error_message(StatusCode::BAD_REQUEST, r#"{"error":{"message":"bad prompt"}}"#),
            "bad prompt"
        );
        assert_eq!(
            parse_error_message(StatusCode::BAD_REQUEST, r#"{"error":"model missing"}"#),
            "model missing"
        );
        assert_eq!(
            parse_error_message(StatusCode::BAD_REQUEST, r#"{"message":"nope"}"#),
            "nope"
        );
    }

    #[test]
    fn parse_error_message_falls_back_to_body_then_reason() {
        assert_eq!(
            parse_error_message(StatusCode::BAD_GATEWAY, "upstream down"),
            "upstream down"
        );
        assert_eq!(
            parse_error_message(StatusCode::SERVICE_UNAVAILABLE, ""),
            "Service Unavailable"
        );
        assert_eq!(
            parse_error_message(StatusCode::BAD_REQUEST, r#"{"error":{}}"#),
            r#"{"error":{}}"#
        );
    }

    #[test]
    fn status_and_decode_errors_are_upstream_failures() {
        let status = FetchError::Status(StatusCode::INTERNAL_SERVER_ERROR, "boom".to_string());
        assert_eq!(status.kind(), FailureKind::Upstream);
        assert_eq!(status.to_string(), "HTTP 500 Internal Server Error boom");

        let not_json = FetchError::NotJson("expected value".to_string());
        assert_eq!(not_json.kind(), FailureKind::Upstream);

        let invalid = FetchError::InvalidUrl("::".to_string());
        assert_eq!(invalid.kind(), FailureKind::Transport);
    }
}
