use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

/// Unified error type for all gateway operations.
#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    /// Missing upstream credentials on the inbound request.
    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("rate limit exceeded, retry after {reset_secs}s")]
    RateLimited { reset_secs: u64 },

    #[error("upstream returned {status}: {body}")]
    Upstream { status: u16, body: String },

    #[error("network error: {0}")]
    Network(String),

    #[error("translation error: {0}")]
    Translation(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ProxyError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::Upstream { .. }
            | Self::Network(_)
            | Self::Translation(_)
            | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn error_type(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "invalid_request_error",
            Self::Unauthorized(_) => "authentication_error",
            Self::RateLimited { .. } => "rate_limit_error",
            _ => "api_error",
        }
    }

    fn error_code(&self) -> Option<&'static str> {
        match self {
            Self::Unauthorized(_) => Some("missing_credentials"),
            Self::RateLimited { .. } => Some("rate_limit_exceeded"),
            _ => None,
        }
    }

    /// The `{error: {...}}` body of a JSON error response.
    pub fn to_body(&self) -> serde_json::Value {
        self.to_body_with_message(&self.to_string())
    }

    /// Same shape as [`ProxyError::to_body`] with a caller-supplied message;
    /// used for SSE error frames.
    pub fn to_body_with_message(&self, message: &str) -> serde_json::Value {
        json!({
            "error": {
                "message": message,
                "type": self.error_type(),
                "param": null,
                "code": self.error_code(),
            }
        })
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!("request failed: {self}");
        }

        (
            status,
            [("content-type", "application/json")],
            self.to_body().to_string(),
        )
            .into_response()
    }
}

impl From<reqwest::Error> for ProxyError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Network(format!("request timed out: {e}"))
        } else if e.is_connect() {
            Self::Network(format!("connection failed: {e}"))
        } else {
            Self::Network(e.to_string())
        }
    }
}

impl From<serde_json::Error> for ProxyError {
    fn from(e: serde_json::Error) -> Self {
        Self::Translation(format!("JSON error: {e}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            ProxyError::BadRequest("x".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ProxyError::Unauthorized("x".into()).status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ProxyError::RateLimited { reset_secs: 3 }.status_code(),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            ProxyError::Upstream {
                status: 403,
                body: "denied".into()
            }
            .status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_error_body_shape() {
        let body = ProxyError::Unauthorized("Authorization header is missing".into()).to_body();
        assert_eq!(body["error"]["message"], "Authorization header is missing");
        assert_eq!(body["error"]["type"], "authentication_error");
        assert!(body["error"]["param"].is_null());
        assert_eq!(body["error"]["code"], "missing_credentials");
    }

    #[test]
    fn test_body_with_custom_message_keeps_shape() {
        let err = ProxyError::Network("connection reset".into());
        let body = err.to_body_with_message("stream broke");
        assert_eq!(body["error"]["message"], "stream broke");
        assert_eq!(body["error"]["type"], "api_error");
        assert!(body["error"]["param"].is_null());
        assert!(body["error"]["code"].is_null());
        assert_eq!(
            err.to_body()["error"]["message"],
            "network error: connection reset"
        );
    }

    #[test]
    fn test_upstream_message_carries_status_and_body() {
        let e = ProxyError::Upstream {
            status: 503,
            body: "overloaded".into(),
        };
        assert_eq!(e.to_string(), "upstream returned 503: overloaded");
        assert_eq!(e.to_body()["error"]["type"], "api_error");
    }
}
