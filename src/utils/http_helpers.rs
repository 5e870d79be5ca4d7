use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use tracing::{error, warn};

use crate::client::ClientError;

/// A general purpose HTTP error type that can be converted into an `IntoResponse`.
pub struct HTTPError {
    status: StatusCode,
    message: String,
}

impl HTTPError {
    /// Creates a new HTTP error with the given status code and message.
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        HTTPError {
            status,
            message: message.into(),
        }
    }
}

/// Converts our `HTTPError` into an HTTP response.
impl IntoResponse for HTTPError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({ "error": self.message }).to_string();
        Response::builder()
            .status(self.status)
            .header("Content-Type", "application/json")
            .body(body.into())
            .unwrap()
    }
}

/// Maps a failed upstream call onto the status we answer with.
///
/// The relay's own trouble (no token, unreachable upstream, unreadable
/// payloads) surfaces as 503/502 so callers can tell it from a verdict;
/// an upstream 4xx is a verdict and its status passes through. The
/// upstream's own error text is logged, never forwarded.
pub fn map_client_error(err: ClientError) -> HTTPError {
    match err {
        ClientError::Auth(e) => {
            error!("No upstream token available for request: {}", e);
            HTTPError::new(
                StatusCode::SERVICE_UNAVAILABLE,
                "Upstream authentication unavailable",
            )
        }
        ClientError::Transport(e) => {
            error!("Upstream transport failure: {}", e);
            HTTPError::new(StatusCode::BAD_GATEWAY, "Upstream API unreachable")
        }
        ClientError::Serialization(e) => {
            error!("Upstream payload failed JSON conversion: {}", e);
            HTTPError::new(
                StatusCode::BAD_GATEWAY,
                "Upstream API returned an unreadable response",
            )
        }
        ClientError::UpstreamApi {
            status, message, ..
        } => {
            if status.is_server_error() {
                error!(status = %status, "Upstream API server error: {}", message);
                HTTPError::new(StatusCode::BAD_GATEWAY, "Upstream API failed")
            } else {
                warn!(status = %status, "Upstream API rejected the request: {}", message);
                HTTPError::new(status, "Upstream API rejected the request")
            }
        }
    }
}

/// Store failures: a disabled store is deliberate and answers 503,
/// anything else is an internal fault.
pub fn map_store_error(err: String) -> HTTPError {
    if err.contains("disabled") {
        HTTPError::new(StatusCode::SERVICE_UNAVAILABLE, "Relay store is disabled")
    } else {
        error!("Store operation failed: {}", err);
        HTTPError::new(StatusCode::INTERNAL_SERVER_ERROR, "Store operation failed")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::AuthError;

    #[test]
    fn test_auth_errors_answer_service_unavailable() {
        let mapped = map_client_error(ClientError::Auth(AuthError::NotAuthenticated));
        assert_eq!(mapped.status, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn test_upstream_client_verdicts_pass_status_but_not_text() {
        let mapped = map_client_error(ClientError::UpstreamApi {
            status: StatusCode::NOT_FOUND,
            message: "record not found (internal id 77f)".to_string(),
            body: String::new(),
        });
        assert_eq!(mapped.status, StatusCode::NOT_FOUND);
        assert!(!mapped.message.contains("77f"));
    }

    #[test]
    fn test_upstream_server_errors_become_bad_gateway() {
        let mapped = map_client_error(ClientError::UpstreamApi {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: "HTTP 500 Internal Server Error".to_string(),
            body: String::new(),
        });
        assert_eq!(mapped.status, StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn test_store_errors_distinguish_disabled_from_broken() {
        assert_eq!(
            map_store_error("Relay store is disabled".to_string()).status,
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            map_store_error("connection reset".to_string()).status,
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_error_body_is_json_with_escaping() {
        let response = HTTPError::new(StatusCode::BAD_REQUEST, r#"invalid "quoted" id"#)
            .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
