//! HTTP plumbing for talking to the upstream API: bearer-token
//! injection, one-shot retry on rejected tokens, and response
//! classification.

pub mod http;
pub mod response;

pub use http::ApiClient;
pub use response::parse_response;

use reqwest::StatusCode;
use thiserror::Error;

use crate::auth::AuthError;

/// Everything that can go wrong between us and the upstream API.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The request never produced a usable response: connection refused,
    /// timeout, TLS trouble and friends.
    #[error("transport failure talking to the upstream API: {0}")]
    Transport(#[from] reqwest::Error),

    /// No valid token could be obtained for the request.
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// A request body or response body did not survive JSON conversion.
    #[error("JSON serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Upstream answered, but with an error status.
    #[error("upstream API returned {status}: {message}")]
    UpstreamApi {
        status: StatusCode,
        message: String,
        body: String,
    },
}
