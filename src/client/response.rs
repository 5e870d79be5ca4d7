//! Classification of upstream responses into typed results.

use reqwest::{Response, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use super::ClientError;

/// Shape of the upstream's JSON error payloads, as far as we care.
#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
}

/// Reads the whole body, then either decodes it as `T` or turns an error
/// status into [`ClientError::UpstreamApi`], preferring the message the
/// upstream put in its payload.
///
/// The body is drained before the status is judged so the connection goes
/// back to the pool either way.
pub async fn parse_response<T: DeserializeOwned>(response: Response) -> Result<T, ClientError> {
    let status = response.status();
    let body = response.text().await?;

    if status.is_client_error() || status.is_server_error() {
        let message = error_message(status, &body);
        debug!(status = %status, "Upstream API request failed: {}", message);
        return Err(ClientError::UpstreamApi {
            status,
            message,
            body,
        });
    }

    Ok(serde_json::from_str(&body)?)
}

/// The upstream's own `message` field when it sent one, the status line
/// otherwise.
fn error_message(status: StatusCode, body: &str) -> String {
    serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|parsed| parsed.message)
        .filter(|message| !message.is_empty())
        .unwrap_or_else(|| format!("HTTP {}", status))
}
