//! Typed operations against the upstream Open API.

use reqwest::StatusCode;
use serde::Serialize;
use tracing::{debug, info};

use crate::client::{ApiClient, ClientError, parse_response};
use crate::metrics::{Metrics, MetricsRecorder};

use super::models::{AccountInfo, RecordInfo, StatusUpdateOutcome};

/// The operations this service relays to the upstream, one method per
/// endpoint. Transport, token handling and retry live in [`ApiClient`];
/// this layer owns paths, payloads and per-operation metrics.
#[derive(Clone)]
pub struct UpstreamService {
    client: ApiClient,
    metrics: Metrics,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StatusUpdateRequest<'a> {
    new_status_id: &'a str,
}

impl UpstreamService {
    pub fn new(client: ApiClient, metrics: Metrics) -> Self {
        UpstreamService { client, metrics }
    }

    /// Fetches the full record by its upstream id.
    pub async fn get_record_info(&self, record_id: &str) -> Result<RecordInfo, ClientError> {
        debug!(record_id = %record_id, "Fetching record info");
        let result = self.fetch_record(record_id).await;
        self.observe("get_record_info", &result);
        result
    }

    async fn fetch_record(&self, record_id: &str) -> Result<RecordInfo, ClientError> {
        let response = self
            .client
            .get(&format!("/api/open/records/{}", record_id))
            .await?;
        parse_response(response).await
    }

    /// Fetches the account behind a record or request.
    pub async fn get_account_info(&self, account_id: &str) -> Result<AccountInfo, ClientError> {
        debug!(account_id = %account_id, "Fetching account info");
        let result = self.fetch_account(account_id).await;
        self.observe("get_account_info", &result);
        result
    }

    async fn fetch_account(&self, account_id: &str) -> Result<AccountInfo, ClientError> {
        let response = self
            .client
            .get(&format!("/api/open/accounts/{}", account_id))
            .await?;
        parse_response(response).await
    }

    /// Moves a record to a new status. The upstream acknowledges with
    /// either a JSON outcome or a bare `204`.
    pub async fn update_record_status(
        &self,
        record_id: &str,
        new_status_id: &str,
    ) -> Result<StatusUpdateOutcome, ClientError> {
        info!(record_id = %record_id, new_status_id = %new_status_id, "Relaying status update");
        let result = self.send_status_update(record_id, new_status_id).await;
        self.observe("update_record_status", &result);
        result
    }

    async fn send_status_update(
        &self,
        record_id: &str,
        new_status_id: &str,
    ) -> Result<StatusUpdateOutcome, ClientError> {
        let response = self
            .client
            .patch(
                &format!("/api/open/records/{}/status", record_id),
                &StatusUpdateRequest { new_status_id },
            )
            .await?;
        if response.status() == StatusCode::NO_CONTENT {
            return Ok(StatusUpdateOutcome::default());
        }
        parse_response(response).await
    }

    fn observe<T>(&self, operation: &str, result: &Result<T, ClientError>) {
        let outcome = if result.is_ok() { "success" } else { "failure" };
        self.metrics.record_upstream_request(operation, outcome);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::TokenAuthenticator;
    use crate::config::BotAuthConfig;
    use mockito::{Matcher, Server, ServerGuard};
    use reqwest::Client;
    use serde_json::json;

    /// Service wired against the mock server, with the login already done.
    async fn started_service(server: &mut ServerGuard) -> (UpstreamService, TokenAuthenticator) {
        server
            .mock("POST", "/auth/login")
            .with_status(200)
            .with_body(r#"{"token": "abc123", "expires_in": 300}"#)
            .create_async()
            .await;
        let config = BotAuthConfig {
            login_url: format!("{}/auth/login", server.url()),
            refresh_url: format!("{}/auth/refresh", server.url()),
            login: "bot".to_string(),
            password: "hunter2".to_string(),
            refresh_margin_secs: 0,
            refresh_retries: 2,
            refresh_retry_delay_secs: 0,
            refresh_wait_secs: 5,
        };
        let metrics = Metrics::new();
        let auth = TokenAuthenticator::new(Client::new(), config, metrics.clone());
        auth.start().await.expect("login against mock should succeed");
        let client = ApiClient::new(Client::new(), &server.url(), auth.clone());
        (UpstreamService::new(client, metrics), auth)
    }

    #[tokio::test]
    async fn test_get_record_info_decodes_payload() {
        let mut server = Server::new_async().await;
        let (service, auth) = started_service(&mut server).await;
        let record = server
            .mock("GET", "/api/open/records/981")
            .match_header("authorization", "Bearer abc123")
            .with_status(200)
            .with_body(
                r#"{"id": 981, "subject": "Printer on fire", "statusId": 3, "statusName": "Open"}"#,
            )
            .create_async()
            .await;

        let info = service
            .get_record_info("981")
            .await
            .expect("record fetch should succeed");
        assert_eq!(info.id, 981);
        assert_eq!(info.subject, "Printer on fire");
        assert_eq!(info.status_name, "Open");
        record.assert_async().await;
        auth.shutdown().await;
    }

    #[tokio::test]
    async fn test_get_account_info_maps_not_found() {
        let mut server = Server::new_async().await;
        let (service, auth) = started_service(&mut server).await;
        server
            .mock("GET", "/api/open/accounts/404404")
            .with_status(404)
            .with_body(r#"{"message": "account not found"}"#)
            .create_async()
            .await;

        let err = service
            .get_account_info("404404")
            .await
            .expect_err("missing account should error");
        match err {
            ClientError::UpstreamApi {
                status, message, ..
            } => {
                assert_eq!(status, StatusCode::NOT_FOUND);
                assert_eq!(message, "account not found");
            }
            other => panic!("expected UpstreamApi, got {:?}", other),
        }
        auth.shutdown().await;
    }

    /// A bare 204 acknowledgement is a success with an empty outcome.
    #[tokio::test]
    async fn test_update_status_accepts_no_content() {
        let mut server = Server::new_async().await;
        let (service, auth) = started_service(&mut server).await;
        let update = server
            .mock("PATCH", "/api/open/records/981/status")
            .match_body(Matcher::Json(json!({"newStatusId": "42"})))
            .with_status(204)
            .create_async()
            .await;

        let outcome = service
            .update_record_status("981", "42")
            .await
            .expect("status update should succeed");
        assert_eq!(outcome, StatusUpdateOutcome::default());
        update.assert_async().await;
        auth.shutdown().await;
    }

    #[tokio::test]
    async fn test_update_status_surfaces_conflict() {
        let mut server = Server::new_async().await;
        let (service, auth) = started_service(&mut server).await;
        server
            .mock("PATCH", "/api/open/records/981/status")
            .with_status(409)
            .with_body(r#"{"message": "transition not allowed"}"#)
            .create_async()
            .await;

        let err = service
            .update_record_status("981", "42")
            .await
            .expect_err("conflicting update should error");
        match err {
            ClientError::UpstreamApi {
                status, message, ..
            } => {
                assert_eq!(status, StatusCode::CONFLICT);
                assert_eq!(message, "transition not allowed");
            }
            other => panic!("expected UpstreamApi, got {:?}", other),
        }
        auth.shutdown().await;
    }
}
