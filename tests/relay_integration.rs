use std::sync::Arc;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use figment::{
    providers::{Format, Yaml},
    Figment,
};
use mockito::{Matcher, Server, ServerGuard};
use relayotron::auth::TokenAuthenticator;
use relayotron::client::ApiClient;
use relayotron::config::{Config, ConfigV1};
use relayotron::metrics::Metrics;
use relayotron::routes::create_router;
use relayotron::state::AppState;
use relayotron::store::create_store;
use relayotron::upstream::UpstreamService;
use serde_json::{json, Value};
use tower::ServiceExt;

const BOT_LOGIN: &str = "relay-bot";
const BOT_PASSWORD: &str = "hunter2";

fn build_config(upstream_url: &str) -> ConfigV1 {
    let yaml = format!(
        r#"
version: "1.0.0"
bind_address: 127.0.0.1:8084
logging:
  level: "warn"
  format: "json"
store:
  enabled: false
upstream:
  base_url: "{upstream_url}"
  request_timeout_secs: 5
auth:
  login_url: "{upstream_url}/auth/login"
  refresh_url: "{upstream_url}/auth/refresh"
  login: {BOT_LOGIN}
  password: {BOT_PASSWORD}
  refresh_margin_secs: 0
  refresh_retries: 2
  refresh_retry_delay_secs: 0
  refresh_wait_secs: 5
"#
    );

    let config: Config = Figment::new()
        .merge(Yaml::string(&yaml))
        .extract()
        .expect("Failed to parse integration test config");

    match config {
        Config::ConfigV1(cfg) => cfg,
    }
}

/// Mounts the login endpoint every app needs at startup.
async fn mock_login(server: &mut ServerGuard) -> mockito::Mock {
    server
        .mock("POST", "/auth/login")
        .match_body(Matcher::Json(json!({
            "login": BOT_LOGIN,
            "password": BOT_PASSWORD
        })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(json!({ "token": "abc123", "expires_in": 300 }).to_string())
        .create_async()
        .await
}

async fn build_app(config: ConfigV1) -> (Router, TokenAuthenticator) {
    let config = Arc::new(config);
    let store = create_store(&config.store).await;
    let metrics = Metrics::new();

    let http = reqwest::Client::builder()
        .timeout(config.upstream.request_timeout())
        .build()
        .expect("failed to build HTTP client");

    let authenticator =
        TokenAuthenticator::new(http.clone(), config.auth.clone(), metrics.clone());
    authenticator
        .start()
        .await
        .expect("startup login should succeed against the mock");

    let client = ApiClient::new(http, &config.upstream.base_url, authenticator.clone());
    let upstream = Arc::new(UpstreamService::new(client, metrics.clone()));

    let state = AppState {
        config: config.clone(),
        upstream,
        store,
        metrics,
    };

    (create_router(state), authenticator)
}

fn get_request(path: &str) -> Request<Body> {
    Request::builder()
        .method(Method::GET)
        .uri(path)
        .body(Body::empty())
        .expect("failed to build request")
}

fn json_request(method: Method, path: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(path)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .expect("failed to build request")
}

async fn response_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("failed to read response body");
    serde_json::from_slice(&bytes).expect("response body should be JSON")
}

#[tokio::test]
async fn integration_record_lookup_relays_upstream_json() {
    let mut server = Server::new_async().await;
    let login_mock = mock_login(&mut server).await;
    let record_mock = server
        .mock("GET", "/api/open/records/981")
        .match_header("authorization", "Bearer abc123")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({
                "id": 981,
                "subject": "Broken pump on line 3",
                "statusId": 4,
                "statusName": "In progress",
                "statusIsFinal": false,
                "priorityName": "High",
                "accountFirstName": "Irene",
                "accountLastName": "Novak"
            })
            .to_string(),
        )
        .create_async()
        .await;

    let (app, auth) = build_app(build_config(&server.url())).await;

    let response = app
        .oneshot(get_request("/api/v1/records/981"))
        .await
        .expect("request should succeed");

    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["id"], 981);
    assert_eq!(body["statusName"], "In progress");
    assert_eq!(body["accountLastName"], "Novak");

    login_mock.assert_async().await;
    record_mock.assert_async().await;
    auth.shutdown().await;
}

#[tokio::test]
async fn integration_account_lookup_relays_upstream_json() {
    let mut server = Server::new_async().await;
    let login_mock = mock_login(&mut server).await;
    let account_mock = server
        .mock("GET", "/api/open/accounts/42")
        .match_header("authorization", "Bearer abc123")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({
                "id": 42,
                "firstName": "Irene",
                "lastName": "Novak",
                "email": "irene.novak@example.com",
                "groups": [{ "id": 7, "name": "Maintenance", "color": "#ff8800" }]
            })
            .to_string(),
        )
        .create_async()
        .await;

    let (app, auth) = build_app(build_config(&server.url())).await;

    let response = app
        .oneshot(get_request("/api/v1/accounts/42"))
        .await
        .expect("request should succeed");

    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["firstName"], "Irene");
    assert_eq!(body["groups"][0]["name"], "Maintenance");

    login_mock.assert_async().await;
    account_mock.assert_async().await;
    auth.shutdown().await;
}

#[tokio::test]
async fn integration_status_update_relays_and_returns_outcome() {
    let mut server = Server::new_async().await;
    let login_mock = mock_login(&mut server).await;
    let update_mock = server
        .mock("PATCH", "/api/open/records/981/status")
        .match_header("authorization", "Bearer abc123")
        .match_header("content-type", "application/json")
        .match_body(Matcher::Json(json!({ "newStatusId": "5" })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({ "id": "981", "status": "updated", "message": "status changed" }).to_string(),
        )
        .create_async()
        .await;

    let (app, auth) = build_app(build_config(&server.url())).await;

    let response = app
        .oneshot(json_request(
            Method::PATCH,
            "/api/v1/records/981/status",
            json!({ "newStatusId": "5" }),
        ))
        .await
        .expect("request should succeed");

    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["status"], "updated");

    login_mock.assert_async().await;
    update_mock.assert_async().await;
    auth.shutdown().await;
}

#[tokio::test]
async fn integration_upstream_rejection_passes_status_without_detail() {
    let mut server = Server::new_async().await;
    let login_mock = mock_login(&mut server).await;
    let missing_mock = server
        .mock("GET", "/api/open/records/999")
        .with_status(404)
        .with_header("content-type", "application/json")
        .with_body(json!({ "message": "record 999 does not exist" }).to_string())
        .create_async()
        .await;

    let (app, auth) = build_app(build_config(&server.url())).await;

    let response = app
        .oneshot(get_request("/api/v1/records/999"))
        .await
        .expect("request should complete");

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = response_json(response).await;
    let error = body["error"].as_str().expect("error body should be a string");
    assert_eq!(error, "Upstream API rejected the request");
    assert!(
        !error.contains("does not exist"),
        "upstream error detail must not leak to callers"
    );

    login_mock.assert_async().await;
    missing_mock.assert_async().await;
    auth.shutdown().await;
}

#[tokio::test]
async fn integration_upstream_failure_maps_to_bad_gateway() {
    let mut server = Server::new_async().await;
    let login_mock = mock_login(&mut server).await;
    let broken_mock = server
        .mock("GET", "/api/open/records/981")
        .with_status(500)
        .with_body("internal blowup")
        .create_async()
        .await;

    let (app, auth) = build_app(build_config(&server.url())).await;

    let response = app
        .oneshot(get_request("/api/v1/records/981"))
        .await
        .expect("request should complete");

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let body = response_json(response).await;
    assert_eq!(body["error"], "Upstream API failed");

    login_mock.assert_async().await;
    broken_mock.assert_async().await;
    auth.shutdown().await;
}

#[tokio::test]
async fn integration_audit_route_without_store_is_unavailable() {
    let mut server = Server::new_async().await;
    let login_mock = mock_login(&mut server).await;

    let (app, auth) = build_app(build_config(&server.url())).await;

    let response = app
        .oneshot(get_request("/api/v1/audit"))
        .await
        .expect("request should complete");

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body = response_json(response).await;
    assert_eq!(body["error"], "Relay store is disabled");

    login_mock.assert_async().await;
    auth.shutdown().await;
}

#[tokio::test]
async fn integration_health_and_metrics_expose_traffic() {
    let mut server = Server::new_async().await;
    let login_mock = mock_login(&mut server).await;

    let (app, auth) = build_app(build_config(&server.url())).await;

    let response = app
        .clone()
        .oneshot(get_request("/health"))
        .await
        .expect("health request should succeed");
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["status"], "ok");

    let response = app
        .oneshot(get_request("/metrics"))
        .await
        .expect("metrics request should succeed");
    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response
        .headers()
        .get("content-type")
        .expect("metrics response should carry a content type")
        .to_str()
        .expect("content type should be valid UTF-8")
        .to_string();
    assert!(content_type.starts_with("text/plain"));

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("failed to read metrics body");
    let exposition = String::from_utf8(bytes.to_vec()).expect("metrics should be UTF-8");
    assert!(
        exposition.contains("http_requests_total"),
        "health request should have been counted: {exposition}"
    );
    assert!(
        exposition.contains("token_refreshes_total"),
        "startup login should have been counted: {exposition}"
    );

    login_mock.assert_async().await;
    auth.shutdown().await;
}

#[tokio::test]
async fn integration_preflight_answered_with_cors_headers() {
    let mut server = Server::new_async().await;
    let login_mock = mock_login(&mut server).await;

    let (app, auth) = build_app(build_config(&server.url())).await;

    let request = Request::builder()
        .method(Method::OPTIONS)
        .uri("/api/v1/records/981/status")
        .header("origin", "https://portal.example.com")
        .header("access-control-request-method", "PATCH")
        .body(Body::empty())
        .expect("failed to build request");

    let response = app.oneshot(request).await.expect("request should complete");

    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert_eq!(
        response
            .headers()
            .get("access-control-allow-origin")
            .expect("preflight should carry allow-origin"),
        "*"
    );
    assert!(response
        .headers()
        .get("access-control-allow-methods")
        .expect("preflight should carry allow-methods")
        .to_str()
        .expect("header should be valid UTF-8")
        .contains("PATCH"));

    login_mock.assert_async().await;
    auth.shutdown().await;
}
