//! HTTP route definitions and handlers.
//!
//! This module organizes all HTTP endpoints into logical groups:
//! record relay, account lookup, relay audit, metrics, and health checks.

mod account_routes;
mod audit_routes;
mod health_routes;
mod metrics_routes;
mod record_routes;

use std::time::Instant;

use axum::extract::{MatchedPath, Request, State};
use axum::http::{header, HeaderValue, Method, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::Router;

use crate::metrics::MetricsRecorder;
use crate::state::AppState;

/// Creates the application router with all configured routes.
///
/// Combines all route modules into a single router, attaches the
/// middleware stack, and wires in the application state.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .merge(record_routes::routes())
        .merge(account_routes::routes())
        .merge(audit_routes::routes())
        .merge(metrics_routes::routes())
        .merge(health_routes::routes())
        .route_layer(middleware::from_fn_with_state(state.clone(), track_requests))
        .layer(middleware::from_fn(apply_cors))
        .with_state(state)
}

/// Records one request counter bump and one duration sample per handled
/// request.
///
/// The matched route template is used as the path label so cardinality
/// stays bounded; requests that somehow carry no template fall back to the
/// raw path.
async fn track_requests(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().to_string();
    let path = request
        .extensions()
        .get::<MatchedPath>()
        .map(|matched| matched.as_str().to_string())
        .unwrap_or_else(|| request.uri().path().to_string());

    let response = next.run(request).await;

    let status = response.status().as_u16().to_string();
    state.metrics.record_http_request(&method, &path, &status);
    state
        .metrics
        .record_http_duration(&method, &path, start.elapsed().as_secs_f64());

    response
}

/// Permissive CORS: browsers get a blanket allow, and preflights are
/// answered here without ever reaching the handlers.
async fn apply_cors(request: Request, next: Next) -> Response {
    if request.method() == Method::OPTIONS {
        let mut response = StatusCode::NO_CONTENT.into_response();
        set_cors_headers(&mut response);
        return response;
    }

    let mut response = next.run(request).await;
    set_cors_headers(&mut response);
    response
}

fn set_cors_headers(response: &mut Response) {
    let headers = response.headers_mut();
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static("*"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("GET, POST, PUT, PATCH, DELETE, OPTIONS"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("Authorization, Content-Type"),
    );
}
