//! Application startup and server initialization.
//!
//! This module handles the creation and configuration of the HTTP server,
//! including the upstream login, token store, and route setup.

use std::sync::Arc;

use reqwest::Client;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info, warn};

use crate::auth::TokenAuthenticator;
use crate::client::ApiClient;
use crate::config::ConfigV1;
use crate::metrics::Metrics;
use crate::models::TokenIssuance;
use crate::routes;
use crate::state::AppState;
use crate::store::create_store;
use crate::upstream::UpstreamService;

/// Initializes and runs the application server.
///
/// Logs in against the upstream before binding the listener: the relay is
/// useless without a token, so a failed first login aborts startup. Serves
/// until SIGINT or SIGTERM, then drains in-flight requests and joins the
/// token refresh loop.
///
/// # Errors
///
/// Returns an error if the upstream login fails, the server fails to bind
/// to the configured address, or it encounters a runtime error during
/// execution.
pub async fn run(config: Arc<ConfigV1>) -> Result<(), Box<dyn std::error::Error>> {
    let store = create_store(&config.store).await;
    let metrics = Metrics::new();

    let http = Client::builder()
        .timeout(config.upstream.request_timeout())
        .build()?;

    let authenticator =
        TokenAuthenticator::new(http.clone(), config.auth.clone(), metrics.clone());
    authenticator.start().await?;

    if store.is_enabled() {
        if let Some(token) = authenticator.current_token().await {
            let issuance = TokenIssuance::new(token.preview(), "login", token.ttl());
            if let Err(e) = store.record_token(&issuance).await {
                warn!("Failed to record token issuance: {}", e);
            }
        }
    }

    let client = ApiClient::new(http, &config.upstream.base_url, authenticator.clone());
    let upstream = Arc::new(UpstreamService::new(client, metrics.clone()));

    let state = AppState {
        config: config.clone(),
        upstream,
        store,
        metrics,
    };

    let app = routes::create_router(state);

    info!("Starting server on {}", config.bind_address);

    let listener = TcpListener::bind(&config.bind_address).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped, shutting down token refresh");
    authenticator.shutdown().await;

    Ok(())
}

/// Resolves on SIGINT (ctrl-c) or SIGTERM so the server can drain.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install ctrl-c handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
