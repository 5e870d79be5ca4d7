//! Shared application state.
//!
//! Contains the state that is shared across all request handlers,
//! including configuration, the upstream service, and the audit store.

use crate::config::ConfigV1;
use crate::metrics::Metrics;
use crate::store::Store;
use crate::upstream::UpstreamService;
use std::sync::Arc;

/// Application state shared across all HTTP handlers.
///
/// This state is cloned for each request handler and contains
/// references to the configuration, the authenticated upstream service,
/// the audit store and the metrics registry.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration loaded at startup.
    pub config: Arc<ConfigV1>,
    /// Typed operations against the upstream API, riding on the shared
    /// token lifecycle.
    pub upstream: Arc<UpstreamService>,
    /// Audit store for token issuances and relayed updates.
    pub store: Arc<dyn Store>,
    /// Prometheus registry handle for recording and exposition.
    pub metrics: Metrics,
}
