use std::sync::Arc;

use async_trait::async_trait;
use tracing::{error, info};

use super::{mongodb_store::MongoDBStore, no_store::NoStore};
use crate::config::{StoreBackend, StoreConfig};
use crate::models::{issuance::TokenIssuance, relay::RelayAudit};

/// The Store trait abstracts audit persistence: token issuances and
/// relayed status changes.
#[async_trait]
pub trait Store: Send + Sync {
    async fn record_token(&self, issuance: &TokenIssuance) -> Result<(), String>;
    async fn record_relay(&self, relay: &RelayAudit) -> Result<(), String>;
    /// Most recent relays first.
    async fn recent_relays(&self, limit: i64) -> Result<Vec<RelayAudit>, String>;
    fn is_enabled(&self) -> bool {
        // Default implementation should return always True for real stores
        // No store will return false so we can write better debug messages
        true
    }
}

/// Creates a concrete store implementation based on the StoreConfig.
/// If `store.enabled = false`, returns NoStore. Otherwise, picks the specified backend.
pub async fn create_store(config: &StoreConfig) -> Arc<dyn Store> {
    if !config.enabled {
        info!("Relay store is disabled. Using NoStore.");
        return Arc::new(NoStore::new());
    }

    match &config.backend {
        Some(StoreBackend::MongoDB(mongo_config)) => match MongoDBStore::new(mongo_config).await {
            Ok(store) => {
                info!("Successfully created MongoDB store.");
                Arc::new(store)
            }
            Err(e) => {
                error!("Failed to create MongoDB store: {}", e);
                std::process::exit(1);
            }
        },
        None => {
            error!("Store is enabled, but no backend config is provided!");
            std::process::exit(1);
        }
    }
}
