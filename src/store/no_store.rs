use super::Store;
use crate::models::{issuance::TokenIssuance, relay::RelayAudit};
use async_trait::async_trait;

/// A no-op store that always returns an error if called,
/// indicating the store is disabled.
pub struct NoStore;

impl NoStore {
    pub fn new() -> Self {
        NoStore
    }
}

impl Default for NoStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Store for NoStore {
    async fn record_token(&self, _issuance: &TokenIssuance) -> Result<(), String> {
        Err("Relay store is disabled".into())
    }

    async fn record_relay(&self, _relay: &RelayAudit) -> Result<(), String> {
        Err("Relay store is disabled".into())
    }

    async fn recent_relays(&self, _limit: i64) -> Result<Vec<RelayAudit>, String> {
        Err("Relay store is disabled".into())
    }

    fn is_enabled(&self) -> bool {
        false
    }
}
