use async_trait::async_trait;
use futures::stream::TryStreamExt;
use mongodb::bson::{doc, oid::ObjectId};
use mongodb::options::{ClientOptions, FindOptions};
use mongodb::{Client, Collection, IndexModel};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::models::{issuance::TokenIssuance, relay::RelayAudit};
use crate::store::Store;

/// The config struct for MongoDB connections.
/// Contains the URI and database name.
#[derive(Deserialize, Serialize, JsonSchema, Debug)]
pub struct MongoDBConfig {
    pub uri: String,
    pub database: String,
}

/// A concrete `Store` implementation that uses MongoDB.
///
/// This struct holds references to two collections:
/// - `token_issuances`: one document per token the upstream handed us
/// - `relay_audit`: one document per relayed status change
pub struct MongoDBStore {
    issuance_collection: Collection<IssuanceDocument>,
    relay_collection: Collection<RelayDocument>,
}

/// Document shape for storing token issuances in MongoDB.
#[derive(Serialize, Deserialize, Clone, Debug)]
struct IssuanceDocument {
    _id: ObjectId,
    issuance: TokenIssuance,
}

/// Document shape for storing relayed updates in MongoDB.
#[derive(Serialize, Deserialize, Clone, Debug)]
struct RelayDocument {
    _id: ObjectId,
    relay: RelayAudit,
}

impl MongoDBStore {
    /// Creates a new `MongoDBStore` from the given config.
    /// It initializes client connections, sets up indexes, etc.
    pub async fn new(config: &MongoDBConfig) -> Result<Self, String> {
        info!("Connecting to MongoDB at URI: {}", config.uri);

        // Parse the connection string from the config
        let mut client_options = ClientOptions::parse(&config.uri)
            .await
            .map_err(|e| format!("Failed to parse MongoDB URI: {}", e))?;

        // Optionally set the client application name
        client_options.app_name = Some("Relay-O-Tron".to_string());

        // Create a new MongoDB client
        let client = Client::with_options(client_options)
            .map_err(|e| format!("Failed to create MongoDB client: {}", e))?;

        info!("MongoDB connection established successfully.");

        // Retrieve the specified database and relevant collections
        let database = client.database(&config.database);
        let issuance_collection = database.collection::<IssuanceDocument>("token_issuances");
        let relay_collection = database.collection::<RelayDocument>("relay_audit");

        // Relay entries are looked up by the record they touched.
        let mut index_on_record_id = IndexModel::default();
        index_on_record_id.keys = doc! { "relay.record_id": 1 };

        relay_collection
            .create_index(index_on_record_id, None)
            .await
            .map_err(|e| format!("Failed to create index on record_id: {}", e))?;

        Ok(Self {
            issuance_collection,
            relay_collection,
        })
    }

    /// Wrap a `TokenIssuance` in its document shape.
    fn issuance_to_doc(issuance: &TokenIssuance) -> IssuanceDocument {
        IssuanceDocument {
            _id: ObjectId::new(),
            issuance: issuance.clone(),
        }
    }

    /// Wrap a `RelayAudit` in its document shape.
    fn relay_to_doc(relay: &RelayAudit) -> RelayDocument {
        RelayDocument {
            _id: ObjectId::new(),
            relay: relay.clone(),
        }
    }

    /// Convert a `RelayDocument` back to a `RelayAudit`.
    fn doc_to_relay(doc: &RelayDocument) -> RelayAudit {
        doc.relay.clone()
    }
}

#[async_trait]
impl Store for MongoDBStore {
    async fn record_token(&self, issuance: &TokenIssuance) -> Result<(), String> {
        self.issuance_collection
            .insert_one(Self::issuance_to_doc(issuance), None)
            .await
            .map_err(|e| format!("Failed to insert token issuance: {}", e))?;

        Ok(())
    }

    async fn record_relay(&self, relay: &RelayAudit) -> Result<(), String> {
        self.relay_collection
            .insert_one(Self::relay_to_doc(relay), None)
            .await
            .map_err(|e| format!("Failed to insert relay audit entry: {}", e))?;

        Ok(())
    }

    /// Lists the latest relayed updates, newest first.
    async fn recent_relays(&self, limit: i64) -> Result<Vec<RelayAudit>, String> {
        // ObjectIds carry their insertion time, so newest-first is a
        // reverse _id scan.
        let options = FindOptions::builder()
            .sort(doc! { "_id": -1 })
            .limit(limit)
            .build();

        let mut cursor = self
            .relay_collection
            .find(doc! {}, options)
            .await
            .map_err(|e| format!("Failed to list relay audit entries: {}", e))?;

        let mut relays = Vec::new();
        while let Some(relay_doc) = cursor
            .try_next()
            .await
            .map_err(|e| format!("Failed to read relay document: {}", e))?
        {
            relays.push(Self::doc_to_relay(&relay_doc));
        }

        Ok(relays)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Test that wrapping a RelayAudit in its document and unwrapping it
    /// preserves the entry.
    #[test]
    fn test_relay_doc_conversion() {
        let relay = RelayAudit::new("981", "42", "success");
        let doc = MongoDBStore::relay_to_doc(&relay);
        let converted = MongoDBStore::doc_to_relay(&doc);
        assert_eq!(relay, converted);
    }

    /// Distinct documents get distinct ObjectIds even for identical
    /// payloads.
    #[test]
    fn test_issuance_docs_get_distinct_object_ids() {
        let issuance = TokenIssuance::new(
            "abc123bdef...".to_string(),
            "login",
            std::time::Duration::from_secs(300),
        );
        let a = MongoDBStore::issuance_to_doc(&issuance);
        let b = MongoDBStore::issuance_to_doc(&issuance);
        assert_ne!(a._id, b._id);
        assert_eq!(a.issuance, b.issuance);
    }
}
