use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One relayed status change, kept so operators can answer "what did we
/// forward, and when" without grepping logs.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct RelayAudit {
    pub id: String,
    pub record_id: String,
    pub new_status_id: String,
    pub outcome: String,
    pub relayed_at: DateTime<Utc>,
}

impl RelayAudit {
    /// Creates an audit entry with a fresh id and the current timestamp.
    pub fn new(record_id: &str, new_status_id: &str, outcome: &str) -> Self {
        RelayAudit {
            id: Uuid::new_v4().to_string(),
            record_id: record_id.to_string(),
            new_status_id: new_status_id.to_string(),
            outcome: outcome.to_string(),
            relayed_at: Utc::now(),
        }
    }
}
