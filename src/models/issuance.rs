use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// A record of one token the upstream handed us.
///
/// Only the preview is kept; the secret itself never reaches the store.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct TokenIssuance {
    pub preview: String,
    pub obtained_via: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl TokenIssuance {
    /// Creates an issuance record stamped with the current time.
    pub fn new(preview: String, obtained_via: &str, lifetime: std::time::Duration) -> Self {
        let issued_at = Utc::now();
        TokenIssuance {
            preview,
            obtained_via: obtained_via.to_string(),
            issued_at,
            expires_at: issued_at + Duration::seconds(lifetime.as_secs() as i64),
        }
    }
}
