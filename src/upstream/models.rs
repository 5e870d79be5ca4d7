//! Payload shapes for the upstream Open API.
//!
//! The upstream tolerates omitted fields and so do we: everything
//! defaults, so a partial payload decodes to zero values instead of
//! failing the whole request.

use serde::{Deserialize, Serialize};

/// A helpdesk record as returned by `GET /api/open/records/{id}`.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct RecordInfo {
    pub id: i64,
    pub category: String,
    pub subject: String,
    pub section_name: String,
    pub create_date: String,
    pub status_id: i64,
    pub status_name: String,
    pub status_is_final: bool,
    pub status_changed_at: String,
    pub priority_id: i64,
    pub priority_name: String,
    pub priority_weight: i64,
    pub account_first_name: String,
    pub account_last_name: String,
    pub responsible_manager_id: i64,
    pub responsible_manager_first_name: String,
    pub responsible_manager_last_name: String,
}

/// A user account as returned by `GET /api/open/accounts/{id}`.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct AccountInfo {
    pub id: i64,
    pub role: String,
    pub position_id: i64,
    pub position_name: String,
    pub department_id: i64,
    pub department_name: String,
    pub first_name: String,
    pub middle_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub state: String,
    pub groups: Vec<AccountGroup>,
}

/// Group membership entry inside [`AccountInfo`].
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct AccountGroup {
    pub id: i64,
    pub name: String,
    pub color: String,
}

/// What the upstream says about a status change. A `204 No Content`
/// acknowledgement maps to the all-default value.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct StatusUpdateOutcome {
    pub id: String,
    pub status: String,
    pub message: String,
}
