//! Digital treatment record model.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::appointment::TimeOfDay;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DigitalRecord {
    pub id: String,
    pub client_id: String,
    pub business_id: String,
    pub service_id: String,
    pub treatment: String,
    pub date: NaiveDate,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub diagnosis: String,
    /// Treatment length in minutes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<u32>,
    #[serde(default)]
    pub category: String,
    /// Free-form fields captured by category-specific forms.
    #[serde(default)]
    pub data: serde_json::Map<String, serde_json::Value>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A follow-up visit booked together with a record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FollowUp {
    pub date: NaiveDate,
    pub start_time: TimeOfDay,
    pub end_time: Option<TimeOfDay>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateDigitalRecord {
    pub business_id: String,
    pub client_id: String,
    pub service_id: String,
    pub treatment: String,
    pub date: NaiveDate,
    pub notes: Option<String>,
    pub diagnosis: Option<String>,
    pub duration: Option<u32>,
    pub category: Option<String>,
    pub data: Option<serde_json::Map<String, serde_json::Value>>,
    pub follow_up: Option<FollowUp>,
}

/// Mutable record fields. `id`, `created_at` and `created_by` cannot be
/// expressed here and so never change after creation.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UpdateDigitalRecord {
    pub service_id: Option<String>,
    pub treatment: Option<String>,
    pub date: Option<NaiveDate>,
    pub notes: Option<String>,
    pub diagnosis: Option<String>,
    /// `Some(Some(val))` = set, `Some(None)` = clear, `None` = no change.
    pub duration: Option<Option<u32>>,
    pub category: Option<String>,
    pub data: Option<serde_json::Map<String, serde_json::Value>>,
}
