//! Bookable service catalog model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Service {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Length of one booking in minutes.
    pub duration: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    #[serde(default)]
    pub category: String,
    /// Number of simultaneous bookings the service can host. `1` means the
    /// service is an exclusive resource.
    #[serde(default = "default_resources")]
    pub resources: u32,
    /// Controls catalog visibility only; existing bookings are unaffected.
    #[serde(default = "default_true")]
    pub is_active: bool,
    pub business_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn default_resources() -> u32 {
    1
}

fn default_true() -> bool {
    true
}

impl Service {
    pub fn is_exclusive(&self) -> bool {
        self.resources <= 1
    }
}
