//! Business (tenant) domain model.
//!
//! A business owns its services, clients, appointments and digital
//! records as child collections under `businesses/{id}`.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::license::BusinessLicense;

/// Opening and closing time for one weekday, `HH:MM`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DayHours {
    pub open: String,
    pub close: String,
    #[serde(default)]
    pub closed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Business {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub categories: Vec<String>,
    /// Keyed by lowercase weekday name (`monday`, ...).
    #[serde(default)]
    pub operating_hours: BTreeMap<String, DayHours>,
    pub owner_id: String,
    /// 16 uppercase hex characters, unique across all businesses.
    pub business_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license: Option<BusinessLicense>,
    #[serde(default)]
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields supplied by an owner during onboarding.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CreateBusiness {
    pub name: String,
    pub categories: Vec<String>,
    pub operating_hours: BTreeMap<String, DayHours>,
}

/// Fields an owner may change from the settings screen.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UpdateBusiness {
    pub name: Option<String>,
    pub categories: Option<Vec<String>>,
    pub operating_hours: Option<BTreeMap<String, DayHours>>,
}
