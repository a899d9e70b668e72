//! User domain model.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::access::Capability;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Owner,
    Assistant,
    Admin,
}

impl Role {
    /// Static capability matrix. Admins operate the platform, not a
    /// business, so they hold no business capabilities.
    pub fn permits(self, capability: Capability) -> bool {
        use Capability::*;
        match self {
            Role::Owner => !matches!(capability, AdminPanel),
            Role::Assistant => matches!(
                capability,
                ServiceRead
                    | ClientRead
                    | ClientCreate
                    | ClientUpdate
                    | AppointmentRead
                    | AppointmentCreate
                    | AppointmentUpdate
                    | AppointmentDelete
                    | ReportView
            ),
            Role::Admin => matches!(capability, AdminPanel),
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Role::Owner => "owner",
            Role::Assistant => "assistant",
            Role::Admin => "admin",
        })
    }
}

/// Level of access an assistant holds within a linked business.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AccessLevel {
    Viewer,
    Editor,
}

/// An assistant's link to a business, created from its business key.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BusinessAccess {
    pub business_name: String,
    pub business_key: String,
    pub role: AccessLevel,
    pub added_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub uid: String,
    pub email: String,
    pub display_name: String,
    pub role: Role,
    /// The business an owner owns. Always `None` for assistants and admins.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub business_id: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub business_access: BTreeMap<String, BusinessAccess>,
    /// The tenant an assistant is currently working in.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_business: Option<String>,
    #[serde(default)]
    pub is_blocked: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blocked_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Whether a license change on `business_id` must block or unblock
    /// this user.
    pub fn is_associated_with(&self, business_id: &str) -> bool {
        self.business_id.as_deref() == Some(business_id)
            || self.business_access.contains_key(business_id)
            || (self.role == Role::Owner
                && self.current_business.as_deref() == Some(business_id))
    }

    /// The business whose license governs this user right now.
    pub fn active_business_id(&self) -> Option<&str> {
        match self.role {
            Role::Owner => self.business_id.as_deref(),
            Role::Assistant => self.current_business.as_deref(),
            Role::Admin => None,
        }
    }

    /// Whether the user may act on records of `business_id`.
    pub fn has_business_access(&self, business_id: &str) -> bool {
        self.business_id.as_deref() == Some(business_id)
            || self.business_access.contains_key(business_id)
    }
}

/// Profile fields a user may change on their own record.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UpdateProfile {
    pub display_name: Option<String>,
    /// `Some(Some(val))` = set, `Some(None)` = clear, `None` = no change.
    pub phone: Option<Option<String>>,
}
