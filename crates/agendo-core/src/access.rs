//! # Access Control Gate
//!
//! Stateless decisions over a user's role, block flag and the last known
//! license status:
//!
//! - admins reach everything and may always write;
//! - blocked users reach only [`Section::Notifications`] and may not write;
//! - users whose license is invalid reach only the dashboard and
//!   notifications;
//! - everyone else reaches every section.
//!
//! Which CRUD actions a role may perform is a static table, see
//! [`crate::models::user::Role::permits`].

use serde::{Deserialize, Serialize};

use crate::license::LicenseStatus;
use crate::models::user::{Role, User};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Section {
    Dashboard,
    Calendar,
    Clients,
    Services,
    DigitalRecords,
    Reports,
    Settings,
    Notifications,
    Admin,
}

impl Section {
    pub const ALL: [Section; 9] = [
        Section::Dashboard,
        Section::Calendar,
        Section::Clients,
        Section::Services,
        Section::DigitalRecords,
        Section::Reports,
        Section::Settings,
        Section::Notifications,
        Section::Admin,
    ];
}

/// Reachable while blocked.
const BLOCKED_SECTIONS: &[Section] = &[Section::Notifications];

/// Reachable, read-only, while the license is invalid.
const READ_ONLY_SECTIONS: &[Section] = &[Section::Dashboard, Section::Notifications];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Capability {
    ServiceRead,
    ServiceCreate,
    ServiceUpdate,
    ServiceDelete,
    ClientRead,
    ClientCreate,
    ClientUpdate,
    ClientDelete,
    AppointmentRead,
    AppointmentCreate,
    AppointmentUpdate,
    AppointmentDelete,
    RecordRead,
    RecordCreate,
    RecordUpdate,
    RecordDelete,
    ReportView,
    ReportExport,
    BusinessSettingsEdit,
    AdminPanel,
}

/// Outcome of a write check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteAccess {
    Allowed,
    Denied,
    /// No license status is cached; the caller must evaluate the license
    /// directly before writing.
    Unknown,
}

#[derive(Debug, Clone, Copy)]
pub struct AccessGate<'a> {
    pub role: Role,
    pub is_blocked: bool,
    pub license_status: Option<&'a LicenseStatus>,
}

impl<'a> AccessGate<'a> {
    pub fn new(role: Role, is_blocked: bool, license_status: Option<&'a LicenseStatus>) -> Self {
        Self {
            role,
            is_blocked,
            license_status,
        }
    }

    pub fn for_user(user: &User, license_status: Option<&'a LicenseStatus>) -> Self {
        Self::new(user.role, user.is_blocked, license_status)
    }

    pub fn can_access_section(&self, section: Section) -> bool {
        if self.role == Role::Admin {
            return true;
        }
        if self.is_blocked {
            return BLOCKED_SECTIONS.contains(&section);
        }
        match self.license_status {
            Some(status) if !status.is_valid => READ_ONLY_SECTIONS.contains(&section),
            _ => true,
        }
    }

    pub fn can_perform_write_action(&self) -> WriteAccess {
        if self.role == Role::Admin {
            return WriteAccess::Allowed;
        }
        if self.is_blocked {
            return WriteAccess::Denied;
        }
        match self.license_status {
            Some(status) if status.is_valid => WriteAccess::Allowed,
            Some(_) => WriteAccess::Denied,
            None => WriteAccess::Unknown,
        }
    }

    pub fn permits(&self, capability: Capability) -> bool {
        self.role.permits(capability)
    }
}
