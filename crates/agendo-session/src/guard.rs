//! Tenant and capability checks shared by the record and booking services.

use agendo_core::access::Capability;
use agendo_core::error::{AgendoError, AgendoResult};
use agendo_core::models::user::User;

/// Fail unless `user` belongs to `business_id`: it is their own business
/// or they hold an access entry for it.
pub fn validate_business_access(user: &User, business_id: &str) -> AgendoResult<()> {
    if user.has_business_access(business_id) {
        Ok(())
    } else {
        Err(AgendoError::permission(format!(
            "no access to business {business_id}"
        )))
    }
}

/// Tenant check followed by the role's capability table.
pub fn authorize(user: &User, business_id: &str, capability: Capability) -> AgendoResult<()> {
    validate_business_access(user, business_id)?;
    if user.role.permits(capability) {
        Ok(())
    } else {
        Err(AgendoError::permission(format!(
            "role {} may not perform {capability:?}",
            user.role
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    use agendo_core::models::user::{AccessLevel, BusinessAccess, Role};
    use chrono::Utc;

    fn user(role: Role) -> User {
        User {
            uid: "u1".into(),
            email: "u1@example.com".into(),
            display_name: "U1".into(),
            role,
            business_id: None,
            business_access: BTreeMap::new(),
            current_business: None,
            is_blocked: false,
            blocked_reason: None,
            phone: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn owner_is_authorized_on_own_business_only() {
        let mut owner = user(Role::Owner);
        owner.business_id = Some("b1".into());
        assert!(authorize(&owner, "b1", Capability::RecordCreate).is_ok());
        let err = authorize(&owner, "b2", Capability::RecordCreate).unwrap_err();
        assert!(matches!(err, AgendoError::PermissionDenied { .. }));
    }

    #[test]
    fn assistant_needs_access_entry_and_capability() {
        let mut assistant = user(Role::Assistant);
        assert!(authorize(&assistant, "b1", Capability::AppointmentCreate).is_err());

        assistant.business_access.insert(
            "b1".into(),
            BusinessAccess {
                business_name: "Salon".into(),
                business_key: "ABCDEF0123456789".into(),
                role: AccessLevel::Viewer,
                added_at: Utc::now(),
            },
        );
        assert!(authorize(&assistant, "b1", Capability::AppointmentCreate).is_ok());
        assert!(validate_business_access(&assistant, "b1").is_ok());
        assert!(authorize(&assistant, "b1", Capability::RecordRead).is_err());
    }
}
