//! # Real-Time License Monitor
//!
//! Watches the business that governs a user and re-evaluates its license
//! on every change to `businesses/{id}`. A session holds at most one such
//! watch, kept in a [`LicenseWatch`] slot.

use std::sync::{Arc, Mutex};

use agendo_core::clock::Clock;
use agendo_core::error::AgendoResult;
use agendo_core::license::LicenseStatus;
use agendo_core::models::license::BusinessLicense;
use agendo_core::models::user::{Role, User};
use agendo_core::store::{self, Listener, Snapshot, Store, Subscription, paths};
use tracing::{debug, warn};

use crate::license::REASON_EXPIRED;

pub const REASON_NO_LICENSE: &str = "El negocio no tiene una licencia asignada";
pub const REASON_INACTIVE: &str = "Licencia inactiva";

#[derive(Debug, Clone)]
pub struct LicenseMonitor<S> {
    store: S,
    clock: Arc<dyn Clock>,
}

impl<S: Store> LicenseMonitor<S> {
    pub fn new(store: S, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// The business whose license governs `user`: owners their own,
    /// assistants the one they are working in, admins none.
    pub fn resolve_business_id(user: &User) -> Option<String> {
        user.active_business_id().map(str::to_owned)
    }

    /// Evaluate the stored license of `business_id` right now. A missing
    /// business evaluates like a missing license.
    pub async fn check(&self, business_id: &str) -> AgendoResult<LicenseStatus> {
        let license: Option<BusinessLicense> =
            store::read_as(&self.store, &paths::license(business_id)).await?;
        Ok(LicenseStatus::evaluate(
            Some(business_id),
            license,
            self.clock.now(),
        ))
    }

    /// Subscribe to the business governing `user`, calling `on_change`
    /// with a fresh status immediately and after every change. Returns
    /// `None` when the user has no such business.
    pub async fn watch<F>(&self, user: &User, on_change: F) -> AgendoResult<Option<Subscription>>
    where
        F: Fn(LicenseStatus) + Send + Sync + 'static,
    {
        let Some(business_id) = Self::resolve_business_id(user) else {
            return Ok(None);
        };

        let clock = self.clock.clone();
        let id = business_id.clone();
        let listener: Listener = Arc::new(move |snap: Snapshot| {
            let license = license_from_snapshot(&snap);
            on_change(LicenseStatus::evaluate(Some(&id), license, clock.now()));
        });

        let sub = self
            .store
            .subscribe(&paths::business(&business_id), listener)
            .await?;
        debug!(%business_id, uid = %user.uid, "license watch attached");
        Ok(Some(sub))
    }
}

fn license_from_snapshot(snap: &Snapshot) -> Option<BusinessLicense> {
    let raw = snap.value.as_ref()?.get("license")?.clone();
    match serde_json::from_value(raw) {
        Ok(license) => Some(license),
        Err(e) => {
            warn!(path = %snap.path, error = %e, "malformed license");
            None
        }
    }
}

/// Whether `user` must be held on the blocked screen.
pub fn should_block_user(user: &User, status: Option<&LicenseStatus>) -> bool {
    if user.role == Role::Admin {
        return false;
    }
    if user.is_blocked {
        return true;
    }
    status.is_some_and(|s| !s.is_valid)
}

/// Text for the blocked screen: the stored reason if there is one,
/// otherwise derived from the license state.
pub fn blocking_reason(user: &User, status: Option<&LicenseStatus>) -> String {
    if let Some(reason) = user.blocked_reason.as_deref().filter(|r| !r.is_empty()) {
        return reason.to_string();
    }
    license_reason(status).to_string()
}

/// Why `status` does not allow use of its business.
pub fn license_reason(status: Option<&LicenseStatus>) -> &'static str {
    match status.and_then(|s| s.license.as_ref()) {
        None => REASON_NO_LICENSE,
        Some(license) if !license.is_active => REASON_INACTIVE,
        Some(_) => REASON_EXPIRED,
    }
}

/// Slot holding at most one license subscription.
#[derive(Debug, Default)]
pub struct LicenseWatch {
    slot: Mutex<Option<Subscription>>,
}

impl LicenseWatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `sub`, detaching whatever was there before.
    pub fn replace(&self, sub: Option<Subscription>) {
        let previous = {
            let mut slot = self.slot.lock().unwrap_or_else(|e| e.into_inner());
            std::mem::replace(&mut *slot, sub)
        };
        if let Some(previous) = previous {
            debug!(path = previous.path(), "license watch detached");
            previous.unsubscribe();
        }
    }

    pub fn clear(&self) {
        self.replace(None);
    }

    pub fn is_active(&self) -> bool {
        self.slot
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .is_some()
    }
}
