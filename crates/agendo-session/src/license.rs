//! # License Lifecycle Manager
//!
//! Assigns, cancels and expires business licenses. Every license change
//! cascades to the users associated with the business (see
//! [`User::is_associated_with`]): assignment unblocks them, cancellation
//! and expiry block them. The license write, the business `isActive` flag
//! and all user updates go out as one atomic patch.

use std::sync::Arc;
use std::time::Duration;

use agendo_core::clock::Clock;
use agendo_core::error::{AgendoError, AgendoResult};
use agendo_core::license::{self as evaluator};
use agendo_core::models::business::Business;
use agendo_core::models::license::{BusinessLicense, LicenseType};
use agendo_core::models::user::{Role, User};
use agendo_core::store::{self, Patch, Store, paths};
use chrono::{DateTime, Utc};
use serde_json::{Value, json};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{error, info};

pub const REASON_CANCELED: &str = "Licencia cancelada por administrador";
pub const REASON_EXPIRED: &str = "Licencia expirada";

/// Outcome of one pass over all businesses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Businesses holding an active license.
    pub checked: usize,
    /// Businesses found expired and blocked.
    pub blocked: usize,
}

/// What a license change does to associated users.
#[derive(Debug, Clone, Copy)]
enum Cascade<'a> {
    Unblock,
    Block(&'a str),
}

#[derive(Debug, Clone)]
pub struct LicenseManager<S> {
    store: S,
    clock: Arc<dyn Clock>,
}

impl<S: Store> LicenseManager<S> {
    pub fn new(store: S, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    async fn business(&self, business_id: &str) -> AgendoResult<Business> {
        store::read_as(&self.store, &paths::business(business_id))
            .await?
            .ok_or_else(|| AgendoError::not_found("business", business_id))
    }

    async fn verify_admin(&self, admin_id: &str) -> AgendoResult<()> {
        let admin: Option<User> = store::read_as(&self.store, &paths::user(admin_id)).await?;
        match admin {
            Some(u) if u.role == Role::Admin => Ok(()),
            _ => Err(AgendoError::permission(format!(
                "{admin_id} is not a platform admin"
            ))),
        }
    }

    /// Add the block/unblock entries for every user associated with
    /// `business_id` whose state would change. Returns how many.
    async fn cascade(
        &self,
        patch: &mut Patch,
        business_id: &str,
        action: Cascade<'_>,
        now: DateTime<Utc>,
    ) -> AgendoResult<usize> {
        let users: Vec<(String, User)> =
            store::read_children_lenient(&self.store, paths::USERS).await?;
        let now = store::to_value(&now)?;
        let mut changed = 0;

        for (uid, user) in users {
            if user.role == Role::Admin || !user.is_associated_with(business_id) {
                continue;
            }
            let (blocked, reason) = match action {
                Cascade::Unblock => {
                    if !user.is_blocked && user.blocked_reason.is_none() {
                        continue;
                    }
                    (false, Value::Null)
                }
                Cascade::Block(reason) => {
                    if user.is_blocked && user.blocked_reason.as_deref() == Some(reason) {
                        continue;
                    }
                    (true, json!(reason))
                }
            };
            let user_path = paths::user(&uid);
            patch.insert(format!("{user_path}/isBlocked"), json!(blocked));
            patch.insert(format!("{user_path}/blockedReason"), reason);
            patch.insert(format!("{user_path}/updatedAt"), now.clone());
            changed += 1;
        }
        Ok(changed)
    }

    /// Grant a fresh license of `license_type` starting now. Renewals
    /// replace the previous license and increment its renewal count.
    pub async fn assign_license(
        &self,
        business_id: &str,
        license_type: LicenseType,
        admin_id: &str,
    ) -> AgendoResult<BusinessLicense> {
        self.verify_admin(admin_id).await?;
        let business = self.business(business_id).await?;

        let now = self.clock.now();
        let previous = business.license.as_ref().map_or(0, |l| l.renewal_count);
        let license = BusinessLicense {
            license_type,
            start_date: now,
            end_date: evaluator::compute_end_date(now, license_type),
            is_active: true,
            assigned_by: admin_id.to_string(),
            assigned_at: now,
            renewal_count: previous + 1,
            canceled_at: None,
            canceled_by: None,
        };

        let business_path = paths::business(business_id);
        let mut patch = Patch::new();
        patch.insert(paths::license(business_id), store::to_value(&license)?);
        patch.insert(format!("{business_path}/isActive"), json!(true));
        patch.insert(format!("{business_path}/updatedAt"), store::to_value(&now)?);
        let unblocked = self
            .cascade(&mut patch, business_id, Cascade::Unblock, now)
            .await?;
        self.store.patch(patch).await?;

        info!(
            %business_id,
            license_type = %license_type,
            renewal_count = license.renewal_count,
            users_unblocked = unblocked,
            "license assigned"
        );
        Ok(license)
    }

    /// Terminate the current license immediately. The end date is moved
    /// to now; the renewal count is kept.
    pub async fn cancel_license(&self, business_id: &str, admin_id: &str) -> AgendoResult<BusinessLicense> {
        self.verify_admin(admin_id).await?;
        let business = self.business(business_id).await?;
        let Some(current) = business.license else {
            return Err(AgendoError::NoLicense {
                business_id: business_id.to_string(),
            });
        };

        let now = self.clock.now();
        let license = BusinessLicense {
            is_active: false,
            end_date: now,
            canceled_at: Some(now),
            canceled_by: Some(admin_id.to_string()),
            ..current
        };

        let business_path = paths::business(business_id);
        let mut patch = Patch::new();
        patch.insert(paths::license(business_id), store::to_value(&license)?);
        patch.insert(format!("{business_path}/isActive"), json!(false));
        patch.insert(format!("{business_path}/updatedAt"), store::to_value(&now)?);
        let blocked = self
            .cascade(&mut patch, business_id, Cascade::Block(REASON_CANCELED), now)
            .await?;
        self.store.patch(patch).await?;

        info!(%business_id, users_blocked = blocked, "license canceled");
        Ok(license)
    }

    /// Deactivate the business and its license and block its users.
    /// Returns the number of users newly blocked.
    pub async fn block_for_expiry(&self, business_id: &str) -> AgendoResult<usize> {
        let business = self.business(business_id).await?;
        let now = self.clock.now();

        let business_path = paths::business(business_id);
        let mut patch = Patch::new();
        if business.license.is_some() {
            patch.insert(format!("{business_path}/license/isActive"), json!(false));
        }
        patch.insert(format!("{business_path}/isActive"), json!(false));
        patch.insert(format!("{business_path}/updatedAt"), store::to_value(&now)?);
        let blocked = self
            .cascade(&mut patch, business_id, Cascade::Block(REASON_EXPIRED), now)
            .await?;
        self.store.patch(patch).await?;

        info!(%business_id, users_blocked = blocked, "license expired");
        Ok(blocked)
    }

    /// Expire every active license past its end date. Records that do not
    /// parse are skipped; a failure on one business aborts the sweep and is
    /// returned to the caller.
    pub async fn sweep_all_licenses(&self) -> AgendoResult<SweepReport> {
        let businesses: Vec<(String, Business)> =
            store::read_children_lenient(&self.store, paths::BUSINESSES).await?;
        let now = self.clock.now();
        let mut report = SweepReport::default();

        for (business_id, business) in businesses {
            let Some(license) = business.license.as_ref() else {
                continue;
            };
            if !license.is_active {
                continue;
            }
            report.checked += 1;
            if evaluator::is_expired(Some(license), now) {
                self.block_for_expiry(&business_id).await?;
                report.blocked += 1;
            }
        }

        info!(checked = report.checked, blocked = report.blocked, "license sweep finished");
        Ok(report)
    }
}

/// Run [`LicenseManager::sweep_all_licenses`] now and then every
/// `interval`. Missed ticks are not made up.
pub fn spawn_license_sweeper<S>(manager: Arc<LicenseManager<S>>, interval: Duration) -> JoinHandle<()>
where
    S: Store + 'static,
{
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            if let Err(e) = manager.sweep_all_licenses().await {
                error!(error = %e, "license sweep failed");
            }
        }
    })
}
