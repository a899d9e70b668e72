//! # Session / User State Machine
//!
//! A [`Session`] is created per signed-in user and owns everything that
//! would otherwise be global UI state: the user record, the business in
//! use, the last license status and the single live license watch.
//!
//! ```text
//! Anonymous -> Authenticating -> { Admin | OwnerNoBusiness | OwnerActive
//!                                 | AssistantActive | Blocked } -> Anonymous
//! ```
//!
//! Loading a user (login, registration, refresh) re-derives the block
//! flag from the current license and writes any change back first, so a
//! license that lapsed while the user was away blocks them before any
//! business data is read.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use agendo_core::access::{AccessGate, Section, WriteAccess};
use agendo_core::clock::Clock;
use agendo_core::error::{AgendoError, AgendoResult};
use agendo_core::license::LicenseStatus;
use agendo_core::models::appointment::{Appointment, CreateAppointment, UpdateAppointment};
use agendo_core::models::business::{Business, CreateBusiness};
use agendo_core::models::record::{CreateDigitalRecord, DigitalRecord, UpdateDigitalRecord};
use agendo_core::models::user::{AccessLevel, BusinessAccess, Role, UpdateProfile, User};
use agendo_core::store::{self, Patch, Store, paths};
use serde_json::{Value, json};
use tracing::{info, warn};

use crate::appointments::AppointmentBook;
use crate::business::BusinessDirectory;
use crate::config::SessionConfig;
use crate::identity::IdentityProvider;
use crate::monitor::{self, LicenseMonitor, LicenseWatch};
use crate::records::RecordBook;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Anonymous,
    Authenticating,
    Admin,
    OwnerNoBusiness,
    OwnerActive,
    AssistantActive,
    Blocked,
}

/// Input for [`Session::register`].
#[derive(Debug, Clone)]
pub struct Registration {
    pub email: String,
    pub password: String,
    pub display_name: String,
    pub role: Role,
    /// Required for assistants.
    pub business_key: Option<String>,
}

type StatusListener = Arc<dyn Fn(&LicenseStatus) + Send + Sync>;

pub struct Session<S, I> {
    store: S,
    identity: I,
    config: SessionConfig,
    clock: Arc<dyn Clock>,
    directory: BusinessDirectory<S>,
    monitor: LicenseMonitor<S>,
    appointments: AppointmentBook<S>,
    records: RecordBook<S>,
    current_user: Option<User>,
    current_business: Option<Business>,
    license_status: Arc<RwLock<Option<LicenseStatus>>>,
    watch: LicenseWatch,
    loading: bool,
    on_license_change: Option<StatusListener>,
}

impl<S, I> Session<S, I>
where
    S: Store + Clone + 'static,
    I: IdentityProvider,
{
    pub fn new(store: S, identity: I, config: SessionConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            directory: BusinessDirectory::new(
                store.clone(),
                clock.clone(),
                config.business_key_max_attempts,
            ),
            monitor: LicenseMonitor::new(store.clone(), clock.clone()),
            appointments: AppointmentBook::new(store.clone(), clock.clone()),
            records: RecordBook::new(store.clone(), clock.clone()),
            store,
            identity,
            config,
            clock,
            current_user: None,
            current_business: None,
            license_status: Arc::new(RwLock::new(None)),
            watch: LicenseWatch::new(),
            loading: false,
            on_license_change: None,
        }
    }

    /// Called with every status pushed by the live license watch.
    pub fn set_license_listener(&mut self, listener: impl Fn(&LicenseStatus) + Send + Sync + 'static) {
        self.on_license_change = Some(Arc::new(listener));
    }

    pub fn state(&self) -> SessionState {
        if self.loading {
            return SessionState::Authenticating;
        }
        let Some(user) = &self.current_user else {
            return SessionState::Anonymous;
        };
        match user.role {
            Role::Admin => SessionState::Admin,
            _ if user.is_blocked => SessionState::Blocked,
            Role::Owner if user.business_id.is_none() => SessionState::OwnerNoBusiness,
            Role::Owner => SessionState::OwnerActive,
            Role::Assistant => SessionState::AssistantActive,
        }
    }

    pub fn current_user(&self) -> Option<&User> {
        self.current_user.as_ref()
    }

    pub fn current_business(&self) -> Option<&Business> {
        self.current_business.as_ref()
    }

    pub fn business_access(&self) -> Option<&BTreeMap<String, BusinessAccess>> {
        self.current_user.as_ref().map(|u| &u.business_access)
    }

    pub fn license_status(&self) -> Option<LicenseStatus> {
        self.license_status
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn is_watching_license(&self) -> bool {
        self.watch.is_active()
    }

    fn set_status(&self, status: Option<LicenseStatus>) {
        *self
            .license_status
            .write()
            .unwrap_or_else(|e| e.into_inner()) = status;
    }

    fn user(&self) -> AgendoResult<&User> {
        self.current_user
            .as_ref()
            .ok_or_else(|| AgendoError::AuthenticationFailed {
                reason: "no user is signed in".into(),
            })
    }

    fn assistant(&self) -> AgendoResult<&User> {
        let user = self.user()?;
        if user.role != Role::Assistant {
            return Err(AgendoError::permission("only assistants can link businesses"));
        }
        Ok(user)
    }

    pub async fn login(&mut self, email: &str, password: &str) -> AgendoResult<User> {
        self.loading = true;
        let result = self.login_inner(email, password).await;
        self.loading = false;
        result
    }

    async fn login_inner(&mut self, email: &str, password: &str) -> AgendoResult<User> {
        // 1. Authenticate with the identity provider.
        let identity = self.identity.sign_in(email, password).await?;

        // 2. Load the user record, seeding the platform admin if needed.
        let user_path = paths::user(&identity.uid);
        let user = match store::read_as::<_, User>(&self.store, &user_path).await? {
            Some(user) => user,
            None if identity.email.eq_ignore_ascii_case(&self.config.admin_email) => {
                let now = self.clock.now();
                let admin = User {
                    uid: identity.uid.clone(),
                    email: identity.email.clone(),
                    display_name: "Administrador".into(),
                    role: Role::Admin,
                    business_id: None,
                    business_access: BTreeMap::new(),
                    current_business: None,
                    is_blocked: false,
                    blocked_reason: None,
                    phone: None,
                    created_at: now,
                    updated_at: now,
                };
                store::write_as(&self.store, &user_path, &admin).await?;
                info!(uid = %admin.uid, "platform admin record seeded");
                admin
            }
            None => {
                self.identity.sign_out(&identity.uid).await?;
                return Err(AgendoError::not_found("user", identity.uid));
            }
        };

        // 3. Self-heal the block flag, load the business, watch the license.
        let user = self.establish(user).await?;
        info!(uid = %user.uid, role = %user.role, "session started");
        Ok(user)
    }

    /// Create an identity account and its user record. Assistants must
    /// present a business key that resolves to an existing business; the
    /// admin role is reserved to the configured admin address. Nothing is
    /// persisted when validation fails.
    pub async fn register(&mut self, input: Registration) -> AgendoResult<User> {
        self.loading = true;
        let result = self.register_inner(input).await;
        self.loading = false;
        result
    }

    async fn register_inner(&mut self, input: Registration) -> AgendoResult<User> {
        let display_name = input.display_name.trim().to_string();
        if display_name.is_empty() {
            return Err(AgendoError::validation("display name is required"));
        }

        // 1. Validate the role before any account exists.
        let mut business_access = BTreeMap::new();
        let mut current_business = None;
        match input.role {
            Role::Admin => {
                if !input.email.trim().eq_ignore_ascii_case(&self.config.admin_email) {
                    return Err(AgendoError::permission(
                        "the admin role is reserved to the platform administrator",
                    ));
                }
            }
            Role::Assistant => {
                let key = input.business_key.as_deref().unwrap_or_default();
                if key.trim().is_empty() {
                    return Err(AgendoError::validation(
                        "assistants must register with a business key",
                    ));
                }
                let business = self.directory.find_by_key(key).await?.ok_or_else(|| {
                    AgendoError::validation(format!("no business matches the key {}", key.trim()))
                })?;
                business_access.insert(
                    business.id.clone(),
                    BusinessAccess {
                        business_name: business.name,
                        business_key: business.business_key,
                        role: AccessLevel::Viewer,
                        added_at: self.clock.now(),
                    },
                );
                current_business = Some(business.id);
            }
            Role::Owner => {}
        }

        // 2. Create the identity account.
        let identity = self.identity.sign_up(&input.email, &input.password).await?;

        // 3. Persist the user record, rolling the account back on failure.
        let now = self.clock.now();
        let user = User {
            uid: identity.uid.clone(),
            email: identity.email,
            display_name,
            role: input.role,
            business_id: None,
            business_access,
            current_business,
            is_blocked: false,
            blocked_reason: None,
            phone: None,
            created_at: now,
            updated_at: now,
        };
        if let Err(e) = store::write_as(&self.store, &paths::user(&user.uid), &user).await {
            if let Err(rollback) = self.identity.delete_account(&identity.uid).await {
                warn!(uid = %identity.uid, error = %rollback, "could not roll back identity account");
            }
            return Err(e);
        }
        info!(uid = %user.uid, role = %user.role, "user registered");

        self.establish(user).await
    }

    /// Re-derive the block flag, load the business and re-attach the
    /// license watch for `user`, replacing whatever the session held.
    async fn establish(&mut self, user: User) -> AgendoResult<User> {
        self.watch.clear();
        let user = self.sync_block_status(user).await?;

        self.current_business = match LicenseMonitor::<S>::resolve_business_id(&user) {
            Some(business_id) => {
                store::read_as(&self.store, &paths::business(&business_id)).await?
            }
            None => None,
        };
        self.current_user = Some(user.clone());
        self.attach_monitor(&user).await?;
        Ok(user)
    }

    /// Compare the stored block flag with the license of the user's
    /// business and commit any difference.
    async fn sync_block_status(&mut self, mut user: User) -> AgendoResult<User> {
        let Some(business_id) = LicenseMonitor::<S>::resolve_business_id(&user) else {
            self.set_status(None);
            return Ok(user);
        };
        if user.role == Role::Admin {
            self.set_status(None);
            return Ok(user);
        }

        let status = self.monitor.check(&business_id).await?;
        let user_path = paths::user(&user.uid);
        let now = self.clock.now();
        let mut patch = Patch::new();

        if !status.is_valid && !user.is_blocked {
            let reason = monitor::blocking_reason(&user, Some(&status));
            patch.insert(format!("{user_path}/isBlocked"), json!(true));
            patch.insert(format!("{user_path}/blockedReason"), json!(reason));
            user.is_blocked = true;
            user.blocked_reason = Some(reason);
        } else if status.is_valid && user.is_blocked {
            patch.insert(format!("{user_path}/isBlocked"), json!(false));
            patch.insert(format!("{user_path}/blockedReason"), Value::Null);
            user.is_blocked = false;
            user.blocked_reason = None;
        }

        if !patch.is_empty() {
            patch.insert(format!("{user_path}/updatedAt"), store::to_value(&now)?);
            self.store.patch(patch).await?;
            user.updated_at = now;
            info!(uid = %user.uid, %business_id, blocked = user.is_blocked, "block status corrected");
        }
        self.set_status(Some(status));
        Ok(user)
    }

    async fn attach_monitor(&mut self, user: &User) -> AgendoResult<()> {
        self.watch.clear();
        let slot = self.license_status.clone();
        let listener = self.on_license_change.clone();
        let sub = self
            .monitor
            .watch(user, move |status| {
                if let Some(listener) = &listener {
                    listener(&status);
                }
                *slot.write().unwrap_or_else(|e| e.into_inner()) = Some(status);
            })
            .await?;
        self.watch.replace(sub);
        Ok(())
    }

    /// Re-read the user and redo what login does. Used as the retry
    /// action of the blocked screen.
    pub async fn refresh_license_status(&mut self) -> AgendoResult<Option<LicenseStatus>> {
        let uid = self.user()?.uid.clone();
        let user: User = store::read_as(&self.store, &paths::user(&uid))
            .await?
            .ok_or_else(|| AgendoError::not_found("user", &uid))?;
        self.establish(user).await?;
        Ok(self.license_status())
    }

    pub async fn logout(&mut self) -> AgendoResult<()> {
        self.watch.clear();
        let uid = self.current_user.take().map(|u| u.uid);
        self.current_business = None;
        self.set_status(None);
        self.loading = false;
        if let Some(uid) = uid {
            self.identity.sign_out(&uid).await?;
            info!(%uid, "session ended");
        }
        Ok(())
    }

    pub async fn update_user_profile(&mut self, input: UpdateProfile) -> AgendoResult<User> {
        let mut user = self.user()?.clone();
        let user_path = paths::user(&user.uid);
        let mut patch = Patch::new();

        if let Some(name) = input.display_name {
            let name = name.trim().to_string();
            if name.is_empty() {
                return Err(AgendoError::validation("display name is required"));
            }
            patch.insert(format!("{user_path}/displayName"), json!(name));
            user.display_name = name;
        }
        if let Some(phone) = input.phone {
            patch.insert(
                format!("{user_path}/phone"),
                phone.as_ref().map_or(Value::Null, |p| json!(p)),
            );
            user.phone = phone;
        }
        if patch.is_empty() {
            return Ok(user);
        }

        let now = self.clock.now();
        patch.insert(format!("{user_path}/updatedAt"), store::to_value(&now)?);
        self.store.patch(patch).await?;
        user.updated_at = now;
        self.current_user = Some(user.clone());
        Ok(user)
    }

    /// Link the signed-in assistant to the business behind `business_key`
    /// with viewer access. The first linked business becomes current.
    /// Linking an already linked business changes nothing.
    pub async fn add_business_access(&mut self, business_key: &str) -> AgendoResult<BusinessAccess> {
        let mut user = self.assistant()?.clone();
        let business = self
            .directory
            .find_by_key(business_key)
            .await?
            .ok_or_else(|| {
                AgendoError::validation(format!("no business matches the key {}", business_key.trim()))
            })?;
        if let Some(existing) = user.business_access.get(&business.id) {
            return Ok(existing.clone());
        }

        let now = self.clock.now();
        let access = BusinessAccess {
            business_name: business.name.clone(),
            business_key: business.business_key.clone(),
            role: AccessLevel::Viewer,
            added_at: now,
        };
        let user_path = paths::user(&user.uid);
        let becomes_current = user.current_business.is_none();

        let mut patch = Patch::new();
        patch.insert(
            format!("{user_path}/businessAccess/{}", business.id),
            store::to_value(&access)?,
        );
        if becomes_current {
            patch.insert(format!("{user_path}/currentBusiness"), json!(business.id));
        }
        patch.insert(format!("{user_path}/updatedAt"), store::to_value(&now)?);
        self.store.patch(patch).await?;
        info!(uid = %user.uid, business_id = %business.id, "business access granted");

        user.business_access.insert(business.id.clone(), access.clone());
        user.updated_at = now;
        if becomes_current {
            user.current_business = Some(business.id);
            self.establish(user).await?;
        } else {
            self.current_user = Some(user);
        }
        Ok(access)
    }

    /// Switch the assistant's working business and re-watch its license.
    pub async fn set_current_business(&mut self, business_id: &str) -> AgendoResult<Business> {
        let mut user = self.assistant()?.clone();
        if !user.business_access.contains_key(business_id) {
            return Err(AgendoError::permission(format!(
                "no access to business {business_id}"
            )));
        }

        let now = self.clock.now();
        let user_path = paths::user(&user.uid);
        let mut patch = Patch::new();
        patch.insert(format!("{user_path}/currentBusiness"), json!(business_id));
        patch.insert(format!("{user_path}/updatedAt"), store::to_value(&now)?);
        self.store.patch(patch).await?;

        user.current_business = Some(business_id.to_string());
        user.updated_at = now;
        self.establish(user).await?;
        self.current_business
            .clone()
            .ok_or_else(|| AgendoError::not_found("business", business_id))
    }

    /// Owner onboarding. The new business has no license yet.
    pub async fn create_business(&mut self, input: CreateBusiness) -> AgendoResult<Business> {
        let owner = self.user()?.clone();
        let business = self.directory.create_business(&owner, input).await?;
        let user: User = store::read_as(&self.store, &paths::user(&owner.uid))
            .await?
            .ok_or_else(|| AgendoError::not_found("user", &owner.uid))?;
        self.establish(user).await?;
        Ok(business)
    }

    /// Owner name for the business currently in use, `None` on any failure.
    pub async fn business_owner_name(&self) -> Option<String> {
        let business_id = self.current_business.as_ref()?.id.clone();
        self.directory.owner_display_name(&business_id).await
    }

    pub fn can_access_section(&self, section: Section) -> bool {
        let Some(user) = &self.current_user else {
            return false;
        };
        let status = self.license_status();
        AccessGate::for_user(user, status.as_ref()).can_access_section(section)
    }

    /// Whether the signed-in user may write. A status is cached whenever
    /// the user resolves to a business, so an uncached status normally means
    /// there is no business and the answer is `false`. If a business does
    /// resolve without a cached status, its license is read from the store.
    pub async fn can_perform_write_action(&self) -> AgendoResult<bool> {
        let Some(user) = &self.current_user else {
            return Ok(false);
        };
        let status = self.license_status();
        match AccessGate::for_user(user, status.as_ref()).can_perform_write_action() {
            WriteAccess::Allowed => Ok(true),
            WriteAccess::Denied => Ok(false),
            WriteAccess::Unknown => match user.active_business_id() {
                Some(business_id) => Ok(self.monitor.check(business_id).await?.is_valid),
                None => Ok(false),
            },
        }
    }

    /// Refuse writes into `business_id` unless the user may write and that
    /// business holds a valid license. Businesses other than the active one
    /// are checked against the store.
    async fn ensure_writable(&self, business_id: &str) -> AgendoResult<&User> {
        if !self.can_perform_write_action().await? {
            let user = self.user()?;
            let status = self.license_status();
            return Err(AgendoError::permission(monitor::blocking_reason(
                user,
                status.as_ref(),
            )));
        }
        let user = self.user()?;
        if user.role != Role::Admin && user.active_business_id() != Some(business_id) {
            let status = self.monitor.check(business_id).await?;
            if !status.is_valid {
                warn!(uid = %user.uid, %business_id, "write refused: business license not valid");
                return Err(AgendoError::permission(monitor::license_reason(Some(&status))));
            }
        }
        Ok(user)
    }

    pub async fn create_client_record(&self, input: CreateDigitalRecord) -> AgendoResult<DigitalRecord> {
        let user = self.ensure_writable(&input.business_id).await?;
        self.records.create(user, input).await
    }

    pub async fn get_client_records(
        &self,
        business_id: &str,
        client_id: Option<&str>,
    ) -> AgendoResult<Vec<DigitalRecord>> {
        let user = self.user()?;
        self.records.list(user, business_id, client_id).await
    }

    pub async fn update_client_record(
        &self,
        business_id: &str,
        record_id: &str,
        input: UpdateDigitalRecord,
    ) -> AgendoResult<DigitalRecord> {
        let user = self.ensure_writable(business_id).await?;
        self.records.update(user, business_id, record_id, input).await
    }

    pub async fn delete_client_record(&self, business_id: &str, record_id: &str) -> AgendoResult<()> {
        let user = self.ensure_writable(business_id).await?;
        self.records.delete(user, business_id, record_id).await
    }

    pub async fn list_appointments(&self, business_id: &str) -> AgendoResult<Vec<Appointment>> {
        let user = self.user()?;
        self.appointments.list(user, business_id).await
    }

    pub async fn create_appointment(
        &self,
        business_id: &str,
        input: CreateAppointment,
    ) -> AgendoResult<Appointment> {
        let user = self.ensure_writable(business_id).await?;
        self.appointments.create(user, business_id, input).await
    }

    pub async fn update_appointment(
        &self,
        business_id: &str,
        appointment_id: &str,
        input: UpdateAppointment,
    ) -> AgendoResult<Appointment> {
        let user = self.ensure_writable(business_id).await?;
        self.appointments
            .update(user, business_id, appointment_id, input)
            .await
    }

    pub async fn delete_appointment(&self, business_id: &str, appointment_id: &str) -> AgendoResult<()> {
        let user = self.ensure_writable(business_id).await?;
        self.appointments
            .delete(user, business_id, appointment_id)
            .await
    }
}
