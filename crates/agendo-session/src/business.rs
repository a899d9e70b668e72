//! Business onboarding, settings and business keys.
//!
//! A business key is 16 uppercase hex characters, unique across all
//! businesses. Assistants present it to link themselves to a business,
//! so lookups are case-insensitive and keys are stored upper-case.

use std::collections::BTreeSet;
use std::sync::Arc;

use agendo_core::access::Capability;
use agendo_core::clock::Clock;
use agendo_core::error::{AgendoError, AgendoResult};
use agendo_core::models::business::{Business, CreateBusiness, UpdateBusiness};
use agendo_core::models::user::{Role, User};
use agendo_core::store::{self, Patch, Store, paths};
use rand::Rng;
use serde_json::json;
use tracing::{info, warn};

use crate::guard;

/// Length of a business key in characters.
pub const BUSINESS_KEY_LEN: usize = 16;

/// Draw a fresh key: 8 random bytes rendered as uppercase hex.
pub fn random_business_key<R: Rng + ?Sized>(rng: &mut R) -> String {
    let bytes: [u8; BUSINESS_KEY_LEN / 2] = rng.r#gen();
    bytes.iter().map(|b| format!("{b:02X}")).collect()
}

pub fn normalize_business_key(key: &str) -> String {
    key.trim().to_uppercase()
}

/// Reads and writes of `businesses/*` outside the license lifecycle.
#[derive(Debug, Clone)]
pub struct BusinessDirectory<S> {
    store: S,
    clock: Arc<dyn Clock>,
    max_key_attempts: u32,
}

impl<S: Store> BusinessDirectory<S> {
    pub fn new(store: S, clock: Arc<dyn Clock>, max_key_attempts: u32) -> Self {
        Self {
            store,
            clock,
            max_key_attempts,
        }
    }

    pub async fn get(&self, business_id: &str) -> AgendoResult<Business> {
        store::read_as(&self.store, &paths::business(business_id))
            .await?
            .ok_or_else(|| AgendoError::not_found("business", business_id))
    }

    pub async fn list(&self) -> AgendoResult<Vec<Business>> {
        let all: Vec<(String, Business)> =
            store::read_children_lenient(&self.store, paths::BUSINESSES).await?;
        Ok(all.into_iter().map(|(_, b)| b).collect())
    }

    /// Resolve a business key, ignoring case and surrounding whitespace.
    pub async fn find_by_key(&self, key: &str) -> AgendoResult<Option<Business>> {
        let key = normalize_business_key(key);
        if key.is_empty() {
            return Ok(None);
        }
        Ok(self
            .list()
            .await?
            .into_iter()
            .find(|b| b.business_key.eq_ignore_ascii_case(&key)))
    }

    pub async fn generate_unique_business_key(&self) -> AgendoResult<String> {
        self.generate_unique_business_key_with(|| random_business_key(&mut rand::thread_rng()))
            .await
    }

    /// Draw keys from `draw` until one is not in use, giving up after the
    /// configured number of attempts.
    pub async fn generate_unique_business_key_with<F>(&self, mut draw: F) -> AgendoResult<String>
    where
        F: FnMut() -> String,
    {
        let taken: BTreeSet<String> = self
            .list()
            .await?
            .into_iter()
            .map(|b| normalize_business_key(&b.business_key))
            .collect();

        for _ in 0..self.max_key_attempts {
            let candidate = normalize_business_key(&draw());
            if !taken.contains(&candidate) {
                return Ok(candidate);
            }
        }
        Err(AgendoError::validation(format!(
            "could not generate a unique business key after {} attempts",
            self.max_key_attempts
        )))
    }

    /// Owner onboarding. The business starts inactive and unlicensed; the
    /// business record and the owner's `businessId` are written together.
    pub async fn create_business(&self, owner: &User, input: CreateBusiness) -> AgendoResult<Business> {
        if owner.role != Role::Owner {
            return Err(AgendoError::permission("only owners can create a business"));
        }
        if owner.business_id.is_some() {
            return Err(AgendoError::validation("owner already has a business"));
        }
        let name = input.name.trim();
        if name.is_empty() {
            return Err(AgendoError::validation("business name is required"));
        }

        let business_key = self.generate_unique_business_key().await?;
        let now = self.clock.now();
        let business = Business {
            id: self.store.generate_key(paths::BUSINESSES)?,
            name: name.to_string(),
            categories: input.categories,
            operating_hours: input.operating_hours,
            owner_id: owner.uid.clone(),
            business_key,
            license: None,
            is_active: false,
            created_at: now,
            updated_at: now,
        };

        let user_path = paths::user(&owner.uid);
        let mut patch = Patch::new();
        patch.insert(paths::business(&business.id), store::to_value(&business)?);
        patch.insert(format!("{user_path}/businessId"), json!(business.id));
        patch.insert(format!("{user_path}/updatedAt"), store::to_value(&now)?);
        self.store.patch(patch).await?;

        info!(business_id = %business.id, owner = %owner.uid, "business created");
        Ok(business)
    }

    pub async fn update_business(
        &self,
        user: &User,
        business_id: &str,
        input: UpdateBusiness,
    ) -> AgendoResult<Business> {
        guard::authorize(user, business_id, Capability::BusinessSettingsEdit)?;
        let mut business = self.get(business_id).await?;
        let business_path = paths::business(business_id);
        let mut patch = Patch::new();

        if let Some(name) = input.name {
            let name = name.trim();
            if name.is_empty() {
                return Err(AgendoError::validation("business name is required"));
            }
            business.name = name.to_string();
            patch.insert(format!("{business_path}/name"), json!(business.name));
        }
        if let Some(categories) = input.categories {
            patch.insert(format!("{business_path}/categories"), store::to_value(&categories)?);
            business.categories = categories;
        }
        if let Some(hours) = input.operating_hours {
            patch.insert(format!("{business_path}/operatingHours"), store::to_value(&hours)?);
            business.operating_hours = hours;
        }
        business.updated_at = self.clock.now();
        patch.insert(
            format!("{business_path}/updatedAt"),
            store::to_value(&business.updated_at)?,
        );

        // License fields belong to the license lifecycle; only settings are written.
        self.store.patch(patch).await?;
        Ok(business)
    }

    /// Replace the business key. Assistants keep their access; the key
    /// copied into their access entries is updated in the same patch.
    pub async fn regenerate_business_key(&self, user: &User, business_id: &str) -> AgendoResult<String> {
        guard::authorize(user, business_id, Capability::BusinessSettingsEdit)?;
        self.get(business_id).await?;

        let key = self.generate_unique_business_key().await?;
        let now = store::to_value(&self.clock.now())?;
        let business_path = paths::business(business_id);

        let mut patch = Patch::new();
        patch.insert(format!("{business_path}/businessKey"), json!(key));
        patch.insert(format!("{business_path}/updatedAt"), now);

        let users: Vec<(String, User)> =
            store::read_children_lenient(&self.store, paths::USERS).await?;
        for (uid, u) in users {
            if u.business_access.contains_key(business_id) {
                patch.insert(
                    format!("{}/businessAccess/{business_id}/businessKey", paths::user(&uid)),
                    json!(key),
                );
            }
        }
        self.store.patch(patch).await?;

        info!(%business_id, "business key regenerated");
        Ok(key)
    }

    /// Display name of the business owner, for banners. Any failure
    /// degrades to `None`.
    pub async fn owner_display_name(&self, business_id: &str) -> Option<String> {
        let lookup = async {
            let business = self.get(business_id).await?;
            let owner: Option<User> =
                store::read_as(&self.store, &paths::user(&business.owner_id)).await?;
            AgendoResult::Ok(owner.map(|u| u.display_name))
        };
        match lookup.await {
            Ok(name) => name,
            Err(e) => {
                warn!(%business_id, error = %e, "could not read business owner");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn random_keys_are_sixteen_uppercase_hex() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..50 {
            let key = random_business_key(&mut rng);
            assert_eq!(key.len(), BUSINESS_KEY_LEN);
            assert!(key.chars().all(|c| c.is_ascii_digit() || ('A'..='F').contains(&c)));
        }
    }

    #[test]
    fn keys_normalize_to_upper_case() {
        assert_eq!(normalize_business_key(" abcdef0123456789 "), "ABCDEF0123456789");
    }
}
