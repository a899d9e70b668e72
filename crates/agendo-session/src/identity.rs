//! Identity provider contract and an in-process implementation.
//!
//! The session layer only needs a provider that turns credentials into a
//! stable uid. Hosted providers plug in by implementing
//! [`IdentityProvider`]; [`LocalIdentityProvider`] keeps Argon2id hashes
//! in memory and backs the tests and the standalone server.

use std::collections::HashMap;
use std::sync::Arc;

use agendo_core::error::AgendoResult;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use crate::config::SessionConfig;
use crate::error::IdentityError;
use crate::password;

/// An authenticated principal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub uid: String,
    pub email: String,
}

pub trait IdentityProvider: Send + Sync {
    /// Verify credentials and return the matching identity.
    fn sign_in(
        &self,
        email: &str,
        password: &str,
    ) -> impl Future<Output = AgendoResult<Identity>> + Send;

    /// Create an account and return its identity.
    fn sign_up(
        &self,
        email: &str,
        password: &str,
    ) -> impl Future<Output = AgendoResult<Identity>> + Send;

    fn sign_out(&self, uid: &str) -> impl Future<Output = AgendoResult<()>> + Send;

    /// Remove an account, used to roll back a half-finished registration.
    fn delete_account(&self, uid: &str) -> impl Future<Output = AgendoResult<()>> + Send;
}

#[derive(Debug, Clone)]
struct Account {
    uid: String,
    password_hash: String,
}

/// In-process identity provider. Clones share the same account table.
#[derive(Debug, Clone)]
pub struct LocalIdentityProvider {
    accounts: Arc<RwLock<HashMap<String, Account>>>,
    min_password_length: usize,
    pepper: Option<String>,
}

impl Default for LocalIdentityProvider {
    fn default() -> Self {
        Self::new(6, None)
    }
}

impl LocalIdentityProvider {
    pub fn new(min_password_length: usize, pepper: Option<String>) -> Self {
        Self {
            accounts: Arc::new(RwLock::new(HashMap::new())),
            min_password_length,
            pepper,
        }
    }

    pub fn from_config(config: &SessionConfig) -> Self {
        Self::new(config.min_password_length, config.pepper.clone())
    }

    pub async fn account_count(&self) -> usize {
        self.accounts.read().await.len()
    }
}

fn normalize_email(email: &str) -> Result<String, IdentityError> {
    let email = email.trim().to_lowercase();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => Ok(email),
        _ => Err(IdentityError::InvalidEmail(email)),
    }
}

impl IdentityProvider for LocalIdentityProvider {
    async fn sign_in(&self, email: &str, password: &str) -> AgendoResult<Identity> {
        let email = normalize_email(email).map_err(|_| IdentityError::InvalidCredentials)?;
        let account = {
            let accounts = self.accounts.read().await;
            accounts
                .get(&email)
                .cloned()
                .ok_or(IdentityError::InvalidCredentials)?
        };

        let valid =
            password::verify_password(password, &account.password_hash, self.pepper.as_deref())?;
        if !valid {
            return Err(IdentityError::InvalidCredentials.into());
        }

        Ok(Identity {
            uid: account.uid,
            email,
        })
    }

    async fn sign_up(&self, email: &str, password: &str) -> AgendoResult<Identity> {
        let email = normalize_email(email)?;
        if password.chars().count() < self.min_password_length {
            return Err(IdentityError::WeakPassword {
                min: self.min_password_length,
            }
            .into());
        }
        let password_hash = password::hash_password(password, self.pepper.as_deref())?;

        let mut accounts = self.accounts.write().await;
        if accounts.contains_key(&email) {
            return Err(IdentityError::EmailInUse.into());
        }
        let uid = Uuid::new_v4().simple().to_string();
        accounts.insert(
            email.clone(),
            Account {
                uid: uid.clone(),
                password_hash,
            },
        );
        debug!(%uid, "identity account created");
        Ok(Identity { uid, email })
    }

    async fn sign_out(&self, uid: &str) -> AgendoResult<()> {
        debug!(%uid, "identity signed out");
        Ok(())
    }

    async fn delete_account(&self, uid: &str) -> AgendoResult<()> {
        let mut accounts = self.accounts.write().await;
        let before = accounts.len();
        accounts.retain(|_, account| account.uid != uid);
        if accounts.len() == before {
            return Err(IdentityError::AccountNotFound.into());
        }
        debug!(%uid, "identity account deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agendo_core::error::AgendoError;

    #[tokio::test]
    async fn sign_up_then_sign_in() {
        let idp = LocalIdentityProvider::default();
        let created = idp.sign_up("Ana@Example.com ", "secret1").await.unwrap();
        assert_eq!(created.email, "ana@example.com");

        let signed = idp.sign_in("ana@example.com", "secret1").await.unwrap();
        assert_eq!(signed.uid, created.uid);
    }

    #[tokio::test]
    async fn wrong_password_is_rejected() {
        let idp = LocalIdentityProvider::default();
        idp.sign_up("ana@example.com", "secret1").await.unwrap();
        let err = idp.sign_in("ana@example.com", "nope").await.unwrap_err();
        assert!(matches!(err, AgendoError::AuthenticationFailed { .. }));

        let err = idp.sign_in("nobody@example.com", "secret1").await.unwrap_err();
        assert!(matches!(err, AgendoError::AuthenticationFailed { .. }));
    }

    #[tokio::test]
    async fn duplicate_email_and_short_password_fail_validation() {
        let idp = LocalIdentityProvider::default();
        idp.sign_up("ana@example.com", "secret1").await.unwrap();
        let dup = idp.sign_up("ANA@example.com", "secret2").await.unwrap_err();
        assert!(matches!(dup, AgendoError::Validation { .. }));

        let weak = idp.sign_up("bea@example.com", "123").await.unwrap_err();
        assert!(matches!(weak, AgendoError::Validation { .. }));

        let bad = idp.sign_up("not-an-email", "secret1").await.unwrap_err();
        assert!(matches!(bad, AgendoError::Validation { .. }));
    }

    #[tokio::test]
    async fn delete_account_removes_credentials() {
        let idp = LocalIdentityProvider::default();
        let id = idp.sign_up("ana@example.com", "secret1").await.unwrap();
        idp.delete_account(&id.uid).await.unwrap();
        assert_eq!(idp.account_count().await, 0);
        assert!(idp.sign_in("ana@example.com", "secret1").await.is_err());
        assert!(idp.delete_account(&id.uid).await.is_err());
    }
}
