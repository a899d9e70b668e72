//! Process configuration: defaults overridden by `AGENDO_*` variables.

use std::str::FromStr;

use agendo_core::error::{AgendoError, AgendoResult};
use agendo_session::SessionConfig;
use agendo_store::StoreConfig;

#[derive(Debug, Clone, Default)]
pub struct ServerConfig {
    pub session: SessionConfig,
    pub store: StoreConfig,
}

impl ServerConfig {
    pub fn from_env() -> AgendoResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from defaults, applying every variable `lookup` returns.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> AgendoResult<Self> {
        let mut config = Self::default();

        if let Some(email) = lookup("AGENDO_ADMIN_EMAIL") {
            config.session.admin_email = email.trim().to_lowercase();
        }
        if let Some(secs) = parse(&lookup, "AGENDO_SWEEP_INTERVAL_SECS")? {
            if secs == 0 {
                return Err(AgendoError::validation(
                    "AGENDO_SWEEP_INTERVAL_SECS must be positive",
                ));
            }
            config.session.sweep_interval_secs = secs;
        }
        if let Some(attempts) = parse(&lookup, "AGENDO_BUSINESS_KEY_ATTEMPTS")? {
            config.session.business_key_max_attempts = attempts;
        }
        if let Some(len) = parse(&lookup, "AGENDO_MIN_PASSWORD_LENGTH")? {
            config.session.min_password_length = len;
        }
        if let Some(pepper) = lookup("AGENDO_PASSWORD_PEPPER") {
            config.session.pepper = Some(pepper);
        }
        if let Some(namespace) = lookup("AGENDO_STORE_NAMESPACE") {
            config.store.namespace = namespace;
        }
        Ok(config)
    }
}

fn parse<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> AgendoResult<Option<T>> {
    lookup(key)
        .map(|raw| {
            raw.trim()
                .parse()
                .map_err(|_| AgendoError::validation(format!("{key}: invalid value {raw:?}")))
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn defaults_without_variables() {
        let config = ServerConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.session.admin_email, "admin@agendo.app");
        assert_eq!(config.session.sweep_interval_secs, 3600);
        assert_eq!(config.store.namespace, "agendo");
    }

    #[test]
    fn variables_override_defaults() {
        let config = ServerConfig::from_lookup(lookup(&[
            ("AGENDO_ADMIN_EMAIL", " Root@Agendo.App "),
            ("AGENDO_SWEEP_INTERVAL_SECS", "60"),
            ("AGENDO_BUSINESS_KEY_ATTEMPTS", "3"),
            ("AGENDO_STORE_NAMESPACE", "staging"),
        ]))
        .unwrap();
        assert_eq!(config.session.admin_email, "root@agendo.app");
        assert_eq!(config.session.sweep_interval_secs, 60);
        assert_eq!(config.session.business_key_max_attempts, 3);
        assert_eq!(config.store.namespace, "staging");
    }

    #[test]
    fn bad_numbers_are_rejected() {
        for vars in [
            [("AGENDO_SWEEP_INTERVAL_SECS", "hourly")],
            [("AGENDO_SWEEP_INTERVAL_SECS", "0")],
            [("AGENDO_MIN_PASSWORD_LENGTH", "-1")],
        ] {
            let err = ServerConfig::from_lookup(lookup(&vars)).unwrap_err();
            assert!(matches!(err, AgendoError::Validation { .. }), "{vars:?}");
        }
    }
}
