//! Session and license service configuration.

/// Configuration shared by the session layer and the license services.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// The only address allowed to hold the platform admin role. Its user
    /// record is seeded on first login if absent.
    pub admin_email: String,
    /// Attempts at drawing an unused business key before giving up
    /// (default: 10).
    pub business_key_max_attempts: u32,
    /// Seconds between license sweeps (default: 3600 = 1 hour).
    pub sweep_interval_secs: u64,
    /// Minimum password length accepted at registration (default: 6).
    pub min_password_length: usize,
    /// Optional pepper prepended to passwords before Argon2id hashing.
    pub pepper: Option<String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            admin_email: "admin@agendo.app".into(),
            business_key_max_attempts: 10,
            sweep_interval_secs: 3600,
            min_password_length: 6,
            pepper: None,
        }
    }
}
