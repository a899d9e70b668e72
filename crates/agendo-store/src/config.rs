//! Store configuration.

/// Configuration for an in-memory store instance.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Name reported in log lines and errors.
    pub namespace: String,
    /// Whether the store accepts operations once created. An unavailable
    /// store fails every call, the way an unreachable backend would.
    pub available: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            namespace: "agendo".into(),
            available: true,
        }
    }
}
