//! Persistent store contract.
//!
//! The store is a JSON document tree addressed by slash-delimited paths
//! (`businesses/{id}/appointments/{id}`). It supports single-path reads,
//! full overwrites, atomic multi-path patches, push-key generation and
//! live subscriptions. All operations are async; a failing backend
//! surfaces as [`AgendoError::Upstream`].

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::warn;

use crate::error::{AgendoError, AgendoResult};

/// The value at a subscribed path after a change. `value` is `None` when
/// nothing is stored there.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub path: String,
    pub value: Option<Value>,
}

impl Snapshot {
    pub fn exists(&self) -> bool {
        self.value.is_some()
    }

    pub fn parse<T: DeserializeOwned>(&self) -> AgendoResult<Option<T>> {
        self.value
            .clone()
            .map(|v| from_value(&self.path, v))
            .transpose()
    }
}

/// Callback invoked for every snapshot delivered to a subscription.
pub type Listener = Arc<dyn Fn(Snapshot) + Send + Sync>;

/// Multi-path update: path → new value, `Value::Null` deletes.
pub type Patch = BTreeMap<String, Value>;

/// Handle to a live subscription. Detaches on [`Subscription::unsubscribe`]
/// or when dropped.
pub struct Subscription {
    path: String,
    detach: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Subscription {
    pub fn new(path: impl Into<String>, detach: impl FnOnce() + Send + Sync + 'static) -> Self {
        Self {
            path: path.into(),
            detach: Some(Box::new(detach)),
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn unsubscribe(mut self) {
        if let Some(detach) = self.detach.take() {
            detach();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(detach) = self.detach.take() {
            detach();
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("path", &self.path)
            .field("attached", &self.detach.is_some())
            .finish()
    }
}

pub trait Store: Send + Sync {
    /// Fetch the value at `path`, or `None` if absent.
    fn read(&self, path: &str) -> impl Future<Output = AgendoResult<Option<Value>>> + Send;

    /// Overwrite the value at `path`. `Value::Null` deletes it.
    fn write(&self, path: &str, value: Value) -> impl Future<Output = AgendoResult<()>> + Send;

    /// Apply every entry of `updates` atomically: all or nothing.
    fn patch(&self, updates: Patch) -> impl Future<Output = AgendoResult<()>> + Send;

    /// Generate a unique child key under `path`.
    fn generate_key(&self, path: &str) -> AgendoResult<String>;

    /// Attach `listener` to `path`. The listener receives the current
    /// value immediately and again after every change at, above or
    /// below `path`.
    fn subscribe(
        &self,
        path: &str,
        listener: Listener,
    ) -> impl Future<Output = AgendoResult<Subscription>> + Send;
}

pub fn to_value<T: Serialize>(value: &T) -> AgendoResult<Value> {
    serde_json::to_value(value).map_err(|e| AgendoError::Internal(format!("serialize: {e}")))
}

fn from_value<T: DeserializeOwned>(path: &str, value: Value) -> AgendoResult<T> {
    serde_json::from_value(value)
        .map_err(|e| AgendoError::Internal(format!("malformed record at {path}: {e}")))
}

/// Read and deserialize the record at `path`.
pub async fn read_as<S: Store, T: DeserializeOwned>(
    store: &S,
    path: &str,
) -> AgendoResult<Option<T>> {
    match store.read(path).await? {
        Some(value) => from_value(path, value).map(Some),
        None => Ok(None),
    }
}

/// Serialize `value` and overwrite `path` with it.
pub async fn write_as<S: Store, T: Serialize>(store: &S, path: &str, value: &T) -> AgendoResult<()> {
    let value = to_value(value)?;
    store.write(path, value).await
}

/// Read every child of the collection node at `path`, in key order.
pub async fn read_children<S: Store, T: DeserializeOwned>(
    store: &S,
    path: &str,
) -> AgendoResult<Vec<(String, T)>> {
    let Some(value) = store.read(path).await? else {
        return Ok(Vec::new());
    };
    let Value::Object(children) = value else {
        return Err(AgendoError::Internal(format!(
            "expected a collection at {path}"
        )));
    };
    children
        .into_iter()
        .map(|(key, child)| {
            let child_path = format!("{path}/{key}");
            from_value(&child_path, child).map(|record| (key, record))
        })
        .collect()
}

/// Like [`read_children`], but a child that does not deserialize is
/// logged and left out instead of failing the whole collection.
pub async fn read_children_lenient<S: Store, T: DeserializeOwned>(
    store: &S,
    path: &str,
) -> AgendoResult<Vec<(String, T)>> {
    let Some(value) = store.read(path).await? else {
        return Ok(Vec::new());
    };
    let Value::Object(children) = value else {
        return Err(AgendoError::Internal(format!(
            "expected a collection at {path}"
        )));
    };
    Ok(children
        .into_iter()
        .filter_map(|(key, child)| {
            let child_path = format!("{path}/{key}");
            match from_value(&child_path, child) {
                Ok(record) => Some((key, record)),
                Err(e) => {
                    warn!(path = %child_path, error = %e, "skipping malformed record");
                    None
                }
            }
        })
        .collect())
}

/// Logical paths of the Agendo tree.
pub mod paths {
    pub const USERS: &str = "users";
    pub const BUSINESSES: &str = "businesses";

    pub fn user(uid: &str) -> String {
        format!("{USERS}/{uid}")
    }

    pub fn business(business_id: &str) -> String {
        format!("{BUSINESSES}/{business_id}")
    }

    pub fn license(business_id: &str) -> String {
        format!("{BUSINESSES}/{business_id}/license")
    }

    pub fn services(business_id: &str) -> String {
        format!("{BUSINESSES}/{business_id}/services")
    }

    pub fn service(business_id: &str, service_id: &str) -> String {
        format!("{BUSINESSES}/{business_id}/services/{service_id}")
    }

    pub fn clients(business_id: &str) -> String {
        format!("{BUSINESSES}/{business_id}/clients")
    }

    pub fn client(business_id: &str, client_id: &str) -> String {
        format!("{BUSINESSES}/{business_id}/clients/{client_id}")
    }

    pub fn appointments(business_id: &str) -> String {
        format!("{BUSINESSES}/{business_id}/appointments")
    }

    pub fn appointment(business_id: &str, appointment_id: &str) -> String {
        format!("{BUSINESSES}/{business_id}/appointments/{appointment_id}")
    }

    pub fn records(business_id: &str) -> String {
        format!("{BUSINESSES}/{business_id}/digitalRecords")
    }

    pub fn record(business_id: &str, record_id: &str) -> String {
        format!("{BUSINESSES}/{business_id}/digitalRecords/{record_id}")
    }
}
