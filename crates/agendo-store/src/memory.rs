//! In-memory implementation of [`Store`].
//!
//! Every mutation bumps a revision counter while the tree lock is held
//! and captures the snapshots owed to affected subscriptions. Listeners
//! are called after the lock is released, so a listener may itself use
//! the store. A subscription never receives a snapshot older than one it
//! has already seen.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock, Weak};

use agendo_core::error::AgendoResult;
use agendo_core::store::{Listener, Patch, Snapshot, Store, Subscription};
use serde_json::{Map, Value};
use tracing::{debug, trace};
use uuid::Uuid;

use crate::config::StoreConfig;
use crate::error::StoreError;
use crate::tree;

struct Registration {
    path: String,
    segments: Vec<String>,
    listener: Listener,
    delivered: AtomicU64,
}

impl Registration {
    fn deliver(&self, revision: u64, value: Option<Value>) {
        // Skip snapshots that lost a race with a newer one.
        if self.delivered.fetch_max(revision, Ordering::SeqCst) >= revision {
            return;
        }
        (self.listener)(Snapshot {
            path: self.path.clone(),
            value,
        });
    }
}

struct Tree {
    root: Value,
    /// Starts at 1 so the initial snapshot of a fresh store is newer
    /// than a registration's zero watermark.
    revision: u64,
}

struct Inner {
    config: StoreConfig,
    available: AtomicBool,
    tree: RwLock<Tree>,
    registrations: Mutex<BTreeMap<u64, Arc<Registration>>>,
    next_registration: AtomicU64,
}

/// Shared handle to an in-memory document tree. Clones see the same data.
#[derive(Clone)]
pub struct MemoryStore {
    inner: Arc<Inner>,
}

impl fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryStore")
            .field("namespace", &self.inner.config.namespace)
            .field("available", &self.inner.available.load(Ordering::SeqCst))
            .finish()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(StoreConfig::default())
    }
}

impl MemoryStore {
    pub fn new(config: StoreConfig) -> Self {
        let available = config.available;
        Self {
            inner: Arc::new(Inner {
                config,
                available: AtomicBool::new(available),
                tree: RwLock::new(Tree {
                    root: Value::Object(Map::new()),
                    revision: 1,
                }),
                registrations: Mutex::new(BTreeMap::new()),
                next_registration: AtomicU64::new(1),
            }),
        }
    }

    /// Simulate the backend going away (`false`) or coming back (`true`).
    pub fn set_available(&self, available: bool) {
        self.inner.available.store(available, Ordering::SeqCst);
    }

    /// Copy of the whole tree.
    pub fn dump(&self) -> Value {
        self.tree_read().root.clone()
    }

    /// Number of attached subscriptions.
    pub fn subscription_count(&self) -> usize {
        self.registrations().len()
    }

    fn ensure_available(&self) -> Result<(), StoreError> {
        if self.inner.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StoreError::Unavailable {
                namespace: self.inner.config.namespace.clone(),
            })
        }
    }

    fn tree_read(&self) -> std::sync::RwLockReadGuard<'_, Tree> {
        self.inner.tree.read().unwrap_or_else(|e| e.into_inner())
    }

    fn tree_write(&self) -> std::sync::RwLockWriteGuard<'_, Tree> {
        self.inner.tree.write().unwrap_or_else(|e| e.into_inner())
    }

    fn registrations(&self) -> std::sync::MutexGuard<'_, BTreeMap<u64, Arc<Registration>>> {
        self.inner
            .registrations
            .lock()
            .unwrap_or_else(|e| e.into_inner())
    }

    /// Apply `updates` in one critical section and notify listeners.
    fn apply(&self, updates: Vec<(Vec<String>, Value)>) {
        let (revision, pending) = {
            let mut state = self.tree_write();
            for (segs, value) in &updates {
                tree::set(&mut state.root, segs, value.clone());
            }
            state.revision += 1;

            let registrations = self.registrations();
            let pending: Vec<(Arc<Registration>, Option<Value>)> = registrations
                .values()
                .filter(|reg| {
                    updates
                        .iter()
                        .any(|(segs, _)| tree::related(&reg.segments, segs))
                })
                .map(|reg| {
                    let value = tree::get(&state.root, &reg.segments).cloned();
                    (reg.clone(), value)
                })
                .collect();
            (state.revision, pending)
        };

        trace!(
            namespace = %self.inner.config.namespace,
            revision,
            paths = updates.len(),
            notified = pending.len(),
            "Applied update"
        );

        for (reg, value) in pending {
            reg.deliver(revision, value);
        }
    }
}

impl Store for MemoryStore {
    async fn read(&self, path: &str) -> AgendoResult<Option<Value>> {
        self.ensure_available()?;
        let segs = tree::segments(path)?;
        Ok(tree::get(&self.tree_read().root, &segs).cloned())
    }

    async fn write(&self, path: &str, value: Value) -> AgendoResult<()> {
        self.ensure_available()?;
        let segs = tree::segments(path)?;
        self.apply(vec![(segs, value)]);
        Ok(())
    }

    async fn patch(&self, updates: Patch) -> AgendoResult<()> {
        self.ensure_available()?;
        // Validate every path before touching the tree.
        let updates = updates
            .into_iter()
            .map(|(path, value)| tree::segments(&path).map(|segs| (segs, value)))
            .collect::<Result<Vec<_>, _>>()?;
        if updates.is_empty() {
            return Ok(());
        }
        self.apply(updates);
        Ok(())
    }

    fn generate_key(&self, path: &str) -> AgendoResult<String> {
        tree::segments(path)?;
        Ok(Uuid::new_v4().simple().to_string())
    }

    async fn subscribe(&self, path: &str, listener: Listener) -> AgendoResult<Subscription> {
        self.ensure_available()?;
        let segments = tree::segments(path)?;
        let id = self.inner.next_registration.fetch_add(1, Ordering::SeqCst);
        let registration = Arc::new(Registration {
            path: path.to_string(),
            segments,
            listener,
            delivered: AtomicU64::new(0),
        });
        self.registrations().insert(id, registration.clone());
        debug!(namespace = %self.inner.config.namespace, path, id, "Subscription attached");

        let (revision, value) = {
            let state = self.tree_read();
            (
                state.revision,
                tree::get(&state.root, &registration.segments).cloned(),
            )
        };
        registration.deliver(revision, value);

        let weak: Weak<Inner> = Arc::downgrade(&self.inner);
        let path_owned = path.to_string();
        Ok(Subscription::new(path, move || {
            if let Some(inner) = weak.upgrade() {
                let removed = inner
                    .registrations
                    .lock()
                    .unwrap_or_else(|e| e.into_inner())
                    .remove(&id);
                if removed.is_some() {
                    debug!(path = %path_owned, id, "Subscription detached");
                }
            }
        }))
    }
}
