//! Key/value store contract.
//!
//! The engine needs three things from persistent storage: an async read
//! that fills in defaults, an async partial write, and a change feed. How
//! the host persists values is its own business.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

use rewind_model::Entries;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::broadcast;

const CHANGE_CHANNEL_CAPACITY: usize = 64;

/// Logical partition of the store. The engine only reads one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageArea {
    Sync,
    #[default]
    Local,
    Managed,
    Session,
}

/// Old and new value of one key. `None` means absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValueChange {
    pub old_value: Option<Value>,
    pub new_value: Option<Value>,
}

/// One change notification: every key touched by a single write.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreChange {
    pub area: StorageArea,
    pub changes: BTreeMap<String, ValueChange>,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("store rejected write: {0}")]
    WriteRejected(String),
}

pub trait SettingsStore: Send + Sync {
    /// Read `keys_with_defaults`, substituting the given default for every
    /// key the store does not hold.
    fn get(
        &self,
        keys_with_defaults: &Entries,
    ) -> impl Future<Output = Result<Entries, StoreError>> + Send;

    fn set(&self, partial: Entries) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// The area `get` and `set` operate on.
    fn area(&self) -> StorageArea;

    /// Subscribe to change notifications for every area.
    fn subscribe(&self) -> broadcast::Receiver<StoreChange>;
}

/// In-process store. Used by hosts without persistence and by tests.
pub struct MemoryStore {
    area: StorageArea,
    entries: Mutex<Entries>,
    changes: broadcast::Sender<StoreChange>,
    fail_reads: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_entries(Entries::new())
    }

    pub fn with_entries(entries: Entries) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            area: StorageArea::default(),
            entries: Mutex::new(entries),
            changes,
            fail_reads: AtomicBool::new(false),
        }
    }

    /// Operate on `area` instead of the default local area.
    pub fn with_area(mut self, area: StorageArea) -> Self {
        self.area = area;
        self
    }

    /// Make subsequent reads fail with [`StoreError::Unavailable`].
    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::Release);
    }

    /// Remove keys, notifying subscribers of each removal.
    pub fn remove(&self, keys: &[&str]) {
        let mut changes = BTreeMap::new();
        {
            let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
            for key in keys {
                if let Some(old) = entries.remove(*key) {
                    changes.insert(
                        key.to_string(),
                        ValueChange {
                            old_value: Some(old),
                            new_value: None,
                        },
                    );
                }
            }
        }
        self.publish(StoreChange {
            area: self.area,
            changes,
        });
    }

    /// Deliver a change notification as-is, for any area.
    pub fn publish(&self, change: StoreChange) {
        if change.changes.is_empty() {
            return;
        }
        // No subscribers is not an error.
        let _ = self.changes.send(change);
    }

    /// Current raw contents.
    pub fn entries(&self) -> Entries {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SettingsStore for MemoryStore {
    async fn get(&self, keys_with_defaults: &Entries) -> Result<Entries, StoreError> {
        if self.fail_reads.load(Ordering::Acquire) {
            return Err(StoreError::Unavailable("reads disabled".to_string()));
        }
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(keys_with_defaults
            .iter()
            .map(|(key, default)| {
                let value = entries.get(key).cloned().unwrap_or_else(|| default.clone());
                (key.clone(), value)
            })
            .collect())
    }

    async fn set(&self, partial: Entries) -> Result<(), StoreError> {
        let mut changes = BTreeMap::new();
        {
            let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
            for (key, value) in partial {
                let old = entries.insert(key.clone(), value.clone());
                if old.as_ref() != Some(&value) {
                    changes.insert(
                        key,
                        ValueChange {
                            old_value: old,
                            new_value: Some(value),
                        },
                    );
                }
            }
        }
        self.publish(StoreChange {
            area: self.area,
            changes,
        });
        Ok(())
    }

    fn area(&self) -> StorageArea {
        self.area
    }

    fn subscribe(&self) -> broadcast::Receiver<StoreChange> {
        self.changes.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn entries(value: Value) -> Entries {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn get_fills_defaults_for_absent_keys() {
        let store = MemoryStore::with_entries(entries(json!({ "enabled": false })));
        let read = store
            .get(&entries(json!({ "enabled": true, "showToast": true })))
            .await
            .unwrap();
        assert_eq!(read["enabled"], json!(false));
        assert_eq!(read["showToast"], json!(true));
    }

    #[tokio::test]
    async fn set_notifies_only_changed_keys() {
        let store = MemoryStore::with_entries(entries(json!({ "enabled": true })));
        let mut rx = store.subscribe();
        store
            .set(entries(json!({ "enabled": true, "toastScale": 1.2 })))
            .await
            .unwrap();

        let change = rx.recv().await.unwrap();
        assert_eq!(change.area, StorageArea::Local);
        assert_eq!(change.changes.len(), 1);
        let scale = &change.changes["toastScale"];
        assert_eq!(scale.old_value, None);
        assert_eq!(scale.new_value, Some(json!(1.2)));
    }

    #[tokio::test]
    async fn failing_reads_report_unavailable() {
        let store = MemoryStore::new();
        store.set_fail_reads(true);
        let err = store.get(&Entries::new()).await.unwrap_err();
        assert!(matches!(err, StoreError::Unavailable(_)));
    }

    #[tokio::test]
    async fn remove_reports_absent_new_value() {
        let store = MemoryStore::with_entries(entries(json!({ "enabled": false })));
        let mut rx = store.subscribe();
        store.remove(&["enabled", "missing"]);
        let change = rx.recv().await.unwrap();
        assert_eq!(change.changes.len(), 1);
        assert_eq!(change.changes["enabled"].new_value, None);
    }
}
