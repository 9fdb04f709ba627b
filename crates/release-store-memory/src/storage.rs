use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use papaya::HashMap as PapayaHashMap;
use release_core::{ObjectKey, ObjectMeta};
use release_storage::{IndexRegistry, StorageError, StoredObject};
use serde_json::Value;
use tokio::sync::{Mutex, RwLock};

pub type StorageKey = String; // Format: "Kind/namespace/name"

/// `(kind, field, value)` entry of a field index.
pub(crate) type IndexEntry = (String, String, String);

pub(crate) fn make_storage_key(kind: &str, key: &ObjectKey) -> StorageKey {
    format!("{kind}/{}/{}", key.namespace, key.name)
}

/// In-memory record store using papaya lock-free HashMap.
///
/// This store provides:
/// - Lock-free concurrent reads via papaya::HashMap
/// - Writes serialized on a single mutex, so create conflicts and
///   resource-version checks are exact
/// - Field indexes declared through an [`IndexRegistry`]
/// - Generation tracking: only spec changes bump `metadata.generation`
#[derive(Debug)]
pub struct MemoryStore {
    /// Main storage using papaya for lock-free concurrent access
    pub(crate) data: Arc<PapayaHashMap<StorageKey, StoredObject>>,
    /// Field index contents: entry -> keys of matching records
    pub(crate) index: RwLock<HashMap<IndexEntry, BTreeSet<ObjectKey>>>,
    /// Declared indexes, frozen at construction
    pub(crate) indexes: Arc<IndexRegistry>,
    /// Atomic counter for generating resource versions
    pub(crate) version_counter: AtomicU64,
    /// Serializes writers
    pub(crate) write_lock: Mutex<()>,
}

impl MemoryStore {
    /// Creates a new in-memory store without field indexes.
    pub fn new() -> Self {
        Self::with_indexes(IndexRegistry::empty())
    }

    /// Creates a new in-memory store serving the given field indexes.
    pub fn with_indexes(indexes: Arc<IndexRegistry>) -> Self {
        Self {
            data: Arc::new(PapayaHashMap::new()),
            index: RwLock::new(HashMap::new()),
            indexes,
            version_counter: AtomicU64::new(1),
            write_lock: Mutex::new(()),
        }
    }

    pub fn indexes(&self) -> &Arc<IndexRegistry> {
        &self.indexes
    }

    /// Generates the next resource version.
    pub(crate) fn next_version(&self) -> String {
        self.version_counter
            .fetch_add(1, Ordering::SeqCst)
            .to_string()
    }

    pub(crate) fn get_raw(&self, kind: &str, key: &ObjectKey) -> Option<StoredObject> {
        let guard = self.data.pin();
        guard.get(&make_storage_key(kind, key)).cloned()
    }

    pub fn count_by_kind(&self, kind: &str) -> usize {
        let guard = self.data.pin();
        guard.iter().filter(|(_, stored)| stored.kind == kind).count()
    }

    pub(crate) async fn index_insert(&self, kind: &str, stored: &StoredObject) {
        let values = self.indexes.index_values(kind, &stored.object);
        if values.is_empty() {
            return;
        }
        let mut index = self.index.write().await;
        for (field, value) in values {
            index
                .entry((kind.to_string(), field, value))
                .or_default()
                .insert(stored.key.clone());
        }
    }

    pub(crate) async fn index_remove(&self, kind: &str, stored: &StoredObject) {
        let values = self.indexes.index_values(kind, &stored.object);
        if values.is_empty() {
            return;
        }
        let mut index = self.index.write().await;
        for (field, value) in values {
            let entry = (kind.to_string(), field, value);
            if let Some(keys) = index.get_mut(&entry) {
                keys.remove(&stored.key);
                if keys.is_empty() {
                    index.remove(&entry);
                }
            }
        }
    }

    /// Keys indexed under `field == value`.
    pub(crate) async fn index_lookup(
        &self,
        kind: &str,
        field: &str,
        value: &str,
    ) -> Result<Vec<ObjectKey>, StorageError> {
        if !self.indexes.contains(kind, field) {
            return Err(StorageError::index_not_found(kind, field));
        }
        let index = self.index.read().await;
        let entry = (kind.to_string(), field.to_string(), value.to_string());
        Ok(index
            .get(&entry)
            .map(|keys| keys.iter().cloned().collect())
            .unwrap_or_default())
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Writes `meta` back into the `metadata` field of `record`.
pub(crate) fn set_metadata(record: &mut Value, meta: &ObjectMeta) -> Result<(), StorageError> {
    let meta_value =
        serde_json::to_value(meta).map_err(|e| StorageError::internal(e.to_string()))?;
    let obj = record
        .as_object_mut()
        .ok_or_else(|| StorageError::invalid_object("Record must be a JSON object"))?;
    obj.insert("metadata".to_string(), meta_value);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_make_storage_key() {
        let key = ObjectKey::new("team-a", "r1");
        assert_eq!(make_storage_key("Release", &key), "Release/team-a/r1");
    }

    #[test]
    fn test_set_metadata_rejects_non_object() {
        let mut record = Value::Null;
        let meta = ObjectMeta::new("ns", "n");
        assert!(set_metadata(&mut record, &meta).is_err());
    }

    #[tokio::test]
    async fn test_index_lookup_requires_declared_index() {
        let store = MemoryStore::new();
        let err = store
            .index_lookup("ReleaseLink", "spec.target", "team-a")
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::IndexNotFound { .. }));
    }
}
