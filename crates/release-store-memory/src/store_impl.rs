//! Implementation of the ObjectStore trait for MemoryStore.

use async_trait::async_trait;
use release_core::resources::now_rfc3339;
use release_core::{ObjectKey, generate_uid, validate_name};
use release_storage::{
    ListParams, ObjectStore, StorageError, StoredObject, object_kind, object_meta,
};
use serde_json::Value;
use tracing::trace;

use crate::storage::{MemoryStore, make_storage_key, set_metadata};

/// Which part of an existing record a write replaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriteTarget {
    Spec,
    Status,
}

/// Rejects records whose `kind` disagrees with the requested kind.
fn check_kind(kind: &str, object: &Value) -> Result<(), StorageError> {
    let found = object_kind(object)?;
    if found != kind {
        return Err(StorageError::invalid_object(format!(
            "Kind mismatch: expected {kind}, found {found}"
        )));
    }
    Ok(())
}

impl MemoryStore {
    async fn write(
        &self,
        kind: &str,
        object: &Value,
        target: WriteTarget,
    ) -> Result<StoredObject, StorageError> {
        check_kind(kind, object)?;
        let incoming = object_meta(object)?;
        let key = incoming.key();

        let _guard = self.write_lock.lock().await;

        let existing = self
            .get_raw(kind, &key)
            .ok_or_else(|| StorageError::not_found(kind, &key))?;

        if let Some(expected) = &incoming.resource_version {
            if expected != &existing.resource_version {
                return Err(StorageError::version_conflict(
                    expected.clone(),
                    existing.resource_version.clone(),
                ));
            }
        }

        let mut record = existing.object.clone();
        let mut meta = object_meta(&record)?;
        let mut generation = existing.generation;

        match target {
            WriteTarget::Spec => {
                let new_spec = object.get("spec").cloned().unwrap_or(Value::Null);
                if record.get("spec") != Some(&new_spec) {
                    generation += 1;
                }
                if let Some(obj) = record.as_object_mut() {
                    obj.insert("spec".to_string(), new_spec);
                }
                meta.labels = incoming.labels;
            }
            WriteTarget::Status => {
                if let Some(obj) = record.as_object_mut() {
                    match object.get("status") {
                        Some(status) => {
                            obj.insert("status".to_string(), status.clone());
                        }
                        None => {
                            obj.remove("status");
                        }
                    }
                }
            }
        }

        let resource_version = self.next_version();
        meta.generation = Some(generation);
        meta.resource_version = Some(resource_version.clone());
        set_metadata(&mut record, &meta)?;

        let stored = StoredObject {
            kind: kind.to_string(),
            key: key.clone(),
            uid: existing.uid.clone(),
            generation,
            previous_generation: Some(existing.generation),
            resource_version,
            object: record,
        };

        self.index_remove(kind, &existing).await;
        self.index_insert(kind, &stored).await;
        {
            let guard = self.data.pin();
            guard.insert(make_storage_key(kind, &key), stored.clone());
        }

        trace!(kind, key = %key, generation, ?target, "Record written");
        Ok(stored)
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn create(&self, kind: &str, object: &Value) -> Result<StoredObject, StorageError> {
        check_kind(kind, object)?;
        let mut meta = object_meta(object)?;
        validate_name(&meta.name).map_err(|e| StorageError::invalid_object(e.to_string()))?;
        let key = meta.key();
        let storage_key = make_storage_key(kind, &key);

        let _guard = self.write_lock.lock().await;

        // Use block scope to ensure the pin guard is dropped before await
        {
            let guard = self.data.pin();
            if guard.contains_key(&storage_key) {
                return Err(StorageError::already_exists(kind, &key));
            }
        }

        let uid = generate_uid();
        let resource_version = self.next_version();
        meta.uid = Some(uid.clone());
        meta.generation = Some(1);
        meta.resource_version = Some(resource_version.clone());
        meta.creation_timestamp = Some(now_rfc3339());

        // Status is owned by the status endpoint; creation never sets it.
        let mut record = object.clone();
        if let Some(obj) = record.as_object_mut() {
            obj.remove("status");
        }
        set_metadata(&mut record, &meta)?;

        let stored = StoredObject {
            kind: kind.to_string(),
            key: key.clone(),
            uid,
            generation: 1,
            previous_generation: None,
            resource_version,
            object: record,
        };

        self.index_insert(kind, &stored).await;
        {
            let guard = self.data.pin();
            guard.insert(storage_key, stored.clone());
        }

        trace!(kind, key = %key, "Record created");
        Ok(stored)
    }

    async fn get(&self, kind: &str, key: &ObjectKey) -> Result<Option<StoredObject>, StorageError> {
        Ok(self.get_raw(kind, key))
    }

    async fn list(
        &self,
        kind: &str,
        params: &ListParams,
    ) -> Result<Vec<StoredObject>, StorageError> {
        let candidates: Vec<StoredObject> = match &params.field_selector {
            Some(selector) => {
                let keys = self
                    .index_lookup(kind, &selector.field, &selector.value)
                    .await?;
                let guard = self.data.pin();
                keys.iter()
                    .filter_map(|key| guard.get(&make_storage_key(kind, key)).cloned())
                    .collect()
            }
            None => {
                let guard = self.data.pin();
                guard
                    .iter()
                    .filter(|(_, stored)| stored.kind == kind)
                    .map(|(_, stored)| stored.clone())
                    .collect()
            }
        };

        let mut matching = Vec::with_capacity(candidates.len());
        for stored in candidates {
            let meta = object_meta(&stored.object)?;
            if params.matches_meta(&meta) {
                matching.push(stored);
            }
        }
        matching.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(matching)
    }

    async fn update(&self, kind: &str, object: &Value) -> Result<StoredObject, StorageError> {
        self.write(kind, object, WriteTarget::Spec).await
    }

    async fn update_status(
        &self,
        kind: &str,
        object: &Value,
    ) -> Result<StoredObject, StorageError> {
        self.write(kind, object, WriteTarget::Status).await
    }

    async fn delete(&self, kind: &str, key: &ObjectKey) -> Result<StoredObject, StorageError> {
        let _guard = self.write_lock.lock().await;

        let removed = {
            let guard = self.data.pin();
            guard.remove(&make_storage_key(kind, key)).cloned()
        };
        let removed = removed.ok_or_else(|| StorageError::not_found(kind, key))?;
        self.index_remove(kind, &removed).await;

        trace!(kind, key = %key, "Record deleted");
        Ok(removed)
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use release_core::{Release, ReleaseLink, Resource};
    use release_storage::{IndexRegistry, TypedStore};
    use serde_json::json;

    fn indexed_store() -> MemoryStore {
        MemoryStore::with_indexes(
            IndexRegistry::builder()
                .index_field("ReleaseLink", "spec.target")
                .build(),
        )
    }

    fn release_json(namespace: &str, name: &str, link: &str) -> Value {
        Release::new(namespace, name, link).to_value().unwrap()
    }

    #[tokio::test]
    async fn test_create_assigns_store_metadata() {
        let store = MemoryStore::new();
        let created = store
            .create("Release", &release_json("team-a", "r1", "link1"))
            .await
            .unwrap();

        assert_eq!(created.generation, 1);
        assert!(created.previous_generation.is_none());
        assert!(!created.uid.is_empty());
        assert_eq!(created.object["metadata"]["generation"], 1);
        assert_eq!(
            created.object["metadata"]["resourceVersion"],
            created.resource_version.as_str()
        );
        assert!(created.object["metadata"]["creationTimestamp"].is_string());

        let read = store
            .get("Release", &ObjectKey::new("team-a", "r1"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(read.uid, created.uid);
    }

    #[tokio::test]
    async fn test_create_conflict() {
        let store = MemoryStore::new();
        let object = release_json("team-a", "r1", "link1");
        store.create("Release", &object).await.unwrap();
        let err = store.create("Release", &object).await.unwrap_err();
        assert!(err.is_already_exists());
        assert_eq!(store.count_by_kind("Release"), 1);
    }

    #[tokio::test]
    async fn test_create_validates_kind_and_name() {
        let store = MemoryStore::new();
        let err = store
            .create("ReleaseLink", &release_json("team-a", "r1", "link1"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Kind mismatch"));

        let err = store
            .create("Release", &release_json("team-a", "Bad_Name", "link1"))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::InvalidObject { .. }));
    }

    #[tokio::test]
    async fn test_create_drops_status() {
        let store = MemoryStore::new();
        let mut release = Release::new("team-a", "r1", "link1");
        release.status.set_error_condition("preset", 1);
        let created = store.create_resource(&release).await.unwrap();
        assert!(created.status.conditions.is_empty());
    }

    #[tokio::test]
    async fn test_update_bumps_generation_only_on_spec_change() {
        let store = MemoryStore::new();
        let mut release: Release = store
            .create_resource(&Release::new("team-a", "r1", "link1"))
            .await
            .unwrap();

        // status-only write keeps the generation
        release.status.set_error_condition("boom", 1);
        let stored = store
            .update_status("Release", &release.to_value().unwrap())
            .await
            .unwrap();
        assert_eq!(stored.generation, 1);
        assert_eq!(stored.previous_generation, Some(1));
        assert!(!stored.generation_changed());

        // same spec through update keeps the generation too
        let mut release: Release = stored.into_typed().unwrap();
        let stored = store
            .update("Release", &release.to_value().unwrap())
            .await
            .unwrap();
        assert_eq!(stored.generation, 1);

        // spec change bumps it and keeps the status
        release = stored.into_typed().unwrap();
        release.spec.release_link = "link2".into();
        let stored = store
            .update("Release", &release.to_value().unwrap())
            .await
            .unwrap();
        assert_eq!(stored.generation, 2);
        assert!(stored.generation_changed());
        let release: Release = stored.into_typed().unwrap();
        assert!(release.status.has_error());
    }

    #[tokio::test]
    async fn test_update_status_ignores_spec() {
        let store = MemoryStore::new();
        let mut release: Release = store
            .create_resource(&Release::new("team-a", "r1", "link1"))
            .await
            .unwrap();
        release.spec.release_link = "other".into();
        let updated: Release = store.update_resource_status(&release).await.unwrap();
        assert_eq!(updated.spec.release_link, "link1");
    }

    #[tokio::test]
    async fn test_stale_resource_version_conflicts() {
        let store = MemoryStore::new();
        let release: Release = store
            .create_resource(&Release::new("team-a", "r1", "link1"))
            .await
            .unwrap();

        let mut first = release.clone();
        first.status.set_error_condition("first", 1);
        store.update_resource_status(&first).await.unwrap();

        let mut stale = release;
        stale.status.set_error_condition("stale", 1);
        let err = store.update_resource_status(&stale).await.unwrap_err();
        assert!(err.is_version_conflict());
    }

    #[tokio::test]
    async fn test_update_missing_record() {
        let store = MemoryStore::new();
        let err = store
            .update("Release", &release_json("team-a", "ghost", "link1"))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_list_by_field_index() {
        let store = indexed_store();
        for (ns, name, target, app) in [
            ("team-b", "link2", "team-a", "app1"),
            ("team-b", "link3", "team-c", "app1"),
            ("team-b", "link4", "team-a", "app2"),
            ("team-d", "link5", "team-a", "app1"),
        ] {
            store
                .create_resource(&ReleaseLink::new(ns, name, target, app))
                .await
                .unwrap();
        }

        let params = ListParams::new()
            .in_namespace("team-b")
            .matching_field("spec.target", "team-a");
        let links: Vec<ReleaseLink> = store.list_resources(&params).await.unwrap();
        let names: Vec<_> = links.iter().map(|l| l.metadata.name.as_str()).collect();
        assert_eq!(names, vec!["link2", "link4"]);
    }

    #[tokio::test]
    async fn test_index_follows_updates_and_deletes() {
        let store = indexed_store();
        let mut link: ReleaseLink = store
            .create_resource(&ReleaseLink::new("team-b", "link2", "team-a", "app1"))
            .await
            .unwrap();

        link.spec.target = "team-z".into();
        store.update_resource(&link).await.unwrap();

        let by_old = ListParams::new().matching_field("spec.target", "team-a");
        assert!(store.list("ReleaseLink", &by_old).await.unwrap().is_empty());
        let by_new = ListParams::new().matching_field("spec.target", "team-z");
        assert_eq!(store.list("ReleaseLink", &by_new).await.unwrap().len(), 1);

        store
            .delete("ReleaseLink", &ObjectKey::new("team-b", "link2"))
            .await
            .unwrap();
        assert!(store.list("ReleaseLink", &by_new).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_unindexed_field_fails() {
        let store = indexed_store();
        let params = ListParams::new().matching_field("spec.application", "app1");
        let err = store.list("ReleaseLink", &params).await.unwrap_err();
        assert!(matches!(err, StorageError::IndexNotFound { .. }));
    }

    #[tokio::test]
    async fn test_list_without_selector_filters_kind_and_labels() {
        let store = MemoryStore::new();
        let mut labelled = Release::new("team-a", "r1", "link1");
        labelled.metadata.labels.insert("app".into(), "app1".into());
        store.create_resource(&labelled).await.unwrap();
        store
            .create_resource(&Release::new("team-a", "r2", "link1"))
            .await
            .unwrap();
        store
            .create("ReleaseLink", &json!({
                "kind": "ReleaseLink",
                "metadata": {"namespace": "team-a", "name": "link1"},
                "spec": {"target": "team-b", "application": "app1"}
            }))
            .await
            .unwrap();

        let all = store.list("Release", &ListParams::new()).await.unwrap();
        assert_eq!(all.len(), 2);
        let labelled = store
            .list("Release", &ListParams::new().matching_label("app", "app1"))
            .await
            .unwrap();
        assert_eq!(labelled.len(), 1);
        assert_eq!(labelled[0].key.name, "r1");
    }

    #[tokio::test]
    async fn test_delete_missing_record() {
        let store = MemoryStore::new();
        let err = store
            .delete("Release", &ObjectKey::new("team-a", "r1"))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }
}
