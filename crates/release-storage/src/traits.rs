//! Store traits for the record store abstraction layer.

use async_trait::async_trait;
use release_core::{ObjectKey, Resource};
use serde_json::Value;

use crate::error::StorageError;
use crate::types::{ListParams, StoredObject};

/// The contract every record store backend implements.
///
/// Records are JSON objects carrying `kind` and `metadata.{namespace,name}`.
/// The backend owns `metadata.uid`, `metadata.generation`,
/// `metadata.resourceVersion` and `metadata.creationTimestamp`.
///
/// Implementations must be thread-safe (`Send + Sync`). No read-after-write
/// guarantee is assumed by callers.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Creates a new record.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::AlreadyExists` if a record of the same kind and key exists.
    /// Returns `StorageError::InvalidObject` if the record is malformed or its kind
    /// differs from `kind`.
    async fn create(&self, kind: &str, object: &Value) -> Result<StoredObject, StorageError>;

    /// Reads a record by kind and key.
    ///
    /// Returns `None` if the record does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error only for infrastructure issues, not for missing records.
    async fn get(&self, kind: &str, key: &ObjectKey) -> Result<Option<StoredObject>, StorageError>;

    /// Lists records of a kind, ordered by key.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::IndexNotFound` if `params.field_selector` names a
    /// field with no registered index.
    async fn list(&self, kind: &str, params: &ListParams)
    -> Result<Vec<StoredObject>, StorageError>;

    /// Replaces metadata labels and spec of an existing record.
    ///
    /// The stored status is kept. The generation is incremented only when the
    /// spec changes.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the record does not exist.
    /// Returns `StorageError::VersionConflict` if `metadata.resourceVersion` is set
    /// and stale.
    async fn update(&self, kind: &str, object: &Value) -> Result<StoredObject, StorageError>;

    /// Replaces only the status of an existing record. The generation is kept.
    ///
    /// # Errors
    ///
    /// Same as [`ObjectStore::update`].
    async fn update_status(&self, kind: &str, object: &Value)
    -> Result<StoredObject, StorageError>;

    /// Deletes a record and returns its last state.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the record does not exist.
    async fn delete(&self, kind: &str, key: &ObjectKey) -> Result<StoredObject, StorageError>;

    /// Returns the name of this backend for logging/debugging.
    fn backend_name(&self) -> &'static str;
}

/// Typed access to any [`ObjectStore`].
#[async_trait]
pub trait TypedStore: ObjectStore {
    async fn get_resource<R: Resource>(&self, key: &ObjectKey) -> Result<Option<R>, StorageError> {
        match self.get(R::KIND, key).await? {
            Some(stored) => stored.into_typed().map(Some),
            None => Ok(None),
        }
    }

    async fn list_resources<R: Resource>(&self, params: &ListParams) -> Result<Vec<R>, StorageError> {
        self.list(R::KIND, params)
            .await?
            .into_iter()
            .map(StoredObject::into_typed::<R>)
            .collect()
    }

    async fn create_resource<R: Resource>(&self, resource: &R) -> Result<R, StorageError> {
        let value = resource.to_value()?;
        self.create(R::KIND, &value).await?.into_typed()
    }

    async fn update_resource<R: Resource>(&self, resource: &R) -> Result<R, StorageError> {
        let value = resource.to_value()?;
        self.update(R::KIND, &value).await?.into_typed()
    }

    async fn update_resource_status<R: Resource>(&self, resource: &R) -> Result<R, StorageError> {
        let value = resource.to_value()?;
        self.update_status(R::KIND, &value).await?.into_typed()
    }
}

impl<S: ObjectStore + ?Sized> TypedStore for S {}
