//! Storage types for the record store abstraction layer.

use std::collections::BTreeMap;
use std::fmt;

use release_core::{ObjectKey, ObjectMeta, Resource};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::StorageError;

/// A record as held by a store backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredObject {
    /// The record kind (e.g., "Release").
    pub kind: String,
    /// `namespace/name` identity.
    pub key: ObjectKey,
    /// Store-assigned unique id.
    pub uid: String,
    /// Spec generation after this write.
    pub generation: i64,
    /// Generation before this write; `None` for creations.
    pub previous_generation: Option<i64>,
    /// Opaque version, changes on every write.
    pub resource_version: String,
    /// The full record as JSON, metadata included.
    pub object: Value,
}

impl StoredObject {
    /// Deserializes the record into its typed form.
    pub fn into_typed<R: Resource>(self) -> Result<R, StorageError> {
        R::from_value(self.object).map_err(StorageError::from)
    }

    /// Whether this write changed the spec generation.
    #[must_use]
    pub fn generation_changed(&self) -> bool {
        self.previous_generation != Some(self.generation)
    }
}

/// Equality selector on a single indexed field, e.g. `spec.target=team-a`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSelector {
    pub field: String,
    pub value: String,
}

impl FieldSelector {
    pub fn new(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            value: value.into(),
        }
    }
}

impl fmt::Display for FieldSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.field, self.value)
    }
}

/// Parameters for a list call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListParams {
    /// Restrict to one namespace; `None` lists across all namespaces.
    pub namespace: Option<String>,
    /// Field selector served by a registered field index.
    pub field_selector: Option<FieldSelector>,
    /// Every label must match.
    pub labels: BTreeMap<String, String>,
}

impl ListParams {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn in_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    #[must_use]
    pub fn matching_field(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.field_selector = Some(FieldSelector::new(field, value));
        self
    }

    #[must_use]
    pub fn matching_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    /// Checks namespace and labels; field selectors are the backend's job.
    #[must_use]
    pub fn matches_meta(&self, meta: &ObjectMeta) -> bool {
        if let Some(ns) = &self.namespace {
            if &meta.namespace != ns {
                return false;
            }
        }
        self.labels
            .iter()
            .all(|(k, v)| meta.labels.get(k) == Some(v))
    }
}

/// Extracts the `kind` discriminator of a raw record.
pub fn object_kind(object: &Value) -> Result<&str, StorageError> {
    object
        .get("kind")
        .and_then(Value::as_str)
        .ok_or_else(|| StorageError::invalid_object("Missing kind field"))
}

/// Extracts and validates the metadata of a raw record.
pub fn object_meta(object: &Value) -> Result<ObjectMeta, StorageError> {
    let metadata = object
        .get("metadata")
        .cloned()
        .ok_or_else(|| StorageError::invalid_object("Missing metadata field"))?;
    let meta: ObjectMeta = serde_json::from_value(metadata)
        .map_err(|e| StorageError::invalid_object(format!("Invalid metadata: {e}")))?;
    if meta.namespace.is_empty() {
        return Err(StorageError::invalid_object("metadata.namespace must be set"));
    }
    if meta.name.is_empty() {
        return Err(StorageError::invalid_object("metadata.name must be set"));
    }
    Ok(meta)
}
