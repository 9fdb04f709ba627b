//! Field indexes backing field-selector lists.
//!
//! Indexes are declared once, before the store starts serving the controller:
//!
//! ```ignore
//! let indexes = IndexRegistry::builder()
//!     .index_field("ReleaseLink", "spec.target")
//!     .build();
//! let store = MemoryStore::with_indexes(indexes);
//! ```
//!
//! After [`IndexRegistryBuilder::build`] the registry is frozen behind an `Arc`
//! and only read. Backends call [`IndexRegistry::index_values`] on every write
//! to keep their lookup tables current.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;

/// Extracts the index values of a raw record.
pub type IndexFn = Arc<dyn Fn(&Value) -> Vec<String> + Send + Sync>;

/// A single `(kind, field)` index.
#[derive(Clone)]
pub struct FieldIndex {
    kind: String,
    field: String,
    extract: IndexFn,
}

impl FieldIndex {
    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn values(&self, object: &Value) -> Vec<String> {
        (self.extract)(object)
    }
}

impl fmt::Debug for FieldIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldIndex")
            .field("kind", &self.kind)
            .field("field", &self.field)
            .finish_non_exhaustive()
    }
}

/// Immutable set of field indexes.
#[derive(Debug, Default)]
pub struct IndexRegistry {
    indexes: HashMap<(String, String), FieldIndex>,
}

impl IndexRegistry {
    pub fn builder() -> IndexRegistryBuilder {
        IndexRegistryBuilder::default()
    }

    /// A registry with no indexes.
    pub fn empty() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn get(&self, kind: &str, field: &str) -> Option<&FieldIndex> {
        self.indexes.get(&(kind.to_string(), field.to_string()))
    }

    pub fn contains(&self, kind: &str, field: &str) -> bool {
        self.get(kind, field).is_some()
    }

    /// All indexes declared for `kind`.
    pub fn for_kind<'a>(&'a self, kind: &'a str) -> impl Iterator<Item = &'a FieldIndex> + 'a {
        self.indexes.values().filter(move |idx| idx.kind == kind)
    }

    /// `(field, value)` pairs under which `object` must be indexed.
    pub fn index_values(&self, kind: &str, object: &Value) -> Vec<(String, String)> {
        self.for_kind(kind)
            .flat_map(|idx| {
                idx.values(object)
                    .into_iter()
                    .map(|v| (idx.field.clone(), v))
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.indexes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indexes.is_empty()
    }
}

/// Collects index declarations; consumed by [`IndexRegistryBuilder::build`].
#[derive(Default)]
pub struct IndexRegistryBuilder {
    indexes: HashMap<(String, String), FieldIndex>,
}

impl IndexRegistryBuilder {
    /// Indexes the value found at the dotted `field` path of each record.
    ///
    /// String values are indexed as-is, arrays of strings index every element,
    /// anything else is not indexed.
    pub fn index_field(self, kind: impl Into<String>, field: impl Into<String>) -> Self {
        let field = field.into();
        let path = field.clone();
        self.index_with(kind, field, move |object| extract_path(object, &path))
    }

    /// Indexes the values returned by `extract`. A later declaration for the
    /// same `(kind, field)` replaces the earlier one.
    pub fn index_with<F>(mut self, kind: impl Into<String>, field: impl Into<String>, extract: F) -> Self
    where
        F: Fn(&Value) -> Vec<String> + Send + Sync + 'static,
    {
        let index = FieldIndex {
            kind: kind.into(),
            field: field.into(),
            extract: Arc::new(extract),
        };
        self.indexes
            .insert((index.kind.clone(), index.field.clone()), index);
        self
    }

    pub fn build(self) -> Arc<IndexRegistry> {
        Arc::new(IndexRegistry {
            indexes: self.indexes,
        })
    }
}

fn extract_path(object: &Value, path: &str) -> Vec<String> {
    let found = path
        .split('.')
        .try_fold(object, |current, segment| current.get(segment));
    match found {
        Some(Value::String(s)) => vec![s.clone()],
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(String::from)
            .collect(),
        _ => Vec::new(),
    }
}
