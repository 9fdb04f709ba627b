//! # release-storage
//!
//! Record store abstraction for the release service controller.
//!
//! This crate defines the contract every store backend implements. It does not
//! contain a backend; `release-store-memory` provides one.
//!
//! ## Overview
//!
//! The main trait is [`ObjectStore`], an untyped get/list/create/update API over
//! JSON records addressed by `kind` and [`ObjectKey`](release_core::ObjectKey).
//! [`TypedStore`] layers typed access for [`Resource`](release_core::Resource)
//! kinds on top of any `ObjectStore`.
//!
//! Field-selector lists are served by field indexes registered once at startup
//! through [`IndexRegistry::builder`]. The registry is immutable after `build()`.
//!
//! ## Example
//!
//! ```ignore
//! use release_core::{ObjectKey, Release};
//! use release_storage::{DynStore, TypedStore};
//!
//! async fn load(store: &DynStore) -> Result<Option<Release>, StorageError> {
//!     store.get_resource::<Release>(&ObjectKey::new("team-a", "r1")).await
//! }
//! ```

mod error;
pub mod evented;
pub mod index;
mod traits;
mod types;

pub use error::{ErrorCategory, StorageError};
pub use evented::EventedStore;
pub use index::{FieldIndex, IndexFn, IndexRegistry, IndexRegistryBuilder};
pub use traits::{ObjectStore, TypedStore};
pub use types::{FieldSelector, ListParams, StoredObject, object_kind, object_meta};

/// Type alias for a storage result.
pub type StorageResult<T> = Result<T, StorageError>;

/// Type alias for a shared store trait object.
pub type DynStore = std::sync::Arc<dyn ObjectStore>;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::error::{ErrorCategory, StorageError};
    pub use crate::evented::EventedStore;
    pub use crate::index::{IndexRegistry, IndexRegistryBuilder};
    pub use crate::traits::{ObjectStore, TypedStore};
    pub use crate::types::{FieldSelector, ListParams, StoredObject};
    pub use crate::{DynStore, StorageResult};
}
