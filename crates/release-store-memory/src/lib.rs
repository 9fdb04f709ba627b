//! In-memory record store backend for the release service controller.
//!
//! This crate provides an in-memory implementation of the `ObjectStore` trait
//! from `release-storage`, using papaya lock-free HashMap for reads.
//!
//! # Example
//!
//! ```ignore
//! use release_store_memory::MemoryStore;
//! use release_storage::{IndexRegistry, ObjectStore};
//!
//! let indexes = IndexRegistry::builder()
//!     .index_field("ReleaseLink", "spec.target")
//!     .build();
//! let store = MemoryStore::with_indexes(indexes);
//! let created = store.create("ReleaseLink", &link_json).await?;
//! ```

mod store_impl;
pub mod storage;

// Re-export the ObjectStore trait for convenience
pub use release_storage::{ObjectStore, StorageError, StoredObject};

pub use storage::{MemoryStore, StorageKey};
