//! EventedStore - A store wrapper that emits watch events after writes.
//!
//! This wrapper delegates all operations to an inner store while emitting
//! [`WatchEvent`]s to a broadcaster after successful writes.
//!
//! # Example
//!
//! ```ignore
//! use release_core::events::EventBroadcaster;
//! use release_storage::EventedStore;
//!
//! let broadcaster = EventBroadcaster::new_shared();
//! let store = EventedStore::new(MemoryStore::new(), broadcaster.clone());
//!
//! // After this, a Created event is emitted to the broadcaster
//! store.create("Release", &release_json).await?;
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use release_core::ObjectKey;
use release_core::events::{EventBroadcaster, WatchEvent};
use serde_json::Value;
use tracing::debug;

use crate::error::StorageError;
use crate::traits::ObjectStore;
use crate::types::{ListParams, StoredObject};

/// A store wrapper that emits watch events after successful writes.
///
/// Events are emitted **after** the write succeeds, so every event corresponds
/// to a change that actually happened. Status writes are emitted as updates
/// whose old and new generations are equal.
pub struct EventedStore<S: ObjectStore> {
    /// The inner store implementation.
    inner: S,
    /// The event broadcaster.
    broadcaster: Arc<EventBroadcaster>,
}

impl<S: ObjectStore> EventedStore<S> {
    /// Create a new evented store wrapper.
    pub fn new(inner: S, broadcaster: Arc<EventBroadcaster>) -> Self {
        Self { inner, broadcaster }
    }

    /// Get a reference to the inner store.
    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Get a reference to the broadcaster.
    pub fn broadcaster(&self) -> &Arc<EventBroadcaster> {
        &self.broadcaster
    }

    fn emit(&self, event: WatchEvent) {
        if !self.broadcaster.has_subscribers() {
            return;
        }
        let event_type = event.event_type;
        let kind = event.kind.clone();
        let key = event.key.clone();
        let count = self.broadcaster.send(event);
        debug!(
            kind = %kind,
            key = %key,
            event_type = %event_type,
            subscribers = count,
            "Emitted watch event"
        );
    }

    fn emit_write(&self, kind: &str, stored: &StoredObject) {
        let event = match stored.previous_generation {
            Some(old) => WatchEvent::updated(kind, stored.key.clone(), old, stored.generation),
            None => WatchEvent::created(kind, stored.key.clone(), stored.generation),
        };
        self.emit(event);
    }
}

#[async_trait]
impl<S: ObjectStore> ObjectStore for EventedStore<S> {
    async fn create(&self, kind: &str, object: &Value) -> Result<StoredObject, StorageError> {
        let result = self.inner.create(kind, object).await?;
        self.emit_write(kind, &result);
        Ok(result)
    }

    async fn get(&self, kind: &str, key: &ObjectKey) -> Result<Option<StoredObject>, StorageError> {
        // Read operations don't emit events
        self.inner.get(kind, key).await
    }

    async fn list(
        &self,
        kind: &str,
        params: &ListParams,
    ) -> Result<Vec<StoredObject>, StorageError> {
        self.inner.list(kind, params).await
    }

    async fn update(&self, kind: &str, object: &Value) -> Result<StoredObject, StorageError> {
        let result = self.inner.update(kind, object).await?;
        self.emit_write(kind, &result);
        Ok(result)
    }

    async fn update_status(
        &self,
        kind: &str,
        object: &Value,
    ) -> Result<StoredObject, StorageError> {
        let result = self.inner.update_status(kind, object).await?;
        self.emit_write(kind, &result);
        Ok(result)
    }

    async fn delete(&self, kind: &str, key: &ObjectKey) -> Result<StoredObject, StorageError> {
        let result = self.inner.delete(kind, key).await?;
        self.emit(WatchEvent::deleted(kind, key.clone(), result.generation));
        Ok(result)
    }

    fn backend_name(&self) -> &'static str {
        self.inner.backend_name()
    }
}

impl<S: ObjectStore> std::fmt::Debug for EventedStore<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventedStore")
            .field("backend", &self.inner.backend_name())
            .field("subscriber_count", &self.broadcaster.subscriber_count())
            .finish()
    }
}
