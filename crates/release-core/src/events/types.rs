//! Watch event types.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::meta::ObjectKey;

/// Kind of change a notification describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WatchEventType {
    /// Record was created
    Created,
    /// Record was written (spec or status)
    Updated,
    /// Record was deleted
    Deleted,
    /// Externally injected notification with no change attached
    Generic,
}

impl WatchEventType {
    /// Returns the string representation of the event type.
    pub fn as_str(&self) -> &'static str {
        match self {
            WatchEventType::Created => "created",
            WatchEventType::Updated => "updated",
            WatchEventType::Deleted => "deleted",
            WatchEventType::Generic => "generic",
        }
    }
}

impl std::fmt::Display for WatchEventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Notification about a change to a stored record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchEvent {
    pub event_type: WatchEventType,
    /// Record kind (e.g., "Release", "ReleaseLink")
    pub kind: String,
    pub key: ObjectKey,
    /// Generation before the write (None for creations)
    pub old_generation: Option<i64>,
    /// Generation after the write (None for deletions)
    pub new_generation: Option<i64>,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

impl WatchEvent {
    pub fn new(
        event_type: WatchEventType,
        kind: impl Into<String>,
        key: ObjectKey,
        old_generation: Option<i64>,
        new_generation: Option<i64>,
    ) -> Self {
        Self {
            event_type,
            kind: kind.into(),
            key,
            old_generation,
            new_generation,
            timestamp: OffsetDateTime::now_utc(),
        }
    }

    /// Create a "created" event.
    pub fn created(kind: impl Into<String>, key: ObjectKey, generation: i64) -> Self {
        Self::new(WatchEventType::Created, kind, key, None, Some(generation))
    }

    /// Create an "updated" event.
    pub fn updated(
        kind: impl Into<String>,
        key: ObjectKey,
        old_generation: i64,
        new_generation: i64,
    ) -> Self {
        Self::new(
            WatchEventType::Updated,
            kind,
            key,
            Some(old_generation),
            Some(new_generation),
        )
    }

    /// Create a "deleted" event.
    pub fn deleted(kind: impl Into<String>, key: ObjectKey, generation: i64) -> Self {
        Self::new(WatchEventType::Deleted, kind, key, Some(generation), None)
    }

    /// Create a "generic" event.
    pub fn generic(kind: impl Into<String>, key: ObjectKey) -> Self {
        Self::new(WatchEventType::Generic, kind, key, None, None)
    }

    /// Check if this event is about the given record kind.
    pub fn is_kind(&self, kind: &str) -> bool {
        self.kind == kind
    }
}
