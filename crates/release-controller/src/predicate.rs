//! Which watch notifications are worth a reconciliation.

use release_core::{Release, Resource};
use release_core::events::{WatchEvent, WatchEventType};

/// Creations always pass; updates pass only when the spec generation moved.
/// Deletions and generic notifications are dropped, so status-only writes
/// never come back to the controller.
pub fn should_reconcile(
    event_type: WatchEventType,
    old_generation: Option<i64>,
    new_generation: Option<i64>,
) -> bool {
    match event_type {
        WatchEventType::Created => true,
        WatchEventType::Updated => old_generation != new_generation,
        WatchEventType::Deleted | WatchEventType::Generic => false,
    }
}

/// [`should_reconcile`] restricted to Release notifications.
pub fn accepts(event: &WatchEvent) -> bool {
    event.is_kind(Release::KIND)
        && should_reconcile(event.event_type, event.old_generation, event.new_generation)
}
