//! Watch notifications for stored records.
//!
//! Stores publish a [`WatchEvent`] after every successful write. Controllers
//! subscribe through the [`EventBroadcaster`] and decide which notifications
//! are worth reconciling.
//!
//! ```text
//! store write ──▶ EventBroadcaster ──▶ controller (filter ──▶ work queue)
//!                 (tokio broadcast)
//! ```

pub mod broadcaster;
pub mod types;

pub use broadcaster::EventBroadcaster;
pub use types::{WatchEvent, WatchEventType};
