//! Release controller.
//!
//! Reacts to new Releases by resolving the ReleaseLink pair they travel
//! through and triggering the release pipeline named by the target side's
//! ReleaseStrategy.

pub mod bootstrap;
pub mod config;
pub mod controller;
pub mod error;
pub mod observability;
pub mod predicate;
pub mod queue;
pub mod reconciler;
pub mod resolver;
pub mod trigger;

pub use controller::{Controller, ControllerHandle, release_indexes};
pub use error::ReconcileError;
pub use reconciler::{Action, Reconciler};
pub use resolver::{AmbiguityPolicy, LinkResolver, ResolvedChain};
pub use trigger::TriggerEngine;
