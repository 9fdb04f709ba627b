//! The controller loop: watch notifications in, reconciliations out.
//!
//! ```text
//! EventBroadcaster ──▶ predicate::accepts ──▶ WorkQueue ──▶ workers ──▶ Reconciler
//! ```
//!
//! The controller owns no cache. Workers always read the current Release from
//! the store, so a stale or duplicated notification costs one extra read.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures_util::FutureExt;
use release_core::events::WatchEvent;
use release_core::resources::TARGET_FIELD;
use release_core::{Release, ReleaseLink, Resource};
use release_storage::{DynStore, ErrorCategory, IndexRegistry, ListParams, StorageError};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::ControllerConfig;
use crate::predicate;
use crate::queue::WorkQueue;
use crate::reconciler::{Action, Reconciler};

/// Field indexes the controller relies on. Hand these to the store backend.
pub fn release_indexes() -> Arc<IndexRegistry> {
    IndexRegistry::builder()
        .index_field(ReleaseLink::KIND, TARGET_FIELD)
        .build()
}

pub struct Controller {
    store: DynStore,
    reconciler: Arc<Reconciler>,
    queue: Arc<WorkQueue>,
    workers: usize,
}

impl Controller {
    pub fn new(store: DynStore, config: &ControllerConfig) -> Self {
        Self {
            reconciler: Arc::new(Reconciler::with_policy(
                store.clone(),
                config.ambiguous_target,
            )),
            queue: WorkQueue::new_shared(config.backoff()),
            workers: config.workers.max(1),
            store,
        }
    }

    pub fn queue(&self) -> &Arc<WorkQueue> {
        &self.queue
    }

    /// Queues the Release behind `event` if the event filter lets it through.
    pub fn enqueue(&self, event: &WatchEvent) -> bool {
        enqueue_event(&self.queue, event)
    }

    /// Queues every stored Release.
    ///
    /// Used once at startup and after the watch channel lagged. Releases that
    /// are already triggered or settled are dropped again by the reconciler.
    pub async fn resync(&self) -> Result<usize, StorageError> {
        let releases = self.store.list(Release::KIND, &ListParams::new()).await?;
        let count = releases.len();
        for stored in releases {
            self.queue.add(stored.key);
        }
        debug!(count, "Queued stored Releases");
        Ok(count)
    }

    /// Spawns the controller loop in the background.
    pub fn start(self, receiver: broadcast::Receiver<WatchEvent>) -> ControllerHandle {
        let queue = self.queue.clone();
        let task = tokio::spawn(self.run(receiver));
        ControllerHandle { queue, task }
    }

    /// Runs until the watch channel closes or the queue is shut down.
    pub async fn run(self, mut receiver: broadcast::Receiver<WatchEvent>) {
        info!(
            workers = self.workers,
            backend = self.store.backend_name(),
            "Starting release controller"
        );

        let workers: Vec<JoinHandle<()>> = (0..self.workers)
            .map(|id| tokio::spawn(worker(id, self.reconciler.clone(), self.queue.clone())))
            .collect();

        loop {
            tokio::select! {
                event = receiver.recv() => match event {
                    Ok(event) => {
                        enqueue_event(&self.queue, &event);
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!(missed = n, "Controller lagged, missed watch events; resyncing");
                        if let Err(e) = self.resync().await {
                            error!(error = %e, "Resync after lag failed");
                        }
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        info!("Watch channel closed, stopping");
                        break;
                    }
                },
                _ = self.queue.closed() => break,
            }
        }

        self.queue.shut_down();
        for handle in workers {
            if let Err(e) = handle.await {
                error!(error = %e, "Worker task failed");
            }
        }
        info!("Release controller stopped");
    }
}

impl std::fmt::Debug for Controller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Controller")
            .field("reconciler", &self.reconciler)
            .field("queue", &self.queue)
            .field("workers", &self.workers)
            .finish()
    }
}

/// Handle to a controller started with [`Controller::start`].
#[derive(Debug)]
pub struct ControllerHandle {
    queue: Arc<WorkQueue>,
    task: JoinHandle<()>,
}

impl ControllerHandle {
    pub fn queue(&self) -> &Arc<WorkQueue> {
        &self.queue
    }

    /// Stops the loop and waits for in-flight reconciliations to finish.
    pub async fn shutdown(self) {
        self.queue.shut_down();
        if let Err(e) = self.task.await {
            error!(error = %e, "Controller task failed");
        }
    }
}

fn enqueue_event(queue: &WorkQueue, event: &WatchEvent) -> bool {
    if !predicate::accepts(event) {
        return false;
    }
    debug!(key = %event.key, event_type = %event.event_type, "Enqueue Release");
    queue.add(event.key.clone());
    true
}

async fn worker(id: usize, reconciler: Arc<Reconciler>, queue: Arc<WorkQueue>) {
    while let Some(key) = queue.next().await {
        let result = AssertUnwindSafe(reconciler.reconcile(&key))
            .catch_unwind()
            .await;
        queue.done(&key);

        match result {
            Ok(Ok(Action::Done)) => queue.forget(&key),
            Ok(Ok(Action::RequeueAfter(delay))) => {
                queue.forget(&key);
                queue.add_after(key, delay);
            }
            Ok(Err(e)) if e.is_retryable() => {
                let delay = queue.add_rate_limited(key.clone());
                warn!(
                    worker = id,
                    key = %key,
                    reason = e.reason(),
                    category = e.category().map(ErrorCategory::as_str),
                    error = %e,
                    retry_in_ms = delay.as_millis() as u64,
                    "Reconcile failed, requeued"
                );
            }
            Ok(Err(e)) => {
                error!(
                    worker = id,
                    key = %key,
                    reason = e.reason(),
                    category = e.category().map(ErrorCategory::as_str),
                    error = %e,
                    "Reconcile failed"
                );
                queue.forget(&key);
            }
            Err(panic) => {
                let panic_msg = if let Some(s) = panic.downcast_ref::<&str>() {
                    s.to_string()
                } else if let Some(s) = panic.downcast_ref::<String>() {
                    s.clone()
                } else {
                    "Unknown panic".to_string()
                };
                error!(worker = id, key = %key, panic = %panic_msg, "Reconcile panicked");
                queue.add_rate_limited(key);
            }
        }
    }
    debug!(worker = id, "Worker stopped");
}

#[cfg(test)]
mod tests {
    use release_core::ObjectKey;
    use release_storage::TypedStore;
    use release_store_memory::MemoryStore;
    use tokio_test::block_on;

    use super::*;

    #[test]
    fn test_enqueue_applies_event_filter() {
        let store: DynStore = Arc::new(MemoryStore::with_indexes(release_indexes()));
        let controller = Controller::new(store, &ControllerConfig::default());
        let key = ObjectKey::new("team-a", "r1");

        assert!(!controller.enqueue(&WatchEvent::updated("Release", key.clone(), 1, 1)));
        assert!(!controller.enqueue(&WatchEvent::deleted("Release", key.clone(), 1)));
        assert!(controller.queue().is_empty());

        assert!(controller.enqueue(&WatchEvent::created("Release", key.clone(), 1)));
        assert_eq!(controller.queue().len(), 1);
    }

    #[test]
    fn test_resync_queues_every_release() {
        let store: DynStore = Arc::new(MemoryStore::with_indexes(release_indexes()));
        block_on(async {
            store
                .create_resource(&Release::new("team-a", "r1", "link1"))
                .await
                .unwrap();
            store
                .create_resource(&Release::new("team-c", "r2", "link9"))
                .await
                .unwrap();
            let controller = Controller::new(store.clone(), &ControllerConfig::default());

            assert_eq!(controller.resync().await.unwrap(), 2);
            assert_eq!(controller.queue().len(), 2);
        });
    }

    #[test]
    fn test_release_indexes() {
        let indexes = release_indexes();
        assert!(indexes.contains("ReleaseLink", "spec.target"));
        assert_eq!(indexes.len(), 1);
    }
}
