//! In-process work queue for Release keys.
//!
//! Semantics:
//! - a key waiting in the queue is not queued twice;
//! - a key is handed to at most one worker at a time;
//! - a key added while in flight is re-queued once the worker calls [`WorkQueue::done`];
//! - failed keys come back after an exponential backoff.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use release_core::ObjectKey;
use tokio::sync::{Mutex, mpsc, watch};
use tracing::trace;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum KeyState {
    Queued,
    InFlight,
    /// In flight and added again meanwhile.
    Dirty,
}

/// Exponential backoff: `base * 2^failures`, capped at `max`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    pub base: Duration,
    pub max: Duration,
}

impl Backoff {
    pub fn new(base: Duration, max: Duration) -> Self {
        Self { base, max }
    }

    pub fn delay(&self, failures: u32) -> Duration {
        let factor = 1u32.checked_shl(failures).unwrap_or(u32::MAX);
        self.base.saturating_mul(factor).min(self.max)
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(Duration::from_millis(100), Duration::from_secs(30))
    }
}

pub struct WorkQueue {
    states: DashMap<ObjectKey, KeyState>,
    failures: DashMap<ObjectKey, u32>,
    ready_tx: mpsc::UnboundedSender<ObjectKey>,
    ready_rx: Mutex<mpsc::UnboundedReceiver<ObjectKey>>,
    shutdown: watch::Sender<bool>,
    backoff: Backoff,
}

impl WorkQueue {
    pub fn new(backoff: Backoff) -> Self {
        let (ready_tx, ready_rx) = mpsc::unbounded_channel();
        let (shutdown, _) = watch::channel(false);
        Self {
            states: DashMap::new(),
            failures: DashMap::new(),
            ready_tx,
            ready_rx: Mutex::new(ready_rx),
            shutdown,
            backoff,
        }
    }

    pub fn new_shared(backoff: Backoff) -> Arc<Self> {
        Arc::new(Self::new(backoff))
    }

    /// Queues `key` unless it is already waiting.
    pub fn add(&self, key: ObjectKey) {
        if self.is_shutting_down() {
            return;
        }
        match self.states.entry(key) {
            Entry::Vacant(entry) => {
                let key = entry.key().clone();
                entry.insert(KeyState::Queued);
                trace!(key = %key, "Queued");
                let _ = self.ready_tx.send(key);
            }
            Entry::Occupied(mut entry) => {
                if *entry.get() == KeyState::InFlight {
                    entry.insert(KeyState::Dirty);
                }
            }
        }
    }

    /// Queues `key` after `delay`.
    pub fn add_after(self: &Arc<Self>, key: ObjectKey, delay: Duration) {
        if delay.is_zero() {
            self.add(key);
            return;
        }
        let queue = Arc::clone(self);
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            queue.add(key);
        });
    }

    /// Queues `key` after the backoff for its failure count, then bumps the count.
    pub fn add_rate_limited(self: &Arc<Self>, key: ObjectKey) -> Duration {
        let failures = {
            let mut count = self.failures.entry(key.clone()).or_insert(0);
            let current = *count;
            *count = current.saturating_add(1);
            current
        };
        let delay = self.backoff.delay(failures);
        self.add_after(key, delay);
        delay
    }

    /// Clears the failure count of `key`.
    pub fn forget(&self, key: &ObjectKey) {
        self.failures.remove(key);
    }

    pub fn failures(&self, key: &ObjectKey) -> u32 {
        self.failures.get(key).map(|c| *c).unwrap_or(0)
    }

    /// Waits for the next key and marks it in flight.
    ///
    /// Returns `None` once the queue is shut down.
    pub async fn next(&self) -> Option<ObjectKey> {
        let mut shutdown = self.shutdown.subscribe();
        if *shutdown.borrow_and_update() {
            return None;
        }
        let mut ready = self.ready_rx.lock().await;
        let key = tokio::select! {
            key = ready.recv() => key?,
            _ = shutdown.changed() => return None,
        };
        self.states.insert(key.clone(), KeyState::InFlight);
        Some(key)
    }

    /// Marks `key` as finished, re-queueing it if it was added while in flight.
    pub fn done(&self, key: &ObjectKey) {
        let requeue = match self.states.entry(key.clone()) {
            Entry::Occupied(mut entry) => {
                let state = *entry.get();
                match state {
                    KeyState::Dirty => {
                        entry.insert(KeyState::Queued);
                        true
                    }
                    KeyState::InFlight => {
                        entry.remove();
                        false
                    }
                    KeyState::Queued => false,
                }
            }
            Entry::Vacant(_) => false,
        };
        if requeue && !self.is_shutting_down() {
            let _ = self.ready_tx.send(key.clone());
        }
    }

    /// Number of keys waiting to be picked up.
    pub fn len(&self) -> usize {
        self.states
            .iter()
            .filter(|entry| *entry.value() == KeyState::Queued)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether no key is queued or in flight.
    pub fn is_idle(&self) -> bool {
        self.states.is_empty()
    }

    /// Wakes every waiting worker with `None` and rejects further adds.
    pub fn shut_down(&self) {
        self.shutdown.send_replace(true);
    }

    pub fn is_shutting_down(&self) -> bool {
        *self.shutdown.borrow()
    }

    /// Resolves once [`WorkQueue::shut_down`] has been called.
    pub async fn closed(&self) {
        let mut shutdown = self.shutdown.subscribe();
        let _ = shutdown.wait_for(|closed| *closed).await;
    }
}

impl Default for WorkQueue {
    fn default() -> Self {
        Self::new(Backoff::default())
    }
}

impl std::fmt::Debug for WorkQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkQueue")
            .field("tracked", &self.states.len())
            .field("backoff", &self.backoff)
            .finish_non_exhaustive()
    }
}
