//! Reconciliation of a single Release.
//!
//! ```text
//! Fetched ──▶ Resolving ──▶ Triggering ──▶ Done(success)
//!    │            │              │
//!    ▼            └──────┬───────┘
//! NotFound               ▼
//!                   Done(error)
//! ```
//!
//! Settled failures are written to the Release status and reported as
//! [`Action::Done`]. Transient store failures are written as a `Retrying`
//! condition where possible and returned as errors so the queue backs off.

use std::time::Duration;

use release_core::{ObjectKey, Release, Resource};
use release_storage::{DynStore, ErrorCategory, TypedStore};
use tracing::{Instrument, debug, info, info_span, warn};

use crate::error::ReconcileError;
use crate::resolver::{AmbiguityPolicy, LinkResolver};
use crate::trigger::{TriggerEngine, pipeline_run_name};

/// What the queue should do with a key after a successful reconciliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Done,
    RequeueAfter(Duration),
}

pub struct Reconciler {
    store: DynStore,
    resolver: LinkResolver,
    trigger: TriggerEngine,
}

impl Reconciler {
    pub fn new(store: DynStore) -> Self {
        Self::with_policy(store, AmbiguityPolicy::default())
    }

    pub fn with_policy(store: DynStore, policy: AmbiguityPolicy) -> Self {
        Self {
            resolver: LinkResolver::with_policy(store.clone(), policy),
            trigger: TriggerEngine::new(store.clone()),
            store,
        }
    }

    /// Drives the Release at `key` one step toward a terminal state.
    pub async fn reconcile(&self, key: &ObjectKey) -> Result<Action, ReconcileError> {
        let span = info_span!(
            "reconcile",
            release.namespace = %key.namespace,
            release.name = %key.name
        );
        self.reconcile_inner(key).instrument(span).await
    }

    async fn reconcile_inner(&self, key: &ObjectKey) -> Result<Action, ReconcileError> {
        let Some(mut release) = self.store.get_resource::<Release>(key).await? else {
            info!("Release not found, ignoring since it must have been deleted");
            return Ok(Action::Done);
        };
        let generation = release.metadata.generation();

        if let Some(run) = &release.status.release_pipeline_run {
            debug!(pipeline_run = %run, "Release already triggered");
            return Ok(Action::Done);
        }
        if release.status.is_settled_for(generation) {
            debug!(generation, "Release already settled for this generation");
            return Ok(Action::Done);
        }

        let chain = match self.resolver.resolve_chain(&release).await {
            Ok(chain) => chain,
            Err(e) => return self.fail(release, "resolve", e).await,
        };

        let target_workspace = chain.release_link.spec.target.clone();
        let pipeline_run = match self
            .trigger
            .trigger(&chain.release_strategy, &target_workspace, &release)
            .await
        {
            Ok(key) => key,
            Err(ReconcileError::CreateConflict { kind, key: conflict }) => {
                let run_key = ObjectKey::new(&target_workspace, pipeline_run_name(&release));
                match self.trigger.find_owned(&run_key, &release).await {
                    Ok(Some(_)) => {
                        info!(pipeline_run = %run_key, "Adopting PipelineRun created by an earlier attempt");
                        run_key
                    }
                    Ok(None) => {
                        let err = ReconcileError::CreateConflict { kind, key: conflict };
                        return self.fail(release, "trigger", err).await;
                    }
                    Err(e) => return self.fail(release, "trigger", e).await,
                }
            }
            Err(e) => return self.fail(release, "trigger", e).await,
        };

        if !release.status.mark_triggered(&pipeline_run, generation) {
            warn!(
                pipeline_run = %pipeline_run,
                generation,
                "Release settled while triggering, leaving status unchanged"
            );
            return Ok(Action::Done);
        }
        self.store.update_resource_status(&release).await?;
        info!(
            pipeline_run = %pipeline_run,
            release_strategy = %chain.release_strategy.key(),
            "Release pipeline triggered"
        );
        Ok(Action::Done)
    }

    /// Records `err` on the Release status and decides the outcome.
    async fn fail(
        &self,
        mut release: Release,
        step: &'static str,
        err: ReconcileError,
    ) -> Result<Action, ReconcileError> {
        let generation = release.metadata.generation();

        if err.is_retryable() {
            warn!(
                step,
                reason = err.reason(),
                category = err.category().map(ErrorCategory::as_str),
                error = %err,
                "Reconcile step failed, will retry"
            );
            release
                .status
                .set_retrying_condition(err.to_string(), generation);
            if let Err(status_err) = self.store.update_resource_status(&release).await {
                warn!(error = %status_err, "Failed to record retrying condition");
            }
            return Err(err);
        }

        warn!(
            step,
            reason = err.reason(),
            category = err.category().map(ErrorCategory::as_str),
            error = %err,
            "Reconcile step failed"
        );
        release.status.set_error_condition(err.to_string(), generation);
        self.store.update_resource_status(&release).await?;
        Ok(Action::Done)
    }
}

impl std::fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("backend", &self.store.backend_name())
            .field("policy", &self.resolver.policy())
            .finish_non_exhaustive()
    }
}
