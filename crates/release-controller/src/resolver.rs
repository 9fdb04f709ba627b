//! Resolution of the `Release -> ReleaseLink -> target ReleaseLink -> ReleaseStrategy` chain.
//!
//! The resolver only reads from the store. Each hop short-circuits with a
//! [`ReconcileError`] naming the record that could not be found.

use release_core::{ObjectKey, Release, ReleaseLink, ReleaseStrategy, Resource};
use release_core::resources::TARGET_FIELD;
use release_storage::{DynStore, ListParams, TypedStore};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::error::ReconcileError;

/// What to do when more than one ReleaseLink in the target workspace pairs
/// with the origin link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AmbiguityPolicy {
    /// Fail with [`ReconcileError::AmbiguousTarget`].
    #[default]
    Strict,
    /// Pick the candidate with the lexicographically smallest name.
    FirstByName,
}

/// The three records a Release resolves to.
#[derive(Debug, Clone)]
pub struct ResolvedChain {
    pub release_link: ReleaseLink,
    pub target_release_link: ReleaseLink,
    pub release_strategy: ReleaseStrategy,
}

pub struct LinkResolver {
    store: DynStore,
    policy: AmbiguityPolicy,
}

impl LinkResolver {
    pub fn new(store: DynStore) -> Self {
        Self::with_policy(store, AmbiguityPolicy::default())
    }

    pub fn with_policy(store: DynStore, policy: AmbiguityPolicy) -> Self {
        Self { store, policy }
    }

    pub fn policy(&self) -> AmbiguityPolicy {
        self.policy
    }

    /// Walks the whole chain for `release`.
    #[instrument(skip_all, fields(release.namespace = %release.metadata.namespace, release.name = %release.metadata.name))]
    pub async fn resolve_chain(&self, release: &Release) -> Result<ResolvedChain, ReconcileError> {
        let release_link = self.get_release_link(release).await?;
        let target_release_link = self.get_target_release_link(&release_link).await?;
        let release_strategy = self.get_release_strategy(&target_release_link).await?;

        debug!(
            release_link = %release_link.key(),
            target_release_link = %target_release_link.key(),
            release_strategy = %release_strategy.key(),
            "Resolved release chain"
        );

        Ok(ResolvedChain {
            release_link,
            target_release_link,
            release_strategy,
        })
    }

    /// The ReleaseLink named by `release.spec.releaseLink`, in the Release's namespace.
    pub async fn get_release_link(&self, release: &Release) -> Result<ReleaseLink, ReconcileError> {
        self.get_required(release.release_link_key()).await
    }

    /// The counterpart of `release_link` in its target workspace.
    pub async fn get_target_release_link(
        &self,
        release_link: &ReleaseLink,
    ) -> Result<ReleaseLink, ReconcileError> {
        let target = &release_link.spec.target;
        let origin = &release_link.metadata.namespace;
        let application = &release_link.spec.application;

        let params = ListParams::new()
            .in_namespace(target.clone())
            .matching_field(TARGET_FIELD, origin.clone());
        let mut candidates: Vec<ReleaseLink> = self
            .store
            .list_resources::<ReleaseLink>(&params)
            .await?
            .into_iter()
            .filter(|candidate| release_link.pairs_with(candidate))
            .collect();
        candidates.sort_by(|a, b| a.metadata.name.cmp(&b.metadata.name));

        match candidates.len() {
            0 => Err(ReconcileError::NoMatchingTarget {
                target: target.clone(),
                origin: origin.clone(),
                application: application.clone(),
            }),
            1 => Ok(candidates.remove(0)),
            _ => match self.policy {
                AmbiguityPolicy::FirstByName => Ok(candidates.remove(0)),
                AmbiguityPolicy::Strict => Err(ReconcileError::AmbiguousTarget {
                    target: target.clone(),
                    application: application.clone(),
                    candidates: candidates.into_iter().map(|c| c.metadata.name).collect(),
                }),
            },
        }
    }

    /// The ReleaseStrategy named by the target link, in the target link's namespace.
    pub async fn get_release_strategy(
        &self,
        target_release_link: &ReleaseLink,
    ) -> Result<ReleaseStrategy, ReconcileError> {
        let key = target_release_link.release_strategy_key().ok_or_else(|| {
            ReconcileError::InvalidReference {
                kind: ReleaseLink::KIND.to_string(),
                key: target_release_link.key().to_string(),
                field: "spec.releaseStrategy".to_string(),
            }
        })?;
        self.get_required(key).await
    }

    async fn get_required<R: Resource>(&self, key: ObjectKey) -> Result<R, ReconcileError> {
        self.store
            .get_resource::<R>(&key)
            .await?
            .ok_or_else(|| ReconcileError::not_found(R::KIND, &key))
    }
}
