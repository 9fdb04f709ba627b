//! Creation of the release PipelineRun.

use release_core::name::MAX_NAME_LENGTH;
use release_core::resources::{
    RELEASE_NAME_LABEL, RELEASE_STRATEGY_LABEL, RELEASE_UID_LABEL, RELEASE_WORKSPACE_LABEL,
};
use release_core::{
    ObjectKey, ObjectMeta, ParamValue, PipelineRef, PipelineRun, PipelineRunParam,
    PipelineRunSpec, Release, ReleaseStrategy, Resource, to_dns_label,
};
use release_storage::{DynStore, StorageError, TypedStore};
use tracing::info;

use crate::error::ReconcileError;

/// Parameter carrying `<namespace>/<name>` of the Release.
pub const RELEASE_PARAM: &str = "release";
/// Parameter carrying the strategy's enterprise contract policy.
pub const POLICY_PARAM: &str = "policy";

const UID_PREFIX_LEN: usize = 8;

/// Name of the PipelineRun created for `release`.
///
/// Stable across retries: `release-<namespace>-<name>-<uid[..8]>`, normalised to
/// a DNS label. When the identity is too long the namespace/name part is cut so
/// the uid suffix survives.
pub fn pipeline_run_name(release: &Release) -> String {
    let prefix = to_dns_label(&format!(
        "release-{}-{}",
        release.metadata.namespace, release.metadata.name
    ));
    let suffix: String = release
        .metadata
        .uid
        .as_deref()
        .unwrap_or_default()
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .take(UID_PREFIX_LEN)
        .collect::<String>()
        .to_ascii_lowercase();
    if suffix.is_empty() {
        return prefix;
    }

    let mut prefix = prefix;
    prefix.truncate(MAX_NAME_LENGTH - suffix.len() - 1);
    while prefix.ends_with('-') {
        prefix.pop();
    }
    format!("{prefix}-{suffix}")
}

/// Builds the PipelineRun for `release` in `target_workspace` without storing it.
pub fn build_pipeline_run(
    strategy: &ReleaseStrategy,
    target_workspace: &str,
    release: &Release,
) -> PipelineRun {
    let mut metadata = ObjectMeta::new(target_workspace, pipeline_run_name(release))
        .with_label(RELEASE_NAME_LABEL, &release.metadata.name)
        .with_label(RELEASE_WORKSPACE_LABEL, &release.metadata.namespace)
        .with_label(RELEASE_STRATEGY_LABEL, strategy.key().to_string());
    if let Some(uid) = &release.metadata.uid {
        metadata.labels.insert(RELEASE_UID_LABEL.to_string(), uid.clone());
    }

    let spec = &strategy.spec;
    let mut standard = vec![PipelineRunParam {
        name: RELEASE_PARAM.to_string(),
        value: ParamValue::String(release.key().to_string()),
    }];
    if let Some(policy) = &spec.policy {
        standard.push(PipelineRunParam {
            name: POLICY_PARAM.to_string(),
            value: ParamValue::String(policy.clone()),
        });
    }

    // Strategy params named like a standard param are shadowed by it.
    let mut params: Vec<PipelineRunParam> = spec
        .params
        .iter()
        .filter(|p| !standard.iter().any(|s| s.name == p.name))
        .map(|p| PipelineRunParam {
            name: p.name.clone(),
            value: p.resolved_value(),
        })
        .collect();
    params.extend(standard);

    PipelineRun {
        metadata,
        spec: PipelineRunSpec {
            pipeline_ref: PipelineRef {
                name: spec.pipeline.clone(),
                bundle: spec.bundle.clone(),
            },
            params,
            service_account_name: spec.service_account.clone(),
        },
    }
}

/// Submits PipelineRuns to the store.
pub struct TriggerEngine {
    store: DynStore,
}

impl TriggerEngine {
    pub fn new(store: DynStore) -> Self {
        Self { store }
    }

    /// Creates the PipelineRun for `release` and returns its key.
    ///
    /// The caller makes sure this runs at most once per Release; a second call
    /// fails with [`ReconcileError::CreateConflict`] because the name is fixed.
    pub async fn trigger(
        &self,
        strategy: &ReleaseStrategy,
        target_workspace: &str,
        release: &Release,
    ) -> Result<ObjectKey, ReconcileError> {
        let pipeline_run = build_pipeline_run(strategy, target_workspace, release);
        let key = pipeline_run.key();

        match self.store.create_resource(&pipeline_run).await {
            Ok(created) => {
                info!(
                    pipeline_run = %key,
                    pipeline = %created.spec.pipeline_ref.name,
                    release.namespace = %release.metadata.namespace,
                    release.name = %release.metadata.name,
                    "Created release PipelineRun"
                );
                Ok(key)
            }
            Err(StorageError::AlreadyExists { .. }) => {
                Err(ReconcileError::create_conflict(PipelineRun::KIND, &key))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Returns the existing PipelineRun at `key` if it was created for `release`.
    pub async fn find_owned(
        &self,
        key: &ObjectKey,
        release: &Release,
    ) -> Result<Option<PipelineRun>, ReconcileError> {
        let Some(uid) = release.metadata.uid.as_deref() else {
            return Ok(None);
        };
        let existing: Option<PipelineRun> = self.store.get_resource(key).await?;
        Ok(existing.filter(|run| {
            run.metadata.labels.get(RELEASE_UID_LABEL).map(String::as_str) == Some(uid)
        }))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use release_core::{Param, is_valid_name};
    use release_storage::ListParams;
    use release_store_memory::MemoryStore;

    use super::*;

    fn stored_release(uid: &str) -> Release {
        let mut release = Release::new("team-a", "r1", "link1");
        release.metadata.uid = Some(uid.to_string());
        release.metadata.generation = Some(1);
        release
    }

    fn strategy() -> ReleaseStrategy {
        ReleaseStrategy::new("team-b", "strat1", "release-pipeline")
            .with_bundle("quay.io/hacbs/release-bundle:main")
            .with_param(Param::string("extraConfig", "on"))
            .with_param(Param::array("tags", vec!["latest".into(), "v1".into()]))
    }

    #[test]
    fn test_pipeline_run_name_is_deterministic() {
        let release = stored_release("1234abcd-0000-4000-8000-000000000000");
        assert_eq!(pipeline_run_name(&release), "release-team-a-r1-1234abcd");
        assert_eq!(pipeline_run_name(&release), pipeline_run_name(&release.clone()));
    }

    #[test]
    fn test_pipeline_run_name_keeps_uid_when_truncated() {
        let mut release = stored_release("abcdef12-0000-4000-8000-000000000000");
        release.metadata.namespace = "a".repeat(40);
        release.metadata.name = "b".repeat(40);
        let name = pipeline_run_name(&release);
        assert!(name.len() <= MAX_NAME_LENGTH);
        assert!(name.ends_with("-abcdef12"));
        assert!(is_valid_name(&name));
    }

    #[test]
    fn test_build_pipeline_run() {
        let release = stored_release("1234abcd-0000-4000-8000-000000000000");
        let run = build_pipeline_run(&strategy().with_policy("strict"), "team-b", &release);

        assert_eq!(run.metadata.namespace, "team-b");
        assert_eq!(run.spec.pipeline_ref.name, "release-pipeline");
        assert_eq!(
            run.spec.pipeline_ref.bundle.as_deref(),
            Some("quay.io/hacbs/release-bundle:main")
        );
        let names: Vec<_> = run.spec.params.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["extraConfig", "tags", "release", "policy"]);
        assert_eq!(
            run.param("release"),
            Some(&ParamValue::String("team-a/r1".into()))
        );
        assert_eq!(
            run.param("tags"),
            Some(&ParamValue::Array(vec!["latest".into(), "v1".into()]))
        );
        assert_eq!(run.metadata.labels[RELEASE_NAME_LABEL], "r1");
        assert_eq!(run.metadata.labels[RELEASE_WORKSPACE_LABEL], "team-a");
        assert_eq!(run.metadata.labels[RELEASE_STRATEGY_LABEL], "team-b/strat1");
        assert_eq!(
            run.metadata.labels[RELEASE_UID_LABEL],
            "1234abcd-0000-4000-8000-000000000000"
        );
    }

    #[test]
    fn test_standard_params_shadow_strategy_params() {
        let release = stored_release("1234abcd");
        let strategy = strategy().with_param(Param::string("release", "spoofed"));
        let run = build_pipeline_run(&strategy, "team-b", &release);
        let releases: Vec<_> = run
            .spec
            .params
            .iter()
            .filter(|p| p.name == RELEASE_PARAM)
            .collect();
        assert_eq!(releases.len(), 1);
        assert_eq!(releases[0].value, ParamValue::String("team-a/r1".into()));
    }

    #[tokio::test]
    async fn test_second_trigger_conflicts() {
        let store: DynStore = Arc::new(MemoryStore::new());
        let engine = TriggerEngine::new(store.clone());
        let release = stored_release("1234abcd-0000-4000-8000-000000000000");

        let key = engine.trigger(&strategy(), "team-b", &release).await.unwrap();
        assert_eq!(key, ObjectKey::new("team-b", "release-team-a-r1-1234abcd"));

        let err = engine
            .trigger(&strategy(), "team-b", &release)
            .await
            .unwrap_err();
        assert!(matches!(err, ReconcileError::CreateConflict { .. }));
        let runs: Vec<PipelineRun> = store.list_resources(&ListParams::new()).await.unwrap();
        assert_eq!(runs.len(), 1);

        let owned = engine.find_owned(&key, &release).await.unwrap();
        assert!(owned.is_some());
        let stranger = stored_release("1234abcd-ffff-4000-8000-000000000000");
        assert!(engine.find_owned(&key, &stranger).await.unwrap().is_none());
    }
}
