use serde::{Deserialize, Serialize};

use super::Resource;
use super::release_strategy::ParamValue;
use crate::meta::ObjectMeta;

pub const RELEASE_NAME_LABEL: &str = "release.appstudio.openshift.io/name";
pub const RELEASE_WORKSPACE_LABEL: &str = "release.appstudio.openshift.io/workspace";
pub const RELEASE_UID_LABEL: &str = "release.appstudio.openshift.io/uid";
/// `<namespace>/<name>` of the ReleaseStrategy the run was built from.
pub const RELEASE_STRATEGY_LABEL: &str = "release.appstudio.openshift.io/strategy";

/// Pipeline execution record consumed by the pipeline engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineRun {
    pub metadata: ObjectMeta,
    pub spec: PipelineRunSpec,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineRunSpec {
    pub pipeline_ref: PipelineRef,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub params: Vec<PipelineRunParam>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_account_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineRef {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bundle: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineRunParam {
    pub name: String,
    pub value: ParamValue,
}

impl PipelineRun {
    /// Looks up a parameter by name.
    pub fn param(&self, name: &str) -> Option<&ParamValue> {
        self.spec
            .params
            .iter()
            .find(|p| p.name == name)
            .map(|p| &p.value)
    }
}

impl Resource for PipelineRun {
    const KIND: &'static str = "PipelineRun";

    fn metadata(&self) -> &ObjectMeta {
        &self.metadata
    }
}
