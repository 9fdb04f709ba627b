use serde::{Deserialize, Serialize};

use super::Resource;
use crate::meta::ObjectMeta;

/// How to run the release pipeline for an application in a workspace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReleaseStrategy {
    pub metadata: ObjectMeta,
    pub spec: ReleaseStrategySpec,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseStrategySpec {
    /// Name of the pipeline to run.
    pub pipeline: String,
    /// OCI bundle holding the pipeline definition.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bundle: Option<String>,
    /// Enterprise contract policy passed to the pipeline.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub params: Vec<Param>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_account: Option<String>,
}

/// A strategy parameter: either a single `value` or a list of `values`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Param {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub values: Vec<String>,
}

/// A resolved pipeline parameter value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    String(String),
    Array(Vec<String>),
}

impl Param {
    pub fn string(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: Some(value.into()),
            values: Vec::new(),
        }
    }

    pub fn array(name: impl Into<String>, values: Vec<String>) -> Self {
        Self {
            name: name.into(),
            value: None,
            values,
        }
    }

    /// `values` wins over `value` when both are set.
    pub fn resolved_value(&self) -> ParamValue {
        if self.values.is_empty() {
            ParamValue::String(self.value.clone().unwrap_or_default())
        } else {
            ParamValue::Array(self.values.clone())
        }
    }
}

impl ReleaseStrategy {
    pub fn new(
        namespace: impl Into<String>,
        name: impl Into<String>,
        pipeline: impl Into<String>,
    ) -> Self {
        Self {
            metadata: ObjectMeta::new(namespace, name),
            spec: ReleaseStrategySpec {
                pipeline: pipeline.into(),
                ..Default::default()
            },
        }
    }

    pub fn with_bundle(mut self, bundle: impl Into<String>) -> Self {
        self.spec.bundle = Some(bundle.into());
        self
    }

    pub fn with_policy(mut self, policy: impl Into<String>) -> Self {
        self.spec.policy = Some(policy.into());
        self
    }

    pub fn with_param(mut self, param: Param) -> Self {
        self.spec.params.push(param);
        self
    }
}

impl Resource for ReleaseStrategy {
    const KIND: &'static str = "ReleaseStrategy";

    fn metadata(&self) -> &ObjectMeta {
        &self.metadata
    }
}
