//! Typed records handled by the release controller.
//!
//! Records travel through the store as JSON objects of the shape
//! `{"kind": ..., "metadata": {...}, "spec": {...}, "status": {...}}`. The
//! [`Resource`] trait converts between that representation and the typed
//! structs in this module.

mod condition;
mod pipeline_run;
mod release;
mod release_link;
mod release_strategy;

pub use condition::{Condition, ConditionStatus, find_condition, now_rfc3339, set_condition};
pub use pipeline_run::{
    PipelineRef, PipelineRun, PipelineRunParam, PipelineRunSpec, RELEASE_NAME_LABEL,
    RELEASE_STRATEGY_LABEL, RELEASE_UID_LABEL, RELEASE_WORKSPACE_LABEL,
};
pub use release::{
    REASON_ERROR, REASON_RETRYING, REASON_RUNNING, Release, ReleaseSpec, ReleaseStatus,
    SUCCEEDED_CONDITION,
};
pub use release_link::{ReleaseLink, ReleaseLinkSpec, TARGET_FIELD};
pub use release_strategy::{Param, ParamValue, ReleaseStrategy, ReleaseStrategySpec};

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{CoreError, Result};
use crate::meta::{ObjectKey, ObjectMeta};

/// A typed record kind stored in the object store.
pub trait Resource: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// The `kind` discriminator written into every stored object.
    const KIND: &'static str;

    fn metadata(&self) -> &ObjectMeta;

    fn key(&self) -> ObjectKey {
        self.metadata().key()
    }

    /// Serializes the record, stamping its `kind`.
    fn to_value(&self) -> Result<Value> {
        let mut value = serde_json::to_value(self)?;
        let obj = value
            .as_object_mut()
            .ok_or_else(|| CoreError::invalid_object(format!("{} is not an object", Self::KIND)))?;
        obj.insert("kind".to_string(), Value::String(Self::KIND.to_string()));
        Ok(value)
    }

    /// Deserializes a stored object, rejecting objects of another kind.
    fn from_value(value: Value) -> Result<Self> {
        if let Some(kind) = value.get("kind").and_then(Value::as_str) {
            if kind != Self::KIND {
                return Err(CoreError::kind_mismatch(Self::KIND, kind));
            }
        }
        Ok(serde_json::from_value(value)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_to_value_stamps_kind() {
        let link = ReleaseLink::new("team-a", "link1", "team-b", "app1");
        let value = link.to_value().unwrap();
        assert_eq!(value["kind"], "ReleaseLink");
        assert_eq!(value["metadata"]["namespace"], "team-a");
        assert_eq!(value["spec"]["target"], "team-b");
    }

    #[test]
    fn test_from_value_rejects_other_kind() {
        let value = json!({
            "kind": "ReleaseStrategy",
            "metadata": {"namespace": "team-a", "name": "x"},
            "spec": {"target": "team-b", "application": "app1"}
        });
        let err = ReleaseLink::from_value(value).unwrap_err();
        assert!(matches!(err, CoreError::KindMismatch { .. }));
    }

    #[test]
    fn test_from_value_without_kind() {
        let value = json!({
            "metadata": {"namespace": "team-a", "name": "r1", "generation": 2},
            "spec": {"releaseLink": "link1"}
        });
        let release = Release::from_value(value).unwrap();
        assert_eq!(release.spec.release_link, "link1");
        assert_eq!(release.metadata.generation(), 2);
        assert!(release.status.conditions.is_empty());
    }
}
