use serde::{Deserialize, Serialize};

use super::Resource;
use super::condition::{Condition, ConditionStatus, find_condition, now_rfc3339, set_condition};
use crate::meta::{ObjectKey, ObjectMeta};

pub const SUCCEEDED_CONDITION: &str = "Succeeded";

/// Settled failure: stays until the Release gets a new generation.
pub const REASON_ERROR: &str = "Error";
/// Transient failure: the controller retries on its own.
pub const REASON_RETRYING: &str = "Retrying";
/// The release pipeline has been triggered.
pub const REASON_RUNNING: &str = "Running";

/// A request to ship an artifact through the ReleaseLink it references.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Release {
    pub metadata: ObjectMeta,
    pub spec: ReleaseSpec,
    #[serde(default)]
    pub status: ReleaseStatus,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseSpec {
    /// Name of a ReleaseLink in the Release's own namespace.
    pub release_link: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseStatus {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,
    /// `namespace/name` of the PipelineRun created for this Release.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release_pipeline_run: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<String>,
}

impl Release {
    pub fn new(
        namespace: impl Into<String>,
        name: impl Into<String>,
        release_link: impl Into<String>,
    ) -> Self {
        Self {
            metadata: ObjectMeta::new(namespace, name),
            spec: ReleaseSpec {
                release_link: release_link.into(),
            },
            status: ReleaseStatus::default(),
        }
    }

    /// Key of the referenced ReleaseLink.
    pub fn release_link_key(&self) -> ObjectKey {
        ObjectKey::new(&self.metadata.namespace, &self.spec.release_link)
    }
}

impl Resource for Release {
    const KIND: &'static str = "Release";

    fn metadata(&self) -> &ObjectMeta {
        &self.metadata
    }
}

impl ReleaseStatus {
    pub fn succeeded_condition(&self) -> Option<&Condition> {
        find_condition(&self.conditions, SUCCEEDED_CONDITION)
    }

    /// True when the Succeeded condition is False.
    pub fn has_error(&self) -> bool {
        self.succeeded_condition()
            .is_some_and(|c| c.status == ConditionStatus::False)
    }

    pub fn error_message(&self) -> Option<&str> {
        self.succeeded_condition()
            .filter(|c| c.status == ConditionStatus::False)
            .map(|c| c.message.as_str())
    }

    pub fn is_triggered(&self) -> bool {
        self.release_pipeline_run.is_some()
    }

    /// Records a settled failure, overwriting any prior condition.
    pub fn set_error_condition(&mut self, message: impl Into<String>, generation: i64) {
        self.set_succeeded(ConditionStatus::False, REASON_ERROR, message, generation);
    }

    /// Records a transient failure that the controller will retry.
    pub fn set_retrying_condition(&mut self, message: impl Into<String>, generation: i64) {
        self.set_succeeded(ConditionStatus::False, REASON_RETRYING, message, generation);
    }

    /// Marks the Release as triggered by `pipeline_run`.
    ///
    /// Returns `false` and leaves the status untouched when a settled condition
    /// already exists for `generation`.
    #[must_use]
    pub fn mark_triggered(&mut self, pipeline_run: &ObjectKey, generation: i64) -> bool {
        if self.is_settled_for(generation) {
            return false;
        }
        self.release_pipeline_run = Some(pipeline_run.to_string());
        self.start_time = Some(now_rfc3339());
        self.set_succeeded(
            ConditionStatus::Unknown,
            REASON_RUNNING,
            "Release pipeline triggered",
            generation,
        );
        true
    }

    /// Whether the Succeeded condition is settled for `generation`.
    ///
    /// Settled means succeeded, or failed with a non-transient reason.
    pub fn is_settled_for(&self, generation: i64) -> bool {
        self.succeeded_condition().is_some_and(|c| {
            c.observed_generation == Some(generation)
                && match c.status {
                    ConditionStatus::True => true,
                    ConditionStatus::False => c.reason != REASON_RETRYING,
                    ConditionStatus::Unknown => false,
                }
        })
    }

    fn set_succeeded(
        &mut self,
        status: ConditionStatus,
        reason: &str,
        message: impl Into<String>,
        generation: i64,
    ) {
        set_condition(
            &mut self.conditions,
            Condition::new(SUCCEEDED_CONDITION, status, reason, message)
                .with_observed_generation(generation),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_condition_overwrites() {
        let mut status = ReleaseStatus::default();
        status.set_error_condition("first", 1);
        status.set_error_condition("second", 1);
        assert_eq!(status.conditions.len(), 1);
        assert_eq!(status.error_message(), Some("second"));
        assert!(status.has_error());
    }

    #[test]
    fn test_mark_triggered_after_transient_failure() {
        let mut status = ReleaseStatus::default();
        status.set_retrying_condition("connection refused", 1);
        let key = ObjectKey::new("team-b", "release-team-a-r1-1234abcd");
        assert!(status.mark_triggered(&key, 1));
        assert!(!status.has_error());
        assert_eq!(
            status.release_pipeline_run.as_deref(),
            Some("team-b/release-team-a-r1-1234abcd")
        );
        assert_eq!(status.succeeded_condition().unwrap().reason, REASON_RUNNING);
    }

    #[test]
    fn test_settled_failure_is_not_regressed() {
        let mut status = ReleaseStatus::default();
        status.set_error_condition("not found", 3);
        let key = ObjectKey::new("team-b", "run");
        assert!(!status.mark_triggered(&key, 3));
        assert!(status.has_error());
        assert!(status.release_pipeline_run.is_none());

        // a new generation may move on
        assert!(status.mark_triggered(&key, 4));
        assert!(!status.has_error());
    }

    #[test]
    fn test_release_link_key() {
        let release = Release::new("team-a", "r1", "link1");
        assert_eq!(release.release_link_key(), ObjectKey::new("team-a", "link1"));
    }
}
