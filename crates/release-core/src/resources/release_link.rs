use serde::{Deserialize, Serialize};

use super::Resource;
use crate::meta::{ObjectKey, ObjectMeta};

/// Field path of [`ReleaseLinkSpec::target`], used as the field index name.
pub const TARGET_FIELD: &str = "spec.target";

/// One side of a cross-workspace trust relationship.
///
/// A link in workspace `W1` pointing at `W2` only pairs with a link in `W2`
/// pointing back at `W1` for the same application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReleaseLink {
    pub metadata: ObjectMeta,
    pub spec: ReleaseLinkSpec,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseLinkSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    /// Workspace this link points at.
    pub target: String,
    pub application: String,
    /// ReleaseStrategy to use; required on the target side of a pair.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release_strategy: Option<String>,
}

impl ReleaseLink {
    pub fn new(
        namespace: impl Into<String>,
        name: impl Into<String>,
        target: impl Into<String>,
        application: impl Into<String>,
    ) -> Self {
        Self {
            metadata: ObjectMeta::new(namespace, name),
            spec: ReleaseLinkSpec {
                display_name: None,
                target: target.into(),
                application: application.into(),
                release_strategy: None,
            },
        }
    }

    pub fn with_release_strategy(mut self, strategy: impl Into<String>) -> Self {
        self.spec.release_strategy = Some(strategy.into());
        self
    }

    /// Key of the referenced ReleaseStrategy, if one is named.
    pub fn release_strategy_key(&self) -> Option<ObjectKey> {
        self.spec
            .release_strategy
            .as_deref()
            .filter(|name| !name.is_empty())
            .map(|name| ObjectKey::new(&self.metadata.namespace, name))
    }

    /// Whether `other` is the counterpart of this link.
    pub fn pairs_with(&self, other: &ReleaseLink) -> bool {
        other.metadata.namespace == self.spec.target
            && other.spec.target == self.metadata.namespace
            && other.spec.application == self.spec.application
    }
}

impl Resource for ReleaseLink {
    const KIND: &'static str = "ReleaseLink";

    fn metadata(&self) -> &ObjectMeta {
        &self.metadata
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pairs_with_is_symmetric() {
        let a = ReleaseLink::new("team-a", "link1", "team-b", "app1");
        let b = ReleaseLink::new("team-b", "link2", "team-a", "app1");
        assert!(a.pairs_with(&b));
        assert!(b.pairs_with(&a));

        let other_app = ReleaseLink::new("team-b", "link3", "team-a", "app2");
        assert!(!a.pairs_with(&other_app));
    }

    #[test]
    fn test_release_strategy_key() {
        let link = ReleaseLink::new("team-b", "link2", "team-a", "app1");
        assert_eq!(link.release_strategy_key(), None);
        let link = link.with_release_strategy("strat1");
        assert_eq!(
            link.release_strategy_key(),
            Some(ObjectKey::new("team-b", "strat1"))
        );
    }
}
