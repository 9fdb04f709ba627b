pub mod error;
pub mod events;
pub mod meta;
pub mod name;
pub mod resources;

pub use error::{CoreError, Result};
pub use meta::{ObjectKey, ObjectMeta};
pub use name::{NameError, generate_uid, is_valid_name, to_dns_label, validate_name};
pub use resources::{
    Condition, ConditionStatus, Param, ParamValue, PipelineRef, PipelineRun, PipelineRunParam,
    PipelineRunSpec, Release, ReleaseLink, ReleaseLinkSpec, ReleaseSpec, ReleaseStatus,
    ReleaseStrategy, ReleaseStrategySpec, Resource,
};
