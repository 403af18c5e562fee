use crate::resource_id::ResourceId;

/// Construction and usage errors. Raised at the offending call; never used
/// to carry an individual resource's close failure, which is report data.
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    #[error("dependency cycle among resources: {}", .names.join(", "))]
    CycleDetected { names: Vec<String> },

    #[error("unknown resource id {0}")]
    UnknownResource(ResourceId),

    #[error("resource {0} cannot depend on itself")]
    SelfDependency(ResourceId),

    #[error("close_all called on an empty composite")]
    EmptyComposite,

    #[error("shutdown config: {0}")]
    Config(#[from] anyhow::Error),
}
