#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("capability {0} is incomplete: {1}")]
    IncompleteCapability(String, &'static str),

    #[error("capability {0} not found")]
    UnknownCapability(String),

    #[error("composition {0} not found")]
    UnknownComposition(String),

    #[error("composition references unknown member {0}")]
    UnknownMember(String),

    #[error("composition dependency graph contains a cycle at {0}")]
    CyclicDependency(String),

    #[error("caller does not meet minimum trust level for composition {0}")]
    TrustTooLow(String),

    #[error("member {member} failed during {strategy} execution: {source}")]
    MemberExecutionFailed { member: String, strategy: &'static str, source: String },
}

#[derive(Debug, thiserror::Error)]
pub enum TransformError {
    #[error("required field at path {0} is missing")]
    RequiredFieldMissing(String),

    #[error("unknown transform function {0}")]
    UnknownTransform(String),

    #[error("value at {path} failed validation: {reason}")]
    ValidationFailed { path: String, reason: String },
}
