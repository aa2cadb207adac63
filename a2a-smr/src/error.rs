#[derive(Debug, thiserror::Error)]
pub enum SmrError {
    #[error("target {0} already exists")]
    TargetAlreadyExists(String),

    #[error("target {0} does not exist")]
    TargetNotFound(String),

    #[error("unknown executor function {0}")]
    UnknownFunction(String),

    #[error("operation {0} is missing unmet dependencies and was queued")]
    DependenciesUnmet(uuid::Uuid),

    #[error("operation signature failed verification")]
    InvalidSignature,

    #[error("sequence {attempted} is not strictly increasing after {last} for this executor")]
    NonMonotonicSequence { last: u64, attempted: u64 },

    #[error("snapshot {0} not found")]
    SnapshotNotFound(uuid::Uuid),
}
