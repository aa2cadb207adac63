/// Taxonomy mirrors the five buckets every crate in this workspace sorts its failures into:
/// protocol, transient, Byzantine evidence, state, and operator errors. Each variant carries the
/// wire error code it maps to via [`ConsensusError::code`].
#[derive(Debug, thiserror::Error)]
pub enum ConsensusError {
    #[error("protocol violation: {0}")]
    Protocol(String),

    #[error("timed out waiting for quorum on ({view}, {sequence})")]
    Timeout { view: u64, sequence: u64 },

    #[error("Byzantine evidence against {agent}: {detail}")]
    ByzantineEvidence { agent: String, detail: String },

    #[error("state precondition failed: {0}")]
    State(String),

    #[error("operator error: {0}")]
    Operator(String),

    #[error(transparent)]
    Transport(#[from] a2a_transport::TransportError),
}

impl ConsensusError {
    pub fn code(&self) -> i64 {
        use a2a_transport::ErrorCode;
        let code = match self {
            ConsensusError::Protocol(_) => ErrorCode::InvalidRequest,
            ConsensusError::Timeout { .. } => ErrorCode::Timeout,
            ConsensusError::ByzantineEvidence { .. } => ErrorCode::MaliciousBehaviorDetected,
            ConsensusError::State(_) => ErrorCode::ConflictUnresolved,
            ConsensusError::Operator(_) => ErrorCode::InvalidRequest,
            ConsensusError::Transport(_) => ErrorCode::AgentUnavailable,
        };
        code.code()
    }
}

/// Result of an internal quorum-collection attempt. Expected protocol branching (didn't reach
/// quorum yet, detected conflicting digests) goes through this enum rather than `Result`'s `Err`
/// arm, which is reserved for genuinely exceptional, caller-facing failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsensusOutcome {
    Committed,
    Pending,
    ProtocolError(String),
    Timeout,
    ByzantineEvidence(String),
    Conflict(String),
    /// A view-change/new-view transition completed; the engine is now running under the given
    /// view rather than having committed or rejected a proposal.
    ViewAdopted(u64),
}
