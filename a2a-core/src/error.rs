/// Errors raised by agent registration, lookup, and trust/status transitions.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("agent {0} is already registered")]
    AlreadyRegistered(String),

    #[error("agent {0} is not registered")]
    UnknownAgent(String),

    #[error("reputation update rejected: new value {attempted} is below current {current}")]
    ReputationWouldDecrease { current: f64, attempted: f64 },

    #[error("reputation {0} is outside the valid [0.0, 1.0] range")]
    ReputationOutOfRange(f64),

    #[error("trust downgrade rejected: agent {agent} is already {current:?}, cannot move to {attempted:?}")]
    TrustWouldDowngrade {
        agent: String,
        current: crate::TrustLevel,
        attempted: crate::TrustLevel,
    },

    #[error("invalid status transition for agent {agent}: {from:?} -> {to:?}")]
    InvalidStatusTransition {
        agent: String,
        from: crate::AgentStatus,
        to: crate::AgentStatus,
    },
}
