/// Wire-level error codes, carried alongside each crate's own `thiserror` taxonomy so transport
/// failures and protocol failures surface through the same numbering on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    InvalidRequest,
    Timeout,
    AgentUnavailable,
    AuthenticationError,
    AuthorizationError,
    QuorumUnreachable,
    MaliciousBehaviorDetected,
    ConflictUnresolved,
}

impl ErrorCode {
    pub fn code(self) -> i64 {
        match self {
            ErrorCode::InvalidRequest => -32600,
            ErrorCode::Timeout => -32000,
            ErrorCode::AgentUnavailable => -32001,
            ErrorCode::AuthenticationError => -32002,
            ErrorCode::AuthorizationError => -32003,
            ErrorCode::QuorumUnreachable => -32010,
            ErrorCode::MaliciousBehaviorDetected => -32011,
            ErrorCode::ConflictUnresolved => -32020,
        }
    }

    pub fn message(self) -> &'static str {
        match self {
            ErrorCode::InvalidRequest => "Invalid Request",
            ErrorCode::Timeout => "timeout_error",
            ErrorCode::AgentUnavailable => "agent_unavailable",
            ErrorCode::AuthenticationError => "authentication_error",
            ErrorCode::AuthorizationError => "authorization_error",
            ErrorCode::QuorumUnreachable => "quorum_unreachable",
            ErrorCode::MaliciousBehaviorDetected => "malicious_behavior_detected",
            ErrorCode::ConflictUnresolved => "conflict_unresolved",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("target agent {0} has no registered delivery channel")]
    UnknownTarget(String),

    #[error("delivery channel to {0} is closed")]
    ChannelClosed(String),

    #[error("frame failed to serialize: {0}")]
    Encoding(String),
}
