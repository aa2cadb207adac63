use a2a_core::TrustLevel;

#[derive(Debug, thiserror::Error)]
pub enum SecurityError {
    #[error("no identity binding for agent {0}")]
    UnknownAgent(String),

    #[error("agent {0} already has a live identity binding")]
    AlreadyBound(String),

    #[error("identity binding for agent {0} is revoked: {1}")]
    Revoked(String, String),

    #[error("agent {agent} has insufficient trust: requires {required:?}, has {actual:?}")]
    InsufficientTrust { agent: String, required: TrustLevel, actual: TrustLevel },
}

impl SecurityError {
    pub fn code(&self) -> i64 {
        use a2a_transport::ErrorCode;
        let code = match self {
            SecurityError::UnknownAgent(_) => ErrorCode::AuthenticationError,
            SecurityError::AlreadyBound(_) => ErrorCode::InvalidRequest,
            SecurityError::Revoked(..) | SecurityError::InsufficientTrust { .. } => ErrorCode::AuthorizationError,
        };
        code.code()
    }
}
