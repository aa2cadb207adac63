use a2a_core::{AgentId, TrustLevel};
use a2a_crypto::PublicKey;
use chrono::{DateTime, Utc};

/// The action a participant is attempting, each gated behind its own minimum trust level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    ConsensusVoting,
    RegistryMutation,
    CapabilityRegistration,
}

impl Action {
    pub fn minimum_trust(self) -> TrustLevel {
        match self {
            Action::ConsensusVoting => TrustLevel::Verified,
            Action::RegistryMutation => TrustLevel::Trusted,
            Action::CapabilityRegistration => TrustLevel::Basic,
        }
    }
}

/// Binds an agent identity to the public key it authenticated with. One live binding per agent;
/// a revoked binding stays in the map as an audit record rather than being removed.
#[derive(Debug, Clone)]
pub struct IdentityBinding {
    pub agent_id: AgentId,
    pub authenticated_key: PublicKey,
    pub trust: TrustLevel,
    pub bound_at: DateTime<Utc>,
    pub revoked: bool,
}

impl IdentityBinding {
    pub fn new(agent_id: AgentId, authenticated_key: PublicKey, trust: TrustLevel) -> Self {
        Self { agent_id, authenticated_key, trust, bound_at: Utc::now(), revoked: false }
    }
}
