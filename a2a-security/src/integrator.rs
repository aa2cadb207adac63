use std::sync::Arc;

use a2a_core::{AgentId, TrustLevel};
use a2a_crypto::PublicKey;
use dashmap::DashMap;
use tracing::{info, warn};

use crate::anomaly::{AnomalyEvidence, AnomalySink, NullSink};
use crate::error::SecurityError;
use crate::identity::{Action, IdentityBinding};

/// Binds agent identities to authenticated keys, gates participation in consensus/registry/
/// capability operations behind trust thresholds, and forwards anomaly reports to whatever
/// consensus kernel is attached via [`AnomalySink`].
pub struct SecurityIntegrator {
    bindings: DashMap<AgentId, IdentityBinding>,
    revocation_reasons: DashMap<AgentId, String>,
    sink: Arc<dyn AnomalySink>,
}

impl SecurityIntegrator {
    pub fn new(sink: Arc<dyn AnomalySink>) -> Self {
        Self { bindings: DashMap::new(), revocation_reasons: DashMap::new(), sink }
    }

    /// Binds `agent_id` to `authenticated_key` at the given trust level. Fails if a live
    /// (non-revoked) binding already exists for this agent — rebinding requires an explicit
    /// [`Self::revoke`] first.
    pub fn bind_identity(&self, agent_id: AgentId, authenticated_key: PublicKey, trust: TrustLevel) -> Result<(), SecurityError> {
        if let Some(existing) = self.bindings.get(&agent_id) {
            if !existing.revoked {
                return Err(SecurityError::AlreadyBound(agent_id.to_string()));
            }
        }
        info!(agent = %agent_id, "identity bound");
        self.bindings.insert(agent_id, IdentityBinding::new(agent_id, authenticated_key, trust));
        Ok(())
    }

    /// Checks whether `agent_id` may perform `action`: it must have a live binding whose trust
    /// meets or exceeds the action's minimum.
    pub fn authorize_participation(&self, agent_id: AgentId, action: Action) -> Result<(), SecurityError> {
        let binding = self.bindings.get(&agent_id).ok_or_else(|| SecurityError::UnknownAgent(agent_id.to_string()))?;

        if binding.revoked {
            let reason = self.revocation_reasons.get(&agent_id).map(|r| r.clone()).unwrap_or_else(|| "revoked".to_string());
            return Err(SecurityError::Revoked(agent_id.to_string(), reason));
        }

        let required = action.minimum_trust();
        if binding.trust < required {
            return Err(SecurityError::InsufficientTrust { agent: agent_id.to_string(), required, actual: binding.trust });
        }

        Ok(())
    }

    /// Forwards an observed anomaly to the attached sink. Does not itself revoke or demote —
    /// that decision belongs to whatever the sink wraps (e.g. consensus's evidence threshold).
    pub fn record_anomaly(&self, agent_id: AgentId, evidence: AnomalyEvidence) {
        warn!(agent = %agent_id, ?evidence, "security anomaly recorded");
        self.sink.record(agent_id, evidence);
    }

    /// Marks the binding revoked. All future [`Self::authorize_participation`] calls for this
    /// agent fail regardless of trust until a fresh [`Self::bind_identity`] replaces it.
    pub fn revoke(&self, agent_id: AgentId, reason: impl Into<String>) -> Result<(), SecurityError> {
        let reason = reason.into();
        let mut binding = self.bindings.get_mut(&agent_id).ok_or_else(|| SecurityError::UnknownAgent(agent_id.to_string()))?;
        binding.revoked = true;
        self.revocation_reasons.insert(agent_id, reason.clone());
        warn!(agent = %agent_id, %reason, "identity binding revoked");
        Ok(())
    }

    pub fn binding(&self, agent_id: &AgentId) -> Option<IdentityBinding> {
        self.bindings.get(agent_id).map(|b| b.clone())
    }
}

impl Default for SecurityIntegrator {
    fn default() -> Self {
        Self::new(Arc::new(NullSink))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use a2a_crypto::KeyPair;
    use std::sync::Mutex;

    struct RecordingSink {
        calls: Mutex<Vec<(AgentId, String)>>,
    }

    impl AnomalySink for RecordingSink {
        fn record(&self, agent_id: AgentId, evidence: AnomalyEvidence) {
            self.calls.lock().unwrap().push((agent_id, format!("{evidence:?}")));
        }
    }

    fn key() -> PublicKey {
        KeyPair::generate().public_key()
    }

    #[test]
    fn bind_then_authorize_succeeds_above_threshold() {
        let integrator = SecurityIntegrator::default();
        let agent = AgentId::new();
        integrator.bind_identity(agent, key(), TrustLevel::Trusted).unwrap();
        assert!(integrator.authorize_participation(agent, Action::ConsensusVoting).is_ok());
    }

    #[test]
    fn authorize_fails_below_threshold() {
        let integrator = SecurityIntegrator::default();
        let agent = AgentId::new();
        integrator.bind_identity(agent, key(), TrustLevel::Basic).unwrap();
        let err = integrator.authorize_participation(agent, Action::RegistryMutation).unwrap_err();
        assert!(matches!(err, SecurityError::InsufficientTrust { .. }));
        assert_eq!(err.code(), -32003);
    }

    #[test]
    fn double_bind_without_revoke_rejected() {
        let integrator = SecurityIntegrator::default();
        let agent = AgentId::new();
        integrator.bind_identity(agent, key(), TrustLevel::Basic).unwrap();
        assert!(matches!(integrator.bind_identity(agent, key(), TrustLevel::Basic), Err(SecurityError::AlreadyBound(_))));
    }

    #[test]
    fn revoked_binding_denies_regardless_of_trust() {
        let integrator = SecurityIntegrator::default();
        let agent = AgentId::new();
        integrator.bind_identity(agent, key(), TrustLevel::Privileged).unwrap();
        integrator.revoke(agent, "observed double voting").unwrap();
        let err = integrator.authorize_participation(agent, Action::CapabilityRegistration).unwrap_err();
        assert!(matches!(err, SecurityError::Revoked(_, _)));
    }

    #[test]
    fn rebind_after_revoke_clears_revocation() {
        let integrator = SecurityIntegrator::default();
        let agent = AgentId::new();
        integrator.bind_identity(agent, key(), TrustLevel::Basic).unwrap();
        integrator.revoke(agent, "key rotation").unwrap();
        integrator.bind_identity(agent, key(), TrustLevel::Trusted).unwrap();
        assert!(integrator.authorize_participation(agent, Action::ConsensusVoting).is_ok());
    }

    #[test]
    fn record_anomaly_forwards_to_sink() {
        let sink = Arc::new(RecordingSink { calls: Mutex::new(Vec::new()) });
        let integrator = SecurityIntegrator::new(sink.clone());
        let agent = AgentId::new();
        integrator.record_anomaly(agent, AnomalyEvidence::KeyMismatch);
        assert_eq!(sink.calls.lock().unwrap().len(), 1);
    }

    #[test]
    fn unknown_agent_cannot_authorize() {
        let integrator = SecurityIntegrator::default();
        let err = integrator.authorize_participation(AgentId::new(), Action::ConsensusVoting).unwrap_err();
        assert!(matches!(err, SecurityError::UnknownAgent(_)));
    }
}
