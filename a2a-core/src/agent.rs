use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use a2a_crypto::PublicKey;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::CoreError;

/// Unique identifier for a participant in the fabric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AgentId(pub Uuid);

impl AgentId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for AgentId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for AgentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Graduated trust a participant has earned. Ordered: a `verified` agent also satisfies any
/// check written against `basic`.
///
/// Trust never silently downgrades as a side effect of a reputation change — moving an agent
/// down the scale always goes through [`Agent::demote_trust`], which is deliberate and distinct
/// from [`Agent::update_trust`]'s monotone-only path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum TrustLevel {
    Untrusted,
    Basic,
    Verified,
    Trusted,
    Privileged,
}

/// Lifecycle state of an agent within the registry.
///
/// `Registered -> Active -> Suspended -> Removed`, with `Suspended` reachable only by an
/// explicit malicious-detection report and `Removed` reachable from either `Active` or
/// `Suspended`. All other transitions are rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AgentStatus {
    Registered,
    Active,
    Suspended,
    Removed,
}

impl AgentStatus {
    fn can_transition_to(self, next: AgentStatus) -> bool {
        matches!(
            (self, next),
            (AgentStatus::Registered, AgentStatus::Active)
                | (AgentStatus::Active, AgentStatus::Suspended)
                | (AgentStatus::Active, AgentStatus::Removed)
                | (AgentStatus::Suspended, AgentStatus::Removed)
                | (AgentStatus::Suspended, AgentStatus::Active)
        )
    }
}

/// A participant in the coordination fabric.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agent {
    pub id: AgentId,
    pub public_key: PublicKey,
    reputation: f64,
    trust: TrustLevel,
    status: AgentStatus,
    pub last_active: DateTime<Utc>,
}

impl Agent {
    pub fn new(public_key: PublicKey) -> Self {
        Self {
            id: AgentId::new(),
            public_key,
            reputation: 0.5,
            trust: TrustLevel::Basic,
            status: AgentStatus::Registered,
            last_active: Utc::now(),
        }
    }

    pub fn reputation(&self) -> f64 {
        self.reputation
    }

    pub fn trust(&self) -> TrustLevel {
        self.trust
    }

    pub fn status(&self) -> AgentStatus {
        self.status
    }

    /// Explicitly update reputation. Rejects any value outside `[0.0, 1.0]` and any decrease —
    /// reputation only moves forward, and only through this call.
    pub fn update_reputation(&mut self, new_value: f64) -> Result<(), CoreError> {
        if !(0.0..=1.0).contains(&new_value) {
            return Err(CoreError::ReputationOutOfRange(new_value));
        }
        if new_value < self.reputation {
            return Err(CoreError::ReputationWouldDecrease {
                current: self.reputation,
                attempted: new_value,
            });
        }
        self.reputation = new_value;
        self.last_active = Utc::now();
        Ok(())
    }

    /// Raise trust. Rejects any attempt to move to a lower or equal level silently.
    pub fn update_trust(&mut self, new_level: TrustLevel) -> Result<(), CoreError> {
        if new_level < self.trust {
            return Err(CoreError::TrustWouldDowngrade {
                agent: self.id.to_string(),
                current: self.trust,
                attempted: new_level,
            });
        }
        self.trust = new_level;
        Ok(())
    }

    /// Deliberate trust downgrade, bypassing the monotone guard in [`Self::update_trust`]. The
    /// only legitimate callers are security-anomaly handling paths that have already confirmed
    /// malicious behavior.
    pub fn demote_trust(&mut self, new_level: TrustLevel) {
        self.trust = new_level;
    }

    pub fn transition_status(&mut self, next: AgentStatus) -> Result<(), CoreError> {
        if !self.status.can_transition_to(next) {
            return Err(CoreError::InvalidStatusTransition {
                agent: self.id.to_string(),
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        Ok(())
    }

    pub fn touch(&mut self) {
        self.last_active = Utc::now();
    }
}

/// Concurrent registry of known agents, shared across consensus, voting, registry, and security
/// components via `Arc`.
#[derive(Clone)]
pub struct AgentRegistry {
    agents: Arc<DashMap<AgentId, Agent>>,
    registered_count: Arc<AtomicU64>,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self {
            agents: Arc::new(DashMap::new()),
            registered_count: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn register(&self, agent: Agent) -> Result<AgentId, CoreError> {
        let id = agent.id;
        if self.agents.contains_key(&id) {
            return Err(CoreError::AlreadyRegistered(id.to_string()));
        }
        self.agents.insert(id, agent);
        self.registered_count.fetch_add(1, Ordering::Relaxed);
        Ok(id)
    }

    pub fn get(&self, id: &AgentId) -> Result<Agent, CoreError> {
        self.agents
            .get(id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| CoreError::UnknownAgent(id.to_string()))
    }

    pub fn activate(&self, id: &AgentId) -> Result<(), CoreError> {
        self.with_agent_mut(id, |agent| agent.transition_status(AgentStatus::Active))
    }

    pub fn suspend(&self, id: &AgentId) -> Result<(), CoreError> {
        self.with_agent_mut(id, |agent| agent.transition_status(AgentStatus::Suspended))
    }

    pub fn remove(&self, id: &AgentId) -> Result<(), CoreError> {
        self.with_agent_mut(id, |agent| agent.transition_status(AgentStatus::Removed))
    }

    pub fn update_reputation(&self, id: &AgentId, new_value: f64) -> Result<(), CoreError> {
        self.with_agent_mut(id, |agent| agent.update_reputation(new_value))
    }

    pub fn update_trust(&self, id: &AgentId, new_level: TrustLevel) -> Result<(), CoreError> {
        self.with_agent_mut(id, |agent| agent.update_trust(new_level))
    }

    pub fn demote_trust(&self, id: &AgentId, new_level: TrustLevel) -> Result<(), CoreError> {
        self.with_agent_mut(id, |agent| {
            agent.demote_trust(new_level);
            Ok(())
        })
    }

    /// Agents currently in [`AgentStatus::Active`], the population consensus quorum and voting
    /// weight calculations draw from.
    pub fn active_agents(&self) -> Vec<Agent> {
        self.agents
            .iter()
            .filter(|entry| entry.value().status() == AgentStatus::Active)
            .map(|entry| entry.value().clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    fn with_agent_mut<F>(&self, id: &AgentId, f: F) -> Result<(), CoreError>
    where
        F: FnOnce(&mut Agent) -> Result<(), CoreError>,
    {
        let mut entry = self
            .agents
            .get_mut(id)
            .ok_or_else(|| CoreError::UnknownAgent(id.to_string()))?;
        f(entry.value_mut())
    }
}

impl Default for AgentRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use a2a_crypto::KeyPair;

    fn sample_agent() -> Agent {
        Agent::new(KeyPair::generate().public_key())
    }

    #[test]
    fn register_then_lookup_round_trips() {
        let registry = AgentRegistry::new();
        let agent = sample_agent();
        let id = agent.id;
        registry.register(agent).unwrap();
        assert_eq!(registry.get(&id).unwrap().id, id);
    }

    #[test]
    fn double_registration_rejected() {
        let registry = AgentRegistry::new();
        let agent = sample_agent();
        let id = agent.id;
        registry.register(agent.clone()).unwrap();
        // Re-insert a clone carrying the same id.
        let mut dup = agent;
        dup.id = id;
        assert!(matches!(
            registry.register(dup),
            Err(CoreError::AlreadyRegistered(_))
        ));
    }

    #[test]
    fn reputation_cannot_decrease() {
        let mut agent = sample_agent();
        agent.update_reputation(0.8).unwrap();
        assert!(matches!(
            agent.update_reputation(0.3),
            Err(CoreError::ReputationWouldDecrease { .. })
        ));
        assert_eq!(agent.reputation(), 0.8);
    }

    #[test]
    fn reputation_out_of_range_rejected() {
        let mut agent = sample_agent();
        assert!(matches!(
            agent.update_reputation(1.5),
            Err(CoreError::ReputationOutOfRange(_))
        ));
    }

    #[test]
    fn trust_cannot_silently_downgrade() {
        let mut agent = sample_agent();
        agent.update_trust(TrustLevel::Trusted).unwrap();
        assert!(matches!(
            agent.update_trust(TrustLevel::Basic),
            Err(CoreError::TrustWouldDowngrade { .. })
        ));
        assert_eq!(agent.trust(), TrustLevel::Trusted);
    }

    #[test]
    fn demote_trust_bypasses_guard() {
        let mut agent = sample_agent();
        agent.update_trust(TrustLevel::Trusted).unwrap();
        agent.demote_trust(TrustLevel::Untrusted);
        assert_eq!(agent.trust(), TrustLevel::Untrusted);
    }

    #[test]
    fn status_lifecycle_follows_allowed_edges() {
        let mut agent = sample_agent();
        assert_eq!(agent.status(), AgentStatus::Registered);
        agent.transition_status(AgentStatus::Active).unwrap();
        agent.transition_status(AgentStatus::Suspended).unwrap();
        agent.transition_status(AgentStatus::Removed).unwrap();
    }

    #[test]
    fn status_cannot_skip_registered_to_suspended() {
        let mut agent = sample_agent();
        assert!(matches!(
            agent.transition_status(AgentStatus::Suspended),
            Err(CoreError::InvalidStatusTransition { .. })
        ));
    }

    #[test]
    fn active_agents_filters_by_status() {
        let registry = AgentRegistry::new();
        let a = sample_agent();
        let b = sample_agent();
        let a_id = a.id;
        registry.register(a).unwrap();
        registry.register(b).unwrap();
        registry.activate(&a_id).unwrap();
        let active = registry.active_agents();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id, a_id);
    }
}
