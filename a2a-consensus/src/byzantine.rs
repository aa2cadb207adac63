use std::collections::HashSet;

use a2a_core::{AgentId, AgentRegistry, TrustLevel};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tracing::{error, warn};

/// A concrete piece of Byzantine evidence, surfaced per the protocol's failure semantics: invalid
/// signatures, duplicate pre-prepares at the same `(v, s)` with different digests, and leader
/// equivocation never panic the node — they're recorded and acted on here.
#[derive(Debug, Clone)]
pub enum ByzantineEvidence {
    InvalidSignature { agent: AgentId },
    ConflictingDigest { agent: AgentId, view: u64, sequence: u64 },
    LeaderEquivocation { agent: AgentId, view: u64 },
    DoubleVote { agent: AgentId, sequence: u64 },
    /// An anomaly forwarded from outside the protocol itself — the identity and authorization
    /// layer sees things this tracker never directly observes (repeated denied actions, key
    /// mismatches, rate-limit violations) but that still belong on the same suspicion ledger.
    SecurityAnomaly { agent: AgentId, detail: String },
}

impl ByzantineEvidence {
    pub fn agent(&self) -> AgentId {
        match self {
            ByzantineEvidence::InvalidSignature { agent }
            | ByzantineEvidence::ConflictingDigest { agent, .. }
            | ByzantineEvidence::LeaderEquivocation { agent, .. }
            | ByzantineEvidence::DoubleVote { agent, .. }
            | ByzantineEvidence::SecurityAnomaly { agent, .. } => *agent,
        }
    }
}

struct EvidenceRecord {
    count: u32,
    last_seen: DateTime<Utc>,
}

/// Tracks evidence against agents and, once severity crosses threshold, demotes trust and
/// removes the agent from the active consensus set via the shared [`AgentRegistry`]. The registry
/// is the single source of truth for reputation/trust; this tracker only decides *when* to act on
/// it, keeping the suspicion/recovery split separate from fault detection itself.
pub struct ByzantineTracker {
    registry: AgentRegistry,
    evidence_threshold: u32,
    evidence: RwLock<std::collections::HashMap<AgentId, EvidenceRecord>>,
    suspected: RwLock<HashSet<AgentId>>,
}

impl ByzantineTracker {
    pub fn new(registry: AgentRegistry, evidence_threshold: u32) -> Self {
        Self {
            registry,
            evidence_threshold,
            evidence: RwLock::new(std::collections::HashMap::new()),
            suspected: RwLock::new(HashSet::new()),
        }
    }

    /// Record evidence and return `true` if this crossed the node into "suspected," at which
    /// point its trust is demoted and it is suspended from the active set.
    pub fn report(&self, evidence: ByzantineEvidence) -> bool {
        let agent = evidence.agent();
        warn!(agent = %agent, ?evidence, "Byzantine evidence recorded");

        let count = {
            let mut map = self.evidence.write();
            let record = map.entry(agent).or_insert(EvidenceRecord { count: 0, last_seen: Utc::now() });
            record.count += 1;
            record.last_seen = Utc::now();
            record.count
        };

        if count < self.evidence_threshold {
            return false;
        }

        let mut suspected = self.suspected.write();
        if suspected.insert(agent) {
            error!(agent = %agent, "agent suspected of Byzantine behavior, suspending");
            let _ = self.registry.demote_trust(&agent, TrustLevel::Untrusted);
            let _ = self.registry.suspend(&agent);
            true
        } else {
            false
        }
    }

    pub fn is_suspected(&self, agent: &AgentId) -> bool {
        self.suspected.read().contains(agent)
    }

    pub fn suspected_agents(&self) -> Vec<AgentId> {
        self.suspected.read().iter().copied().collect()
    }
}
